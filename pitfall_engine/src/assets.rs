use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use pitfall_shared::AudioFormat;

use crate::sounds::SoundId;
use crate::track::TrackId;

/// Decoded PCM, planar (one `Vec` per channel).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self { sample_rate: sample_rate.max(1), channels }
    }

    pub fn silent(sample_rate: u32, channel_count: usize, seconds: f64) -> Self {
        let frames = (seconds.max(0.0) * sample_rate as f64).round() as usize;
        Self::new(sample_rate, vec![vec![0.0; frames]; channel_count.max(1)])
    }

    /// Mono sine, handy as a stand-in for real assets.
    pub fn tone(sample_rate: u32, seconds: f64, frequency: f32, amplitude: f32) -> Self {
        let frames = (seconds.max(0.0) * sample_rate as f64).round() as usize;
        let step = frequency / sample_rate as f32;
        let data = (0..frames)
            .map(|i| (i as f32 * step * std::f32::consts::TAU).sin() * amplitude)
            .collect();
        Self::new(sample_rate, vec![data])
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Copy with every channel's sample order reversed.
    pub fn reversed(&self) -> Self {
        let channels = self
            .channels
            .iter()
            .map(|c| c.iter().rev().copied().collect())
            .collect();
        Self { sample_rate: self.sample_rate, channels }
    }

    /// Sample at a frame; mono buffers feed every output channel.
    #[inline]
    pub fn sample(&self, channel: usize, frame: usize) -> f32 {
        let ch = channel.min(self.channels.len().saturating_sub(1));
        self.channels
            .get(ch)
            .and_then(|c| c.get(frame))
            .copied()
            .unwrap_or(0.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to decode {path}: {source}")]
    Decode { path: String, source: hound::Error },
    #[error("{path}: {format:?} is not supported by this loader")]
    Unsupported { path: String, format: AudioFormat },
    #[error("{0} decoded to an empty buffer")]
    Empty(String),
    #[error("{0} not found")]
    NotFound(String),
}

/// What a decoded buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetTarget {
    Track(TrackId),
    Sound(SoundId),
}

#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub path: String,
    pub key: String,
    pub target: AssetTarget,
    /// Nominal duration from the config tables, used by synthetic loaders.
    pub duration_hint: Option<f64>,
}

impl LoadRequest {
    pub fn url(&self, format: AudioFormat) -> String {
        format!("{}{}.{}", self.path, self.key, format.extension())
    }
}

/// Completion of one load, sent back to the engine thread.
#[derive(Debug)]
pub struct Decoded {
    pub target: AssetTarget,
    pub url: String,
    pub result: Result<AudioBuffer, AssetError>,
}

/// Fetch-and-decode backend. Implementations must answer every request
/// exactly once on `reply`, either synchronously or from another thread.
pub trait AssetLoader: Send + Sync {
    fn load(&self, request: LoadRequest, reply: Sender<Decoded>);
}

/// Decodes WAV files below a root directory on the rayon pool.
pub struct WavLoader {
    root: PathBuf,
    format: AudioFormat,
}

impl WavLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), format: AudioFormat::Wav }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }
}

impl AssetLoader for WavLoader {
    fn load(&self, request: LoadRequest, reply: Sender<Decoded>) {
        let url = request.url(self.format);
        if self.format != AudioFormat::Wav {
            let result = Err(AssetError::Unsupported { path: url.clone(), format: self.format });
            let _ = reply.send(Decoded { target: request.target, url, result });
            return;
        }
        let full_path = self.root.join(&url);
        rayon::spawn(move || {
            let result = decode_wav(&full_path);
            let _ = reply.send(Decoded { target: request.target, url, result });
        });
    }
}

/// Read a WAV file into planar f32 channels.
pub fn decode_wav(path: &Path) -> Result<AudioBuffer, AssetError> {
    let path_str = path.display().to_string();
    let reader = hound::WavReader::open(path).map_err(|source| match source {
        hound::Error::IoError(ref e) if e.kind() == std::io::ErrorKind::NotFound => {
            AssetError::NotFound(path_str.clone())
        }
        source => AssetError::Decode { path: path_str.clone(), source },
    })?;
    let spec = reader.spec();
    let channel_count = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| AssetError::Decode { path: path_str.clone(), source })?,
        hound::SampleFormat::Int => {
            let max_val = 2.0_f32.powi(spec.bits_per_sample as i32 - 1);
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| AssetError::Decode { path: path_str.clone(), source })?
        }
    };

    if interleaved.is_empty() {
        return Err(AssetError::Empty(path_str));
    }

    let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); channel_count];
    for frame in interleaved.chunks(channel_count) {
        for (ch, &s) in frame.iter().enumerate() {
            channels[ch].push(s);
        }
    }

    tracing::debug!(path = %path_str, frames = channels[0].len(), "decoded wav");
    Ok(AudioBuffer::new(spec.sample_rate, channels))
}

/// Answers synchronously with synthetic buffers sized from the duration hint.
/// Keys can be marked as failing to exercise the error path.
#[derive(Default)]
pub struct MemoryLoader {
    sample_rate: u32,
    tone: bool,
    failing: HashSet<String>,
    buffers: HashMap<String, AudioBuffer>,
}

impl MemoryLoader {
    /// Silent buffers; cheap enough for long simulations.
    pub fn silent(sample_rate: u32) -> Self {
        Self { sample_rate, ..Default::default() }
    }

    /// Quiet sine buffers, so a bounced mix is audible.
    pub fn tones(sample_rate: u32) -> Self {
        Self { sample_rate, tone: true, ..Default::default() }
    }

    pub fn fail(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn with_buffer(mut self, key: &str, buffer: AudioBuffer) -> Self {
        self.buffers.insert(key.to_string(), buffer);
        self
    }

    fn synthesize(&self, request: &LoadRequest) -> AudioBuffer {
        let seconds = request.duration_hint.unwrap_or(0.25);
        if self.tone {
            // Spread keys over a few pitches so layers stay distinguishable.
            let pitch = 110.0 * (1 + request.key.len() % 5) as f32;
            AudioBuffer::tone(self.sample_rate, seconds, pitch, 0.1)
        } else {
            AudioBuffer::silent(self.sample_rate, 1, seconds)
        }
    }
}

impl AssetLoader for MemoryLoader {
    fn load(&self, request: LoadRequest, reply: Sender<Decoded>) {
        let url = request.url(AudioFormat::Wav);
        let result = if self.failing.contains(&request.key) {
            Err(AssetError::NotFound(url.clone()))
        } else if let Some(buffer) = self.buffers.get(&request.key) {
            Ok(buffer.clone())
        } else {
            Ok(self.synthesize(&request))
        };
        let _ = reply.send(Decoded { target: request.target, url, result });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn reversed_flips_every_channel() {
        let buf = AudioBuffer::new(4, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let rev = buf.reversed();
        assert_eq!(rev.channels[0], vec![3.0, 2.0, 1.0]);
        assert_eq!(rev.channels[1], vec![6.0, 5.0, 4.0]);
        assert_eq!(rev.reversed(), buf);
    }

    #[test]
    fn mono_buffers_feed_both_output_channels() {
        let buf = AudioBuffer::new(4, vec![vec![0.5, 0.25]]);
        assert_eq!(buf.sample(1, 1), 0.25);
        assert_eq!(buf.sample(0, 9), 0.0);
    }

    #[test]
    fn memory_loader_honours_duration_hint_and_failures() {
        let loader = MemoryLoader::silent(1000).fail("broken");
        let (tx, rx) = unbounded();
        let target = AssetTarget::Sound(SoundId(0));
        loader.load(
            LoadRequest { path: "a/".into(), key: "ok".into(), target, duration_hint: Some(2.0) },
            tx.clone(),
        );
        loader.load(
            LoadRequest { path: "a/".into(), key: "broken".into(), target, duration_hint: None },
            tx,
        );
        let ok = rx.recv().unwrap();
        assert_eq!(ok.url, "a/ok.wav");
        assert_eq!(ok.result.unwrap().len(), 2000);
        let broken = rx.recv().unwrap();
        assert!(matches!(broken.result, Err(AssetError::NotFound(_))));
    }

    #[test]
    fn wav_decode_reads_back_written_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beep.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..8 {
            writer.write_sample(if i % 2 == 0 { 16384i16 } else { -16384i16 }).unwrap();
        }
        writer.finalize().unwrap();

        let buf = decode_wav(&path).unwrap();
        assert_eq!(buf.channels.len(), 2);
        assert_eq!(buf.len(), 4);
        assert!((buf.channels[0][0] - 0.5).abs() < 1e-4);
        assert!((buf.channels[1][3] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn missing_wav_is_not_found() {
        let err = decode_wav(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, AssetError::NotFound(_)), "{err}");
    }
}

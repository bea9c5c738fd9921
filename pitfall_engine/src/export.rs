//! Bounce a rendered session to a WAV file.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportBitDepth {
    Int16,
    Int24,
    Float32,
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub sample_rate: u32,
    pub bit_depth: ExportBitDepth,
    /// Scale so the loudest sample hits full scale.
    pub normalize: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { sample_rate: 44100, bit_depth: ExportBitDepth::Int16, normalize: false }
    }
}

/// Write interleaved stereo samples. Integer formats are clipped to full scale.
pub fn write_wav(path: &Path, interleaved: &[f32], config: &ExportConfig) -> anyhow::Result<()> {
    let (bits_per_sample, sample_format) = match config.bit_depth {
        ExportBitDepth::Int16 => (16, SampleFormat::Int),
        ExportBitDepth::Int24 => (24, SampleFormat::Int),
        ExportBitDepth::Float32 => (32, SampleFormat::Float),
    };
    let spec = WavSpec { channels: 2, sample_rate: config.sample_rate, bits_per_sample, sample_format };
    let mut writer = WavWriter::create(path, spec)?;

    let gain = if config.normalize {
        1.0 / crate::mixer::peak(interleaved).max(1e-10)
    } else {
        1.0
    };

    match config.bit_depth {
        ExportBitDepth::Float32 => {
            for &s in interleaved {
                writer.write_sample(s * gain)?;
            }
        }
        ExportBitDepth::Int16 => {
            let scale = i16::MAX as f32;
            for &s in interleaved {
                writer.write_sample(((s * gain).clamp(-1.0, 1.0) * scale).round() as i16)?;
            }
        }
        ExportBitDepth::Int24 => {
            let scale = ((1 << 23) - 1) as f32;
            for &s in interleaved {
                writer.write_sample(((s * gain).clamp(-1.0, 1.0) * scale).round() as i32)?;
            }
        }
    }

    writer.finalize()?;
    tracing::info!(path = %path.display(), frames = interleaved.len() / 2, "wrote wav");
    Ok(())
}

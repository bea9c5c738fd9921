use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use pitfall_shared::config::{StageMusic, TransportConfig};
use pitfall_shared::{GameConfig, RandomSource, StageId};

use crate::assets::{AssetLoader, AssetTarget, Decoded};
use crate::events::MusicEvent;
use crate::mixer;
use crate::sequencer::{Music, MusicError};
use crate::sounds::SoundBank;
use crate::timeline::{GainParam, Timeline, VoiceOwner};
use crate::transport::Transport;

/// Shared audio state: the clock, every registered voice and the master gain.
/// Tracks and sounds only ever touch it through `&mut` handed down by the engine.
pub struct AudioContext {
    pub transport: Transport,
    pub timeline: Timeline,
    pub master_gain: GainParam,
    pub config: TransportConfig,
}

impl AudioContext {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            transport: Transport::new(config.sample_rate),
            timeline: Timeline::new(config.max_voices),
            master_gain: GainParam::new(config.master_gain),
            config,
        }
    }

    pub fn now(&self) -> f64 {
        self.transport.now()
    }

    pub fn is_muted(&self) -> bool {
        self.master_gain.target() == 0.0
    }

    /// Ramp the master gain to silence or back. Returns whether it is now muted.
    pub fn toggle_mute(&mut self) -> bool {
        let now = self.transport.now();
        let mute = !self.is_muted();
        let target = if mute { 0.0 } else { self.config.master_gain };
        self.master_gain.ramp_from_now(now, target, now + self.config.mute_ramp);
        tracing::debug!(mute, "master gain");
        mute
    }
}

/// Root object owning the audio context, the music sequencer and the sound bank.
///
/// Everything runs on the caller's thread: decode completions queue up on a
/// channel until `pump`, voice ends are dispatched while `advance` or
/// `render` move the clock.
pub struct AudioEngine {
    pub ctx: AudioContext,
    pub music: Music,
    pub sounds: SoundBank,
    stages: BTreeMap<StageId, StageMusic>,
    loader: Box<dyn AssetLoader>,
    decoded_tx: Sender<Decoded>,
    decoded_rx: Receiver<Decoded>,
    events_tx: Sender<MusicEvent>,
    events_rx: Receiver<MusicEvent>,
    /// Which stage's ready gate each outstanding asset counts toward.
    pending: HashMap<AssetTarget, StageId>,
    countdown: BTreeMap<StageId, usize>,
}

impl AudioEngine {
    pub fn new(config: &GameConfig, loader: Box<dyn AssetLoader>, rng: Box<dyn RandomSource>) -> Self {
        let (decoded_tx, decoded_rx) = unbounded();
        let (events_tx, events_rx) = unbounded();
        Self {
            ctx: AudioContext::new(config.transport.clone()),
            music: Music::new(rng, events_tx.clone()),
            sounds: SoundBank::new(config.sounds.clone()),
            stages: config.music.clone(),
            loader,
            decoded_tx,
            decoded_rx,
            events_tx,
            events_rx,
            pending: HashMap::new(),
            countdown: BTreeMap::new(),
        }
    }

    /// Another handle on the event stream. Each event goes to one receiver.
    pub fn events(&self) -> Receiver<MusicEvent> {
        self.events_rx.clone()
    }

    pub fn drain_events(&self) -> Vec<MusicEvent> {
        self.events_rx.try_iter().collect()
    }

    pub fn now(&self) -> f64 {
        self.ctx.now()
    }

    /// Register a stage's tracks (and the sound bank on first use) and request
    /// their decodes. `StageReady` is sent once everything has decoded.
    pub fn load_stage(&mut self, stage: StageId) -> Result<(), MusicError> {
        if self.music.is_registered(stage) {
            if self.is_ready(stage) {
                let _ = self.events_tx.send(MusicEvent::StageReady(stage));
            }
            return Ok(());
        }
        let music = self.stages.get(&stage).ok_or(MusicError::UnknownStage(stage))?;
        let mut requests = self.music.register_stage(stage, music)?;
        requests.extend(self.sounds.register());

        tracing::info!(stage, assets = requests.len(), "loading stage");
        self.countdown.insert(stage, requests.len());
        if requests.is_empty() {
            let _ = self.events_tx.send(MusicEvent::StageReady(stage));
        }
        for request in requests {
            self.pending.insert(request.target, stage);
            self.loader.load(request, self.decoded_tx.clone());
        }
        Ok(())
    }

    pub fn is_ready(&self, stage: StageId) -> bool {
        self.countdown.get(&stage) == Some(&0)
    }

    /// Assets of `stage` still outstanding; `None` if it was never loaded.
    pub fn pending_assets(&self, stage: StageId) -> Option<usize> {
        self.countdown.get(&stage).copied()
    }

    /// Handle every decode completion received so far.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(decoded) = self.decoded_rx.try_recv() {
            self.handle_decoded(decoded);
            handled += 1;
        }
        handled
    }

    /// Block until `stage` is ready or `timeout` passes. For loaders that
    /// decode on other threads.
    pub fn wait_ready(&mut self, stage: StageId, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.pump();
        while !self.is_ready(stage) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.decoded_rx.recv_timeout(remaining) {
                Ok(decoded) => self.handle_decoded(decoded),
                Err(_) => break,
            }
        }
        self.is_ready(stage)
    }

    fn handle_decoded(&mut self, decoded: Decoded) {
        let stage = self.pending.remove(&decoded.target);
        match decoded.result {
            Ok(buffer) => {
                match decoded.target {
                    AssetTarget::Track(id) => self.music.on_track_decoded(&mut self.ctx, id, buffer),
                    AssetTarget::Sound(id) => self.sounds.on_decoded(id, buffer),
                }
                let Some(stage) = stage else { return };
                if let Some(left) = self.countdown.get_mut(&stage) {
                    *left = left.saturating_sub(1);
                    if *left == 0 {
                        tracing::info!(stage, "stage ready");
                        let _ = self.events_tx.send(MusicEvent::StageReady(stage));
                    }
                }
            }
            Err(e) => {
                tracing::error!(url = %decoded.url, "asset failed to load: {e}");
                let _ = self.events_tx.send(MusicEvent::LoadFailed {
                    stage: stage.unwrap_or_default(),
                    url: decoded.url,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Move the clock forward without producing samples. Voice ends inside
    /// the window are dispatched at their exact end times, in order.
    pub fn advance(&mut self, seconds: f64) {
        if !(seconds > 0.0) {
            return;
        }
        let target = self.ctx.now() + seconds;
        while let Some(end) = self.ctx.timeline.next_end() {
            if end > target {
                break;
            }
            self.ctx.transport.advance_to(end);
            self.dispatch_ended();
        }
        self.ctx.transport.advance_to(target);
        self.dispatch_ended();
    }

    /// Mix the next block into `out` (interleaved stereo) and move the clock past it.
    pub fn render(&mut self, out: &mut [f32]) {
        let frames = out.len() / 2;
        mixer::mix_voices(
            self.ctx.timeline.voices(),
            &self.ctx.master_gain,
            self.ctx.now(),
            self.ctx.transport.sample_rate,
            out,
        );
        self.ctx.transport.advance_frames(frames as u64);
        self.dispatch_ended();
    }

    fn dispatch_ended(&mut self) {
        let now = self.ctx.now();
        for ended in self.ctx.timeline.collect_ended(now) {
            if let VoiceOwner::Deck { .. } = ended.owner {
                self.music.on_voice_ended(&mut self.ctx, &ended);
            }
        }
    }

    pub fn play(&mut self, stage: Option<StageId>) -> Result<(), MusicError> {
        self.music.play(&mut self.ctx, stage)
    }

    pub fn pause(&mut self, reverse: bool) -> Result<(), MusicError> {
        self.music.pause(&mut self.ctx, reverse)
    }

    pub fn reset(&mut self) -> Result<(), MusicError> {
        self.music.reset(&mut self.ctx)
    }

    pub fn stop(&mut self) {
        self.music.stop(&mut self.ctx);
    }

    pub fn double_time(&mut self, enable: bool) -> Result<(), MusicError> {
        self.music.double_time(&mut self.ctx, enable)
    }

    pub fn overlay_one_shot(&mut self) -> Result<(), MusicError> {
        self.music.overlay_one_shot(&mut self.ctx)
    }

    pub fn mute(&mut self) -> bool {
        self.music.mute(&mut self.ctx)
    }

    pub fn play_sound(&mut self, key: &str) -> bool {
        let now = self.ctx.now();
        self.sounds.play(&mut self.ctx.timeline, now, key)
    }

    pub fn master_key(&self) -> Option<&str> {
        self.music.master_track().map(|t| t.key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AudioBuffer, MemoryLoader};
    use pretty_assertions::assert_eq;
    use pitfall_shared::ScriptedRandom;

    fn engine(loader: MemoryLoader) -> AudioEngine {
        let mut config = GameConfig::default();
        config.transport.sample_rate = 1000;
        AudioEngine::new(&config, Box::new(loader), Box::new(ScriptedRandom::new(&[0.1])))
    }

    #[test]
    fn stage_ready_fires_after_every_decode() {
        let mut e = engine(MemoryLoader::silent(1000));
        e.load_stage(1).unwrap();
        assert!(!e.is_ready(1));
        // 11 tracks + 6 sounds
        assert_eq!(e.pending_assets(1), Some(17));
        assert_eq!(e.pump(), 17);
        assert!(e.is_ready(1));
        let ready = e.drain_events().into_iter().filter(|ev| *ev == MusicEvent::StageReady(1)).count();
        assert_eq!(ready, 1);
        assert_eq!(e.master_key(), Some("pause"));
    }

    #[test]
    fn sounds_load_once_across_stages() {
        let mut e = engine(MemoryLoader::silent(1000));
        e.load_stage(1).unwrap();
        e.load_stage(2).unwrap();
        assert_eq!(e.pending_assets(2), Some(10));
    }

    #[test]
    fn failed_decode_blocks_readiness() {
        let mut e = engine(MemoryLoader::silent(1000).fail("verse2"));
        e.load_stage(1).unwrap();
        e.pump();
        assert!(!e.is_ready(1));
        assert_eq!(e.pending_assets(1), Some(1));
        let failed: Vec<_> = e
            .drain_events()
            .into_iter()
            .filter(|ev| matches!(ev, MusicEvent::LoadFailed { .. }))
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(matches!(&failed[0], MusicEvent::LoadFailed { stage: 1, url, .. } if url.ends_with("verse2.wav")));
    }

    #[test]
    fn reloading_a_ready_stage_reports_ready_again() {
        let mut e = engine(MemoryLoader::silent(1000));
        e.load_stage(1).unwrap();
        e.pump();
        e.drain_events();
        e.load_stage(1).unwrap();
        assert_eq!(e.drain_events(), vec![MusicEvent::StageReady(1)]);
    }

    #[test]
    fn mute_toggles_master_gain() {
        let mut e = engine(MemoryLoader::silent(1000));
        assert!(e.mute());
        e.advance(1.0);
        assert_eq!(e.ctx.master_gain.value_at(e.now()), 0.0);
        assert!(!e.mute());
        e.advance(1.0);
        assert_eq!(e.ctx.master_gain.value_at(e.now()), 1.0);
    }

    #[test]
    fn render_produces_sound_and_moves_the_clock() {
        let mut e = engine(MemoryLoader::tones(1000));
        e.load_stage(1).unwrap();
        e.pump();
        let mut block = vec![0.0; 2 * 500];
        e.render(&mut block);
        assert!((e.now() - 0.5).abs() < 1e-9);
        assert!(mixer::peak(&block) > 0.0, "pause loop should be audible after the start delay");
    }

    #[test]
    fn sounds_play_after_load() {
        let mut e = engine(MemoryLoader::silent(1000));
        e.load_stage(1).unwrap();
        e.pump();
        assert!(e.play_sound("hit"));
        assert!(!e.play_sound("hit"));
    }

    #[test]
    fn supplied_buffers_replace_synthesized_ones() {
        let long_hit = AudioBuffer::silent(1000, 1, 2.0);
        let mut e = engine(MemoryLoader::silent(1000).with_buffer("hit", long_hit));
        e.load_stage(1).unwrap();
        e.pump();
        assert!(e.play_sound("hit"));
        let voice = e.ctx.timeline.voices().last().unwrap();
        assert_eq!(voice.natural_end, 2.0);
    }
}

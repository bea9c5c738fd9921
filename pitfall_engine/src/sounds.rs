//! Short one-shot effects shared by every stage.

use std::collections::HashMap;
use std::sync::Arc;

use pitfall_shared::config::SoundConfig;

use crate::assets::{AssetTarget, AudioBuffer, LoadRequest};
use crate::timeline::{GainParam, Timeline, VoiceOwner, VoiceSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundId(pub usize);

struct Sound {
    key: String,
    buffer: Option<Arc<AudioBuffer>>,
    last_start: Option<f64>,
}

/// Loaded once, on the first stage load; later stages reuse the buffers.
pub struct SoundBank {
    sounds: Vec<Sound>,
    by_key: HashMap<String, SoundId>,
    config: SoundConfig,
    registered: bool,
}

impl SoundBank {
    pub fn new(config: SoundConfig) -> Self {
        Self { sounds: Vec::new(), by_key: HashMap::new(), config, registered: false }
    }

    /// Load requests for every configured sound. Empty after the first call.
    pub fn register(&mut self) -> Vec<LoadRequest> {
        if self.registered {
            return Vec::new();
        }
        self.registered = true;

        let mut requests = Vec::new();
        for key in &self.config.keys {
            if self.by_key.contains_key(key) {
                continue;
            }
            let id = SoundId(self.sounds.len());
            self.sounds.push(Sound { key: key.clone(), buffer: None, last_start: None });
            self.by_key.insert(key.clone(), id);
            requests.push(LoadRequest {
                path: self.config.path.clone(),
                key: key.clone(),
                target: AssetTarget::Sound(id),
                duration_hint: None,
            });
        }
        requests
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn on_decoded(&mut self, id: SoundId, buffer: AudioBuffer) {
        if let Some(sound) = self.sounds.get_mut(id.0) {
            sound.buffer = Some(Arc::new(buffer));
        }
    }

    pub fn is_loaded(&self, key: &str) -> bool {
        self.by_key
            .get(key)
            .and_then(|id| self.sounds.get(id.0))
            .is_some_and(|s| s.buffer.is_some())
    }

    /// Fire a sound now. Returns false when unknown, undecoded, retriggered
    /// too soon or when the voice pool is exhausted.
    pub fn play(&mut self, timeline: &mut Timeline, now: f64, key: &str) -> bool {
        let Some(&id) = self.by_key.get(key) else {
            tracing::warn!(sound = key, "unknown sound");
            return false;
        };
        let sound = &mut self.sounds[id.0];
        let Some(buffer) = sound.buffer.clone() else {
            tracing::debug!(sound = key, "sound not decoded yet");
            return false;
        };
        // Replays inside the window, its closing edge included, are dropped.
        if sound.last_start.is_some_and(|t| now <= t + self.config.retrigger_delay) {
            return false;
        }

        let length = buffer.duration();
        let spec = VoiceSpec {
            owner: VoiceOwner::Sound(id),
            buffer,
            start: now,
            offset: 0.0,
            length,
            gain: GainParam::new(self.config.gain),
        };
        match timeline.spawn(spec) {
            Ok(voice) => {
                timeline.detach(voice);
                sound.last_start = Some(now);
                true
            }
            Err(e) => {
                tracing::warn!(sound = %sound.key, "dropping sound: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loaded_bank() -> SoundBank {
        let mut bank = SoundBank::new(SoundConfig::default());
        assert!(!bank.is_registered());
        let requests = bank.register();
        assert_eq!(requests.len(), 6);
        for r in requests {
            if let AssetTarget::Sound(id) = r.target {
                bank.on_decoded(id, AudioBuffer::silent(100, 1, 0.5));
            }
        }
        bank
    }

    #[test]
    fn registers_only_once() {
        let mut bank = loaded_bank();
        assert!(bank.is_registered());
        assert!(bank.register().is_empty());
        assert!(bank.is_loaded("rupee"));
    }

    #[test]
    fn retrigger_window_suppresses_repeats() {
        let mut bank = loaded_bank();
        let mut tl = Timeline::new(8);
        assert!(bank.play(&mut tl, 1.0, "hit"));
        assert!(!bank.play(&mut tl, 1.05, "hit"));
        assert!(bank.play(&mut tl, 1.05, "arrow"));
        assert!(bank.play(&mut tl, 1.11, "hit"));
        assert_eq!(tl.len(), 3);
        assert_eq!(tl.voices()[0].gain.value_at(1.0), 0.6);
    }

    #[test]
    fn replay_exactly_at_the_window_edge_is_dropped() {
        let mut bank = loaded_bank();
        let mut tl = Timeline::new(8);
        let edge = 2.0 + bank.config.retrigger_delay;
        assert!(bank.play(&mut tl, 2.0, "rupee"));
        assert!(!bank.play(&mut tl, edge, "rupee"));
        assert!(bank.play(&mut tl, edge + 1e-6, "rupee"));
        assert_eq!(tl.len(), 2);
    }

    #[test]
    fn unknown_and_exhausted_are_refused() {
        let mut bank = loaded_bank();
        let mut tl = Timeline::new(1);
        assert!(!bank.play(&mut tl, 0.0, "nope"));
        assert!(bank.play(&mut tl, 0.0, "die"));
        assert!(!bank.play(&mut tl, 0.0, "hurt"));
    }
}

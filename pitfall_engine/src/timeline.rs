//! Registry of scheduled voices against the transport clock.
//!
//! A voice is one playback of a buffer: it starts at an absolute time,
//! optionally seeks into the buffer, carries its own gain automation and
//! ends either naturally or at a requested stop time. Ended voices are
//! collected in end-time order so owners see their end handlers strictly
//! ordered.

use std::sync::Arc;

use crate::assets::AudioBuffer;
use crate::sounds::SoundId;
use crate::track::TrackId;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Automation {
    Set,
    /// Linear ramp that starts at `from` and reaches the event value at the event time.
    Ramp { from: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GainEvent {
    time: f64,
    value: f32,
    kind: Automation,
}

/// Gain lane with scheduled set/ramp events, evaluated at any clock time.
#[derive(Debug, Clone, PartialEq)]
pub struct GainParam {
    initial: f32,
    events: Vec<GainEvent>,
}

impl GainParam {
    pub fn new(value: f32) -> Self {
        Self { initial: value, events: Vec::new() }
    }

    /// Jump to `value` at `time`.
    pub fn set_value_at(&mut self, value: f32, time: f64) {
        self.insert(GainEvent { time, value, kind: Automation::Set });
    }

    /// Ramp linearly from whatever the lane holds at `from` to `value` at `to`.
    pub fn linear_ramp(&mut self, from: f64, value: f32, to: f64) {
        if to <= from {
            self.set_value_at(value, from);
            return;
        }
        self.insert(GainEvent { time: to, value, kind: Automation::Ramp { from } });
    }

    /// Drop everything scheduled after `now`, pin the current value and ramp to `value`.
    pub fn ramp_from_now(&mut self, now: f64, value: f32, to: f64) {
        let current = self.value_at(now);
        self.events.retain(|e| e.time <= now);
        self.set_value_at(current, now);
        self.linear_ramp(now, value, to);
    }

    /// The value the lane settles on once all events have passed.
    pub fn target(&self) -> f32 {
        self.events.last().map_or(self.initial, |e| e.value)
    }

    pub fn value_at(&self, t: f64) -> f32 {
        let mut value = self.initial;
        for e in &self.events {
            match e.kind {
                Automation::Set => {
                    if e.time <= t {
                        value = e.value;
                    } else {
                        break;
                    }
                }
                Automation::Ramp { from } => {
                    if e.time <= t {
                        value = e.value;
                    } else if from <= t {
                        let x = ((t - from) / (e.time - from)) as f32;
                        return value + (e.value - value) * x;
                    } else {
                        break;
                    }
                }
            }
        }
        value
    }

    fn insert(&mut self, event: GainEvent) {
        let idx = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(idx, event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

/// Who gets told when a voice ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceOwner {
    Deck { track: TrackId, deck: usize },
    Sound(SoundId),
}

#[derive(Debug, Clone)]
pub struct Voice {
    pub id: VoiceId,
    pub owner: VoiceOwner,
    pub buffer: Arc<AudioBuffer>,
    pub start: f64,
    /// Seek into the buffer, in seconds.
    pub offset: f64,
    pub natural_end: f64,
    pub stop_at: Option<f64>,
    pub gain: GainParam,
    /// Cleared when the owner detaches its end handler.
    pub notify: bool,
}

impl Voice {
    pub fn end(&self) -> f64 {
        self.stop_at.map_or(self.natural_end, |s| s.min(self.natural_end))
    }

    pub fn is_sounding(&self, t: f64) -> bool {
        t >= self.start && t < self.end()
    }
}

/// Parameters for a new voice.
#[derive(Debug, Clone)]
pub struct VoiceSpec {
    pub owner: VoiceOwner,
    pub buffer: Arc<AudioBuffer>,
    pub start: f64,
    pub offset: f64,
    /// How long the voice plays from `offset` before it ends naturally.
    pub length: f64,
    pub gain: GainParam,
}

/// Entry of the optional spawn journal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceRecord {
    pub id: VoiceId,
    pub owner: VoiceOwner,
    pub start: f64,
    pub offset: f64,
    pub natural_end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceEnded {
    pub id: VoiceId,
    pub owner: VoiceOwner,
    pub at: f64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TimelineError {
    #[error("voice pool exhausted ({capacity} voices live)")]
    Capacity { capacity: usize },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VoiceError {
    #[error("voice {0:?} was already stopped")]
    AlreadyStopped(VoiceId),
    #[error("voice {0:?} is not live")]
    UnknownVoice(VoiceId),
}

pub struct Timeline {
    voices: Vec<Voice>,
    next_id: u64,
    capacity: usize,
    journal: Option<Vec<VoiceRecord>>,
}

impl Timeline {
    pub fn new(capacity: usize) -> Self {
        Self { voices: Vec::with_capacity(capacity), next_id: 1, capacity, journal: None }
    }

    /// Keep a record of every spawned voice (tests and the headless host use it).
    pub fn enable_journal(&mut self) {
        self.journal.get_or_insert_with(Vec::new);
    }

    pub fn journal(&self) -> &[VoiceRecord] {
        self.journal.as_deref().unwrap_or(&[])
    }

    pub fn spawn(&mut self, spec: VoiceSpec) -> Result<VoiceId, TimelineError> {
        if self.voices.len() >= self.capacity {
            return Err(TimelineError::Capacity { capacity: self.capacity });
        }
        let id = VoiceId(self.next_id);
        self.next_id += 1;

        let voice = Voice {
            id,
            owner: spec.owner,
            buffer: spec.buffer,
            start: spec.start,
            offset: spec.offset,
            natural_end: spec.start + spec.length.max(0.0),
            stop_at: None,
            gain: spec.gain,
            notify: true,
        };
        if let Some(journal) = self.journal.as_mut() {
            journal.push(VoiceRecord {
                id,
                owner: voice.owner,
                start: voice.start,
                offset: voice.offset,
                natural_end: voice.natural_end,
            });
        }
        self.voices.push(voice);
        Ok(id)
    }

    pub fn get(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.iter().find(|v| v.id == id)
    }

    pub fn get_mut(&mut self, id: VoiceId) -> Option<&mut Voice> {
        self.voices.iter_mut().find(|v| v.id == id)
    }

    /// Request the voice to stop at `at`. Stopping twice is an error the caller may ignore.
    pub fn stop(&mut self, id: VoiceId, at: f64) -> Result<(), VoiceError> {
        let voice = self.get_mut(id).ok_or(VoiceError::UnknownVoice(id))?;
        if voice.stop_at.is_some() {
            return Err(VoiceError::AlreadyStopped(id));
        }
        voice.stop_at = Some(at);
        Ok(())
    }

    /// Silence the end handler of a voice.
    pub fn detach(&mut self, id: VoiceId) {
        if let Some(voice) = self.get_mut(id) {
            voice.notify = false;
        }
    }

    /// Remove every voice that has ended by `now` and report the ones still
    /// attached to an owner, ordered by end time.
    pub fn collect_ended(&mut self, now: f64) -> Vec<VoiceEnded> {
        let mut ended: Vec<VoiceEnded> = Vec::new();
        self.voices.retain(|v| {
            let end = v.end();
            if end <= now {
                if v.notify {
                    ended.push(VoiceEnded { id: v.id, owner: v.owner, at: end });
                }
                false
            } else {
                true
            }
        });
        ended.sort_by(|a, b| a.at.total_cmp(&b.at).then(a.id.cmp(&b.id)));
        ended
    }

    /// Earliest end among live voices, if any.
    pub fn next_end(&self) -> Option<f64> {
        self.voices.iter().map(Voice::end).min_by(f64::total_cmp)
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn clear(&mut self) {
        self.voices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec(start: f64, length: f64) -> VoiceSpec {
        VoiceSpec {
            owner: VoiceOwner::Sound(SoundId(0)),
            buffer: Arc::new(AudioBuffer::silent(100, 1, length)),
            start,
            offset: 0.0,
            length,
            gain: GainParam::new(1.0),
        }
    }

    #[test]
    fn ramps_interpolate_and_hold() {
        let mut g = GainParam::new(1.0);
        g.set_value_at(0.0, 1.0);
        g.linear_ramp(1.0, 1.0, 2.0);
        assert_eq!(g.value_at(0.5), 1.0);
        assert_eq!(g.value_at(1.0), 0.0);
        assert!((g.value_at(1.5) - 0.5).abs() < 1e-6);
        assert_eq!(g.value_at(3.0), 1.0);
        assert_eq!(g.target(), 1.0);
    }

    #[test]
    fn ramp_from_now_cancels_pending_fade_in() {
        let mut g = GainParam::new(0.0);
        g.set_value_at(0.0, 0.0);
        g.linear_ramp(0.0, 1.0, 1.0);
        g.ramp_from_now(0.5, 0.0, 0.6);
        assert!((g.value_at(0.5) - 0.5).abs() < 1e-6);
        assert!((g.value_at(0.55) - 0.25).abs() < 1e-4);
        assert_eq!(g.value_at(2.0), 0.0);
    }

    #[test]
    fn ended_voices_come_back_in_end_order() {
        let mut t = Timeline::new(8);
        let late = t.spawn(spec(0.0, 3.0)).unwrap();
        let early = t.spawn(spec(0.0, 1.0)).unwrap();
        let stopped = t.spawn(spec(0.0, 10.0)).unwrap();
        t.stop(stopped, 2.0).unwrap();

        let ended = t.collect_ended(5.0);
        let order: Vec<VoiceId> = ended.iter().map(|e| e.id).collect();
        assert_eq!(order, vec![early, stopped, late]);
        assert!(t.is_empty());
    }

    #[test]
    fn detached_voices_end_silently() {
        let mut t = Timeline::new(8);
        let id = t.spawn(spec(0.0, 1.0)).unwrap();
        t.detach(id);
        assert!(t.collect_ended(2.0).is_empty());
    }

    #[test]
    fn double_stop_is_reported_not_applied() {
        let mut t = Timeline::new(8);
        let id = t.spawn(spec(0.0, 5.0)).unwrap();
        t.stop(id, 1.0).unwrap();
        assert_eq!(t.stop(id, 0.5), Err(VoiceError::AlreadyStopped(id)));
        assert_eq!(t.get(id).unwrap().end(), 1.0);
        t.collect_ended(1.0);
        assert_eq!(t.stop(id, 2.0), Err(VoiceError::UnknownVoice(id)));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut t = Timeline::new(1);
        t.spawn(spec(0.0, 1.0)).unwrap();
        assert_eq!(t.spawn(spec(0.0, 1.0)), Err(TimelineError::Capacity { capacity: 1 }));
    }
}

//! A single loopable buffer with two alternating playback decks.
//!
//! The loop attribute of the output device is never used: compressed
//! sources leave gaps at the seam. Instead the next pass (or the chosen
//! successor) is registered on the other deck as soon as the current one
//! starts, at exactly the current pass's end time.

use std::sync::Arc;

use pitfall_shared::{RandomSource, StageId};

use crate::assets::AudioBuffer;
use crate::events::MusicEvent;
use crate::timeline::{GainParam, Timeline, VoiceId, VoiceOwner, VoiceSpec};

/// Offsets below this are treated as already aligned (seconds).
pub const NEGLIGIBLE_OFFSET: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Melodic layer; one of them is the phase master.
    Loop,
    /// Rhythmic layer paced against the master.
    Drum,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Deck {
    pub voice: Option<VoiceId>,
}

/// Where and how far into the buffer a new pass starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartPlan {
    pub at: f64,
    pub offset: f64,
}

/// Choose a start for a track of `duration` that wants to begin at `scheduled`,
/// keeping its loop boundary on the master's grid.
///
/// `master` is `(phase_origin, master_duration)`; `None` means the track
/// defines the phase itself. Large in-buffer seeks are avoided: past half a
/// loop it is cheaper to wait for the next boundary.
pub fn plan_start(scheduled: f64, duration: f64, master: Option<(f64, f64)>) -> StartPlan {
    let Some((origin, master_duration)) = master else {
        return StartPlan { at: scheduled, offset: 0.0 };
    };
    if duration <= 0.0 || master_duration <= 0.0 {
        return StartPlan { at: scheduled, offset: 0.0 };
    }

    // Position inside the current master loop, then inside this track's grid
    // laid from that loop's start.
    let offset = (scheduled - origin)
        .rem_euclid(master_duration)
        .rem_euclid(duration);

    if offset < NEGLIGIBLE_OFFSET {
        // Snap back onto the boundary; still ahead of the clock thanks to the start delay.
        StartPlan { at: scheduled - offset, offset: 0.0 }
    } else if offset > duration / 2.0 {
        // duration - offset lands exactly on the next boundary
        StartPlan { at: scheduled + (duration - offset), offset: 0.0 }
    } else {
        StartPlan { at: scheduled, offset }
    }
}

pub struct Track {
    pub id: TrackId,
    pub key: String,
    pub stage: StageId,
    pub kind: TrackKind,
    /// Nominal loop length in seconds.
    pub duration: f64,
    /// Successor -> weight in table order; the track's own id means "loop".
    pub transitions: Vec<(TrackId, f64)>,
    pub decks: [Deck; 2],
    deck: usize,
    pub buffer: Option<Arc<AudioBuffer>>,
    reverse_buffer: Option<Arc<AudioBuffer>>,
    /// Precompute the reversed copy as soon as the buffer decodes.
    pub reversible: bool,
    /// Start of the current pass; `None` while the track is free.
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    /// Seek into the buffer used by the current pass.
    pub offset: f64,
    pub reverse: bool,
    pub muted: bool,
    /// Successor chosen for the current pass.
    pub next: Option<TrackId>,
    /// End time whose successor has already been registered.
    pub(crate) armed_end: Option<f64>,
    /// Sent once when the first pass ends.
    pub(crate) on_complete: Option<MusicEvent>,
}

impl Track {
    pub fn new(id: TrackId, key: &str, stage: StageId, kind: TrackKind, duration: f64) -> Self {
        Self {
            id,
            key: key.to_string(),
            stage,
            kind,
            duration,
            transitions: Vec::new(),
            decks: [Deck::default(); 2],
            deck: 0,
            buffer: None,
            reverse_buffer: None,
            reversible: false,
            start_time: None,
            end_time: None,
            offset: 0.0,
            reverse: false,
            muted: false,
            next: None,
            armed_end: None,
            on_complete: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn is_scheduled(&self) -> bool {
        self.start_time.is_some()
    }

    /// Time the first sample of the current pass's buffer would play.
    pub fn phase_origin(&self) -> Option<f64> {
        self.start_time.map(|s| s - self.offset)
    }

    pub fn set_buffer(&mut self, buffer: AudioBuffer) {
        self.reverse_buffer = None;
        self.buffer = Some(Arc::new(buffer));
        if self.reversible {
            self.ensure_reverse();
        }
    }

    pub fn has_reverse_cached(&self) -> bool {
        self.reverse_buffer.is_some()
    }

    fn ensure_reverse(&mut self) -> Option<Arc<AudioBuffer>> {
        if self.reverse_buffer.is_none() {
            let buffer = self.buffer.as_ref()?;
            tracing::debug!(track = %self.key, "caching reversed buffer");
            self.reverse_buffer = Some(Arc::new(buffer.reversed()));
        }
        self.reverse_buffer.clone()
    }

    /// Weighted die over the transition table. The value is consumed weight by
    /// weight in table order, boundaries inclusive; rounding residue falls to
    /// the last entry.
    pub fn choose_successor(&self, rng: &mut dyn RandomSource) -> Option<TrackId> {
        let mut dice = rng.next_f64();
        for (target, weight) in &self.transitions {
            if dice <= *weight {
                return Some(*target);
            }
            dice -= weight;
        }
        self.transitions.last().map(|(target, _)| *target)
    }

    /// Record a new pass starting at `plan`.
    pub(crate) fn set_pass(&mut self, plan: StartPlan) {
        self.start_time = Some(plan.at);
        self.offset = plan.offset;
        self.end_time = Some(plan.at + self.duration - plan.offset);
    }

    pub(crate) fn clear_schedule(&mut self) {
        self.start_time = None;
        self.end_time = None;
        self.offset = 0.0;
        self.next = None;
        self.armed_end = None;
    }

    /// Register a voice for one pass on the other deck.
    ///
    /// With an offset the voice crossfades in over `min(offset, fade_in)`,
    /// otherwise it starts at full gain.
    pub(crate) fn start_deck(
        &mut self,
        timeline: &mut Timeline,
        at: f64,
        offset: f64,
        fade_in: f64,
    ) -> Option<VoiceId> {
        let buffer = if self.reverse { self.ensure_reverse()? } else { self.buffer.clone()? };
        self.deck = 1 - self.deck;

        let level = if self.muted { 0.0 } else { 1.0 };
        let mut gain = GainParam::new(level);
        // Never fade for longer than the part of the pass that was skipped.
        let fade = offset.min(fade_in);
        if offset > 0.0 && fade > 0.0 {
            gain.set_value_at(0.0, at);
            gain.linear_ramp(at, level, at + fade);
        }

        let spec = VoiceSpec {
            owner: VoiceOwner::Deck { track: self.id, deck: self.deck },
            buffer,
            start: at,
            offset,
            // ends on the grid boundary, not one full length after `at`
            length: self.duration - offset,
            gain,
        };
        match timeline.spawn(spec) {
            Ok(voice) => {
                self.decks[self.deck].voice = Some(voice);
                Some(voice)
            }
            Err(e) => {
                tracing::warn!(track = %self.key, "dropping pass: {e}");
                None
            }
        }
    }

    /// Free the track immediately and fade its voices out. Stopping is best effort.
    pub(crate) fn stop(&mut self, timeline: &mut Timeline, now: f64, fade_out: f64) {
        self.clear_schedule();
        self.on_complete = None;
        let until = now + fade_out.max(0.0);
        for deck in self.decks.iter_mut() {
            let Some(voice) = deck.voice.take() else { continue };
            timeline.detach(voice);
            if let Some(v) = timeline.get_mut(voice) {
                v.gain.ramp_from_now(now, 0.0, until);
            }
            if let Err(e) = timeline.stop(voice, until) {
                tracing::debug!(track = %self.key, "stop ignored: {e}");
            }
        }
    }

    /// Ramp live decks toward silence or full level. Scheduling is untouched.
    pub(crate) fn set_muted(&mut self, timeline: &mut Timeline, now: f64, muted: bool, ramp: f64) {
        self.muted = muted;
        let target = if muted { 0.0 } else { 1.0 };
        for deck in &self.decks {
            if let Some(v) = deck.voice.and_then(|id| timeline.get_mut(id)) {
                v.gain.ramp_from_now(now, target, now + ramp);
            }
        }
    }

    pub(crate) fn forget_voice(&mut self, deck: usize, voice: VoiceId) {
        if let Some(d) = self.decks.get_mut(deck) {
            if d.voice == Some(voice) {
                d.voice = None;
            }
        }
    }

    pub fn live_decks(&self) -> usize {
        self.decks.iter().filter(|d| d.voice.is_some()).count()
    }
}

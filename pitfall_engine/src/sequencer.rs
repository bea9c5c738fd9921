//! Stage-keyed track sets and the master-track flow between them.
//!
//! Loop tracks are mutually exclusive; whichever one is master defines the
//! phase that every other start is aligned to. Drum tracks run alongside and
//! are paced against the master.

use std::collections::{BTreeMap, HashMap};

use crossbeam_channel::Sender;
use pitfall_shared::config::{ConfigError, LOOP_KEY, StageMusic};
use pitfall_shared::{RandomSource, StageId};

use crate::assets::{AssetTarget, AudioBuffer, LoadRequest};
use crate::engine::AudioContext;
use crate::events::MusicEvent;
use crate::timeline::{VoiceEnded, VoiceOwner};
use crate::track::{StartPlan, Track, TrackId, TrackKind, plan_start};

/// Fade used when swapping drum layers (seconds).
pub const DRUM_SWITCH_FADE: f64 = 0.2;

#[derive(Debug, thiserror::Error)]
pub enum MusicError {
    #[error("stage {0} has not been loaded")]
    UnknownStage(StageId),
    #[error("no stage has been loaded yet")]
    NothingLoaded,
    #[error("stage {stage} has no track '{key}'")]
    UnknownTrack { stage: StageId, key: String },
    #[error("track '{0}' has not finished decoding")]
    NotLoaded(String),
    #[error("stage {stage} has no track for role '{role}'")]
    MissingRole { stage: StageId, role: &'static str },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// How a track should start.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Crossfade length when joining mid-loop; engine default when `None`.
    pub fade_in: Option<f64>,
    pub reverse: bool,
    /// Sent once when the first pass ends.
    pub on_complete: Option<MusicEvent>,
    /// Fixed start time; skips phase alignment.
    pub start_at: Option<f64>,
}

impl StartOptions {
    pub fn at(time: f64) -> Self {
        Self { start_at: Some(time), ..Default::default() }
    }

    pub fn fade(seconds: f64) -> Self {
        Self { fade_in: Some(seconds), ..Default::default() }
    }
}

#[derive(Debug, Clone)]
struct StageTracks {
    loops: Vec<TrackId>,
    drums: Vec<TrackId>,
    intro: TrackId,
    pause: TrackId,
    overlay: TrackId,
    primary_drum: TrackId,
    double_time_drum: TrackId,
}

impl StageTracks {
    fn all(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.loops.iter().chain(self.drums.iter()).copied()
    }
}

pub struct Music {
    tracks: Vec<Track>,
    stages: BTreeMap<StageId, StageTracks>,
    stage: Option<StageId>,
    master: Option<TrackId>,
    rng: Box<dyn RandomSource>,
    events: Sender<MusicEvent>,
}

impl Music {
    pub fn new(rng: Box<dyn RandomSource>, events: Sender<MusicEvent>) -> Self {
        Self {
            tracks: Vec::new(),
            stages: BTreeMap::new(),
            stage: None,
            master: None,
            rng,
            events,
        }
    }

    /// Create the tracks of a stage and return what has to be decoded for them.
    ///
    /// Stages accumulate; registering a stage twice returns no requests. The
    /// very first stage makes its pause loop the master so it starts as soon as
    /// it decodes.
    pub fn register_stage(
        &mut self,
        stage: StageId,
        music: &StageMusic,
    ) -> Result<Vec<LoadRequest>, MusicError> {
        if self.stages.contains_key(&stage) {
            return Ok(Vec::new());
        }
        music.validate(stage)?;

        let base = self.tracks.len();
        let ids: HashMap<&str, TrackId> = music
            .tracks()
            .enumerate()
            .map(|(i, t)| (t.key.as_str(), TrackId(base + i)))
            .collect();
        let role = |role: &'static str, key: &str| {
            ids.get(key).copied().ok_or(MusicError::MissingRole { stage, role })
        };
        let roles = &music.roles;
        let intro = role("intro", &roles.intro)?;
        let pause = role("pause", &roles.pause)?;
        let overlay = role("overlay", &roles.overlay)?;
        let primary_drum = role("primary_drum", &roles.primary_drum)?;
        let double_time_drum = role("double_time_drum", &roles.double_time_drum)?;

        let mut loops = Vec::new();
        let mut drums = Vec::new();
        let mut requests = Vec::new();
        for (i, cfg) in music.tracks().enumerate() {
            let id = TrackId(base + i);
            let kind = if i < music.loops.len() { TrackKind::Loop } else { TrackKind::Drum };
            let mut track = Track::new(id, &cfg.key, stage, kind, cfg.duration);
            track.reversible = cfg.reverse;
            track.transitions = cfg
                .next
                .iter()
                .filter_map(|(key, weight)| {
                    let target = if key == LOOP_KEY { Some(id) } else { ids.get(key.as_str()).copied() };
                    target.map(|t| (t, *weight))
                })
                .collect();

            match kind {
                TrackKind::Loop => loops.push(id),
                TrackKind::Drum => drums.push(id),
            }
            requests.push(LoadRequest {
                path: cfg.path.clone(),
                key: cfg.key.clone(),
                target: AssetTarget::Track(id),
                duration_hint: Some(cfg.duration),
            });
            self.tracks.push(track);
        }

        self.stages.insert(
            stage,
            StageTracks { loops, drums, intro, pause, overlay, primary_drum, double_time_drum },
        );
        if self.stage.is_none() {
            self.stage = Some(stage);
        }
        if self.master.is_none() {
            self.master = Some(pause);
        }
        tracing::info!(stage, tracks = requests.len(), "registered stage");
        Ok(requests)
    }

    /// Attach a decoded buffer. The master starts right away if it was waiting on it.
    pub fn on_track_decoded(&mut self, ctx: &mut AudioContext, id: TrackId, buffer: AudioBuffer) {
        let Some(track) = self.tracks.get_mut(id.0) else { return };
        tracing::debug!(track = %track.key, seconds = buffer.duration(), "track decoded");
        track.set_buffer(buffer);
        if self.master == Some(id) {
            self.schedule_start(ctx, id, StartOptions::default());
        }
    }

    /// Start a track and arm its successor. No-op while it is already scheduled.
    pub fn schedule_start(&mut self, ctx: &mut AudioContext, id: TrackId, options: StartOptions) -> bool {
        if !self.begin(ctx, id, options) {
            return false;
        }
        self.arm_successor(ctx, id);
        true
    }

    fn begin(&mut self, ctx: &mut AudioContext, id: TrackId, options: StartOptions) -> bool {
        let Some(track) = self.tracks.get(id.0) else { return false };
        if track.is_scheduled() {
            tracing::debug!(track = %track.key, "already scheduled");
            return false;
        }
        if !track.is_ready() {
            tracing::warn!(track = %track.key, "cannot start before decode");
            return false;
        }

        let plan = match options.start_at {
            // An explicit time is already a boundary of the previous pass.
            Some(at) => StartPlan { at, offset: 0.0 },
            None => plan_start(
                ctx.transport.now() + ctx.config.start_delay,
                track.duration,
                self.phase_reference(id),
            ),
        };
        let fade_in = options.fade_in.unwrap_or(ctx.config.fade_in_time);

        let track = &mut self.tracks[id.0];
        track.reverse = options.reverse;
        track.set_pass(plan);
        if track.start_deck(&mut ctx.timeline, plan.at, plan.offset, fade_in).is_none() {
            track.clear_schedule();
            return false;
        }
        track.on_complete = options.on_complete;

        tracing::info!(
            stage = track.stage,
            track = %track.key,
            at = plan.at,
            offset = plan.offset,
            "starting track"
        );
        let event = MusicEvent::TrackStarted {
            stage: track.stage,
            key: track.key.clone(),
            at: plan.at,
            offset: plan.offset,
        };
        self.emit(event);
        true
    }

    /// `(phase origin, duration)` of the master, unless `id` defines the phase itself.
    fn phase_reference(&self, id: TrackId) -> Option<(f64, f64)> {
        let master_id = self.master?;
        if master_id == id {
            return None;
        }
        let master = self.tracks.get(master_id.0)?;
        // The master's own successor starts on its end, which is the new origin.
        if master.next == Some(id) {
            return None;
        }
        master.phase_origin().map(|origin| (origin, master.duration))
    }

    /// Draw the successor of the current pass and register it at the pass's end.
    fn arm_successor(&mut self, ctx: &mut AudioContext, id: TrackId) {
        let Some(track) = self.tracks.get(id.0) else { return };
        let Some(at) = track.end_time else { return };
        // One successor per pass end.
        if track.armed_end == Some(at) {
            return;
        }
        let Some(next) = track.choose_successor(self.rng.as_mut()) else { return };

        let track = &mut self.tracks[id.0];
        track.armed_end = Some(at);
        track.next = Some(next);
        if next == id {
            tracing::debug!(track = %track.key, at, "looping");
            track.start_deck(&mut ctx.timeline, at, 0.0, 0.0);
            return;
        }
        tracing::debug!(
            track = %self.tracks[id.0].key,
            next = %self.tracks[next.0].key,
            at,
            "successor armed"
        );
        self.begin(ctx, next, StartOptions::at(at));
    }

    /// End handler for deck voices. The successor is armed before any
    /// completion event of this track is sent.
    pub fn on_voice_ended(&mut self, ctx: &mut AudioContext, ended: &VoiceEnded) {
        let VoiceOwner::Deck { track: id, deck } = ended.owner else { return };
        let Some(track) = self.tracks.get_mut(id.0) else { return };
        track.forget_voice(deck, ended.id);

        let next = track.next;
        let completion = track.on_complete.take();
        if next == Some(id) {
            // The armed repeat becomes the current pass.
            if let Some(at) = track.end_time {
                track.set_pass(StartPlan { at, offset: 0.0 });
            }
        } else {
            track.clear_schedule();
        }

        // Master first, so the successor's successor is phased against it.
        if let Some(next) = next {
            if self.master == Some(id) && next != id {
                self.set_master(next);
            }
            self.arm_successor(ctx, next);
        }
        if let Some(event) = completion {
            self.emit(event);
        }
    }

    fn set_master(&mut self, id: TrackId) {
        if self.master == Some(id) {
            return;
        }
        self.master = Some(id);
        if let Some(track) = self.tracks.get(id.0) {
            tracing::info!(stage = track.stage, track = %track.key, "master track");
            let event = MusicEvent::MasterChanged { stage: track.stage, key: track.key.clone() };
            self.emit(event);
        }
    }

    fn emit(&self, event: MusicEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Stop one track. `fade` defaults to the engine fade-out time.
    pub fn stop_track(&mut self, ctx: &mut AudioContext, id: TrackId, fade: Option<f64>) {
        let fade = fade.unwrap_or(ctx.config.fade_out_time);
        let now = ctx.transport.now();
        if let Some(track) = self.tracks.get_mut(id.0) {
            track.stop(&mut ctx.timeline, now, fade);
        }
    }

    fn stop_stage(&mut self, ctx: &mut AudioContext, stage: StageId, fade: Option<f64>) {
        let ids: Vec<TrackId> = match self.stages.get(&stage) {
            Some(tracks) => tracks.all().collect(),
            None => return,
        };
        for id in ids {
            self.stop_track(ctx, id, fade);
        }
    }

    /// Stop every track of the current stage.
    pub fn stop(&mut self, ctx: &mut AudioContext) {
        if let Some(stage) = self.stage {
            self.stop_stage(ctx, stage, None);
        }
    }

    fn current(&self) -> Result<(StageId, &StageTracks), MusicError> {
        let stage = self.stage.ok_or(MusicError::NothingLoaded)?;
        let tracks = self.stages.get(&stage).ok_or(MusicError::UnknownStage(stage))?;
        Ok((stage, tracks))
    }

    fn require_ready(&self, id: TrackId) -> Result<(), MusicError> {
        match self.tracks.get(id.0) {
            Some(t) if t.is_ready() => Ok(()),
            Some(t) => Err(MusicError::NotLoaded(t.key.clone())),
            None => Err(MusicError::NothingLoaded),
        }
    }

    /// Start the intro of `stage` (or the current stage) with the primary drum
    /// pre-armed at the intro's end.
    pub fn play(&mut self, ctx: &mut AudioContext, stage: Option<StageId>) -> Result<(), MusicError> {
        let target = match stage {
            Some(s) => s,
            None => self.stage.ok_or(MusicError::NothingLoaded)?,
        };
        let tracks = self.stages.get(&target).ok_or(MusicError::UnknownStage(target))?;
        let (intro, drum) = (tracks.intro, tracks.primary_drum);
        self.require_ready(intro)?;

        self.stop(ctx);
        self.stage = Some(target);
        self.set_master(intro);
        self.schedule_start(ctx, intro, StartOptions::default());
        match self.tracks[intro.0].end_time {
            Some(end) => {
                self.schedule_start(ctx, drum, StartOptions::at(end));
            }
            None => tracing::warn!(stage = target, "intro did not start, drums left idle"),
        }
        Ok(())
    }

    /// Stop everything and loop the pause track, optionally reversed.
    pub fn pause(&mut self, ctx: &mut AudioContext, reverse: bool) -> Result<(), MusicError> {
        let pause = self.current()?.1.pause;
        self.require_ready(pause)?;
        self.stop(ctx);
        self.set_master(pause);
        self.schedule_start(ctx, pause, StartOptions { reverse, ..Default::default() });
        Ok(())
    }

    /// Back to the first stage, from the intro.
    pub fn reset(&mut self, ctx: &mut AudioContext) -> Result<(), MusicError> {
        let first = *self.stages.keys().next().ok_or(MusicError::NothingLoaded)?;
        self.play(ctx, Some(first))
    }

    /// Swap the drum layer between half time and double time. A running
    /// overlay is never interrupted: the new layer waits for its end.
    pub fn double_time(&mut self, ctx: &mut AudioContext, enable: bool) -> Result<(), MusicError> {
        let (_, tracks) = self.current()?;
        let chosen = if enable { tracks.double_time_drum } else { tracks.primary_drum };
        let others: Vec<TrackId> = tracks.drums.iter().copied().filter(|d| *d != chosen).collect();
        let overlay = tracks.overlay;

        for id in others {
            self.stop_track(ctx, id, Some(DRUM_SWITCH_FADE));
        }
        let overlay_end = self.tracks[overlay.0].start_time.and(self.tracks[overlay.0].end_time);
        let options = match overlay_end {
            Some(end) => StartOptions::at(end),
            None => StartOptions::fade(DRUM_SWITCH_FADE),
        };
        self.schedule_start(ctx, chosen, options);
        Ok(())
    }

    /// Play the overlay loop once as master, then let the drums resume in phase.
    /// `MusicEvent::OverlayFinished` is sent when its first pass ends.
    pub fn overlay_one_shot(&mut self, ctx: &mut AudioContext) -> Result<(), MusicError> {
        let (stage, tracks) = self.current()?;
        let overlay = tracks.overlay;
        let mut resume = tracks.primary_drum;
        for &id in &tracks.drums {
            let candidate = self.tracks[id.0].start_time;
            let current = self.tracks[resume.0].start_time;
            if current.is_none() || candidate > current {
                resume = id;
            }
        }
        self.require_ready(overlay)?;

        self.stop(ctx);
        self.set_master(overlay);
        let options = StartOptions {
            on_complete: Some(MusicEvent::OverlayFinished { stage }),
            ..Default::default()
        };
        self.schedule_start(ctx, overlay, options);
        if let Some(end) = self.tracks[overlay.0].end_time {
            self.schedule_start(ctx, resume, StartOptions::at(end));
        }
        Ok(())
    }

    /// Toggle the shared master gain.
    pub fn mute(&self, ctx: &mut AudioContext) -> bool {
        ctx.toggle_mute()
    }

    /// Ramp a single track in or out without touching its schedule.
    pub fn set_track_muted(
        &mut self,
        ctx: &mut AudioContext,
        stage: StageId,
        key: &str,
        muted: bool,
    ) -> Result<(), MusicError> {
        let id = self.track_id(stage, key)?;
        let now = ctx.transport.now();
        let ramp = ctx.config.mute_ramp;
        self.tracks[id.0].set_muted(&mut ctx.timeline, now, muted, ramp);
        Ok(())
    }

    /// Primary-drum bars elapsed at `time` since the master started.
    pub fn bars_at(&self, time: f64) -> Option<f64> {
        let start = self.master_track()?.start_time?;
        let (_, tracks) = self.current().ok()?;
        let bar = self.tracks.get(tracks.primary_drum.0)?.duration;
        (bar > 0.0).then(|| ((time - start) / bar).round())
    }

    pub fn master_track(&self) -> Option<&Track> {
        self.master.and_then(|id| self.tracks.get(id.0))
    }

    pub fn stage(&self) -> Option<StageId> {
        self.stage
    }

    pub fn is_registered(&self, stage: StageId) -> bool {
        self.stages.contains_key(&stage)
    }

    pub fn track_id(&self, stage: StageId, key: &str) -> Result<TrackId, MusicError> {
        let tracks = self.stages.get(&stage).ok_or(MusicError::UnknownStage(stage))?;
        tracks
            .all()
            .find(|id| self.tracks[id.0].key == key)
            .ok_or_else(|| MusicError::UnknownTrack { stage, key: key.to_string() })
    }

    pub fn track(&self, stage: StageId, key: &str) -> Option<&Track> {
        let id = self.track_id(stage, key).ok()?;
        self.tracks.get(id.0)
    }

    pub fn track_by_id(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(id.0)
    }

    /// Tracks of a stage that currently hold a schedule.
    pub fn active_tracks(&self, stage: StageId) -> Vec<&Track> {
        match self.stages.get(&stage) {
            Some(tracks) => tracks
                .all()
                .map(|id| &self.tracks[id.0])
                .filter(|t| t.is_scheduled())
                .collect(),
            None => Vec::new(),
        }
    }
}

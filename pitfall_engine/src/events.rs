use pitfall_shared::StageId;

/// Notifications from the music engine to the game layer.
///
/// Completion callbacks are delivered through this stream. A track's
/// one-shot notice is sent only after its successor has been armed.
#[derive(Debug, Clone, PartialEq)]
pub enum MusicEvent {
    /// Every asset requested by `load_stage` has decoded.
    StageReady(StageId),
    /// An asset could not be fetched or decoded; the stage will never report ready.
    LoadFailed { stage: StageId, url: String, reason: String },
    /// A new track defines the loop phase.
    MasterChanged { stage: StageId, key: String },
    TrackStarted { stage: StageId, key: String, at: f64, offset: f64 },
    /// The overlay one-shot played through its first loop.
    OverlayFinished { stage: StageId },
}

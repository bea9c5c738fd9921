pub mod assets;
pub mod engine; // AudioEngine lives here
pub mod events;
pub mod export;
pub mod mixer;
pub mod sequencer;
pub mod sounds;
pub mod timeline;
pub mod track;
pub mod transport;

// Re-exports
pub use assets::{AssetLoader, AudioBuffer, MemoryLoader, WavLoader};
pub use engine::{AudioContext, AudioEngine};
pub use events::MusicEvent;
pub use sequencer::{Music, MusicError, StartOptions};
pub use track::{Track, TrackId};

use serde::{Deserialize, Serialize};

pub mod config;
pub mod random;

pub use config::{ConfigError, GameConfig};
pub use random::{RandomSource, ScriptedRandom};

/// Stage number as used by the level tables (1-based).
pub type StageId = u32;

/// Frames below this value are rock edge masks (0..=15).
/// Frames at or above it are pickups and never count as rock.
pub const FIRST_PICKUP_FRAME: u8 = 16;

pub const FRAME_HEALTH: u8 = 16;
pub const FRAME_ENERGY: u8 = 17;
pub const FRAME_BONUS: u8 = 18;
pub const FRAME_SPECIAL: u8 = 19;

/// Edge bits of a rock frame. A bit is set when the neighbor on that side is not rock.
pub const EDGE_LEFT: u8 = 1;
pub const EDGE_BOTTOM: u8 = 2;
pub const EDGE_RIGHT: u8 = 4;
pub const EDGE_TOP: u8 = 8;

/// Kinds of collectable items a gap cell can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pickup {
    Health,
    Energy,
    Bonus,
    /// Starship power-up, triggers the overlay one-shot.
    Special,
}

impl Pickup {
    pub fn frame(self) -> u8 {
        match self {
            Pickup::Health => FRAME_HEALTH,
            Pickup::Energy => FRAME_ENERGY,
            Pickup::Bonus => FRAME_BONUS,
            Pickup::Special => FRAME_SPECIAL,
        }
    }

    pub fn from_frame(frame: u8) -> Option<Self> {
        match frame {
            FRAME_HEALTH => Some(Pickup::Health),
            FRAME_ENERGY => Some(Pickup::Energy),
            FRAME_BONUS => Some(Pickup::Bonus),
            FRAME_SPECIAL => Some(Pickup::Special),
            _ => None,
        }
    }
}

/// Container the assets are fetched in. Probing what the platform can decode
/// happens outside the core; the host just picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioFormat {
    Ogg,
    M4a,
    #[default]
    Wav,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Ogg => "ogg",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pickup_frames_round_trip_through_frame_codes() {
        for p in [Pickup::Health, Pickup::Energy, Pickup::Bonus, Pickup::Special] {
            assert!(p.frame() >= FIRST_PICKUP_FRAME);
            assert_eq!(Pickup::from_frame(p.frame()), Some(p));
        }
        assert_eq!(Pickup::from_frame(15), None);
    }

    #[test]
    fn edge_bits_cover_the_full_mask() {
        assert_eq!(EDGE_LEFT | EDGE_BOTTOM | EDGE_RIGHT | EDGE_TOP, 15);
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{AudioFormat, StageId};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("track '{track}' in stage {stage} has an empty transition table")]
    EmptyTransitions { stage: StageId, track: String },
    #[error("track '{track}' in stage {stage} transitions to unknown track '{target}'")]
    UnknownSuccessor { stage: StageId, track: String, target: String },
    #[error("stage {stage} role '{role}' names unknown track '{track}'")]
    MissingRole { stage: StageId, role: &'static str, track: String },
    #[error("no level config for stage {0}")]
    MissingLevel(StageId),
}

/// Key in a transition table meaning "repeat this same track".
pub const LOOP_KEY: &str = "loop";

/// Audio clock and output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Scheduling lead time so a start never races the audio clock (seconds).
    pub start_delay: f64,
    pub fade_in_time: f64,
    pub fade_out_time: f64,
    pub master_gain: f32,
    /// Ramp used by mute toggles to avoid clicks (seconds).
    pub mute_ramp: f64,
    pub sample_rate: u32,
    /// Upper bound of simultaneously registered voices.
    pub max_voices: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            start_delay: 0.2,
            fade_in_time: 0.2,
            fade_out_time: 0.1,
            master_gain: 1.0,
            mute_ramp: 0.05,
            sample_rate: 44100,
            max_voices: 64,
        }
    }
}

/// One loopable track of a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    pub key: String,
    pub path: String,
    /// Nominal loop length in seconds, precomputed from the source audio.
    pub duration: f64,
    /// Successor key -> weight, walked in order. `"loop"` repeats the track.
    pub next: Vec<(String, f64)>,
    /// Whether a reversed copy may be requested for this track.
    #[serde(default)]
    pub reverse: bool,
}

impl TrackConfig {
    pub fn new(key: &str, path: &str, duration: f64, next: &[(&str, f64)]) -> Self {
        Self {
            key: key.to_string(),
            path: path.to_string(),
            duration,
            next: next.iter().map(|(k, w)| (k.to_string(), *w)).collect(),
            reverse: false,
        }
    }

    pub fn reversible(mut self) -> Self {
        self.reverse = true;
        self
    }
}

/// Which tracks of a stage play which part in the music flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRoles {
    pub intro: String,
    pub pause: String,
    /// One-shot overlay loop (starship power-up).
    pub overlay: String,
    /// Half-time drum layer started with the intro.
    pub primary_drum: String,
    pub double_time_drum: String,
}

impl Default for StageRoles {
    fn default() -> Self {
        Self {
            intro: "intro".to_string(),
            pause: "pause".to_string(),
            overlay: "starship".to_string(),
            primary_drum: "drums1".to_string(),
            double_time_drum: "drums2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMusic {
    pub loops: Vec<TrackConfig>,
    pub drums: Vec<TrackConfig>,
    #[serde(default)]
    pub roles: StageRoles,
}

impl StageMusic {
    pub fn tracks(&self) -> impl Iterator<Item = &TrackConfig> {
        self.loops.iter().chain(self.drums.iter())
    }

    pub fn validate(&self, stage: StageId) -> Result<(), ConfigError> {
        let known = |key: &str| self.tracks().any(|t| t.key == key);
        for track in self.tracks() {
            if track.next.is_empty() {
                return Err(ConfigError::EmptyTransitions { stage, track: track.key.clone() });
            }
            for (target, _) in &track.next {
                if target != LOOP_KEY && !known(target) {
                    return Err(ConfigError::UnknownSuccessor {
                        stage,
                        track: track.key.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
        let roles = [
            ("intro", &self.roles.intro),
            ("pause", &self.roles.pause),
            ("overlay", &self.roles.overlay),
            ("primary_drum", &self.roles.primary_drum),
            ("double_time_drum", &self.roles.double_time_drum),
        ];
        for (role, key) in roles {
            if !known(key) {
                return Err(ConfigError::MissingRole { stage, role, track: key.clone() });
            }
        }
        Ok(())
    }
}

/// One-shot effects shared by every stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundConfig {
    pub path: String,
    pub keys: Vec<String>,
    pub gain: f32,
    /// A sound is not retriggered within this window (seconds).
    pub retrigger_delay: f64,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            path: "sounds/".to_string(),
            keys: ["hurt", "die", "arrow", "hit", "rupee", "shield"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            gain: 0.6,
            retrigger_delay: 0.1,
        }
    }
}

/// Geometry of the playfield and the renderable pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarthConfig {
    pub width: u32,
    pub height: u32,
    pub block_width: u32,
    pub level_height: u32,
    /// Pixels scrolled per tick while the player is alive.
    pub scroll_step: f64,
    /// Pixels scrolled per tick after death.
    pub dying_scroll_step: f64,
    pub explosion_pool: usize,
    /// Ticks an explosion stays alive.
    pub explosion_ticks: u32,
    /// Extra rows of item capacity beyond the visible ones.
    pub look_ahead_rows: u32,
}

impl Default for EarthConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            block_width: 50,
            level_height: 50,
            scroll_step: 4.0,
            dying_scroll_step: 1.0,
            explosion_pool: 30,
            explosion_ticks: 16,
            look_ahead_rows: 4,
        }
    }
}

impl EarthConfig {
    pub fn columns(&self) -> usize {
        (self.width / self.block_width.max(1)) as usize
    }

    /// Rows that fit on screen; generation runs this far ahead of the ship.
    pub fn visible_rows(&self) -> u32 {
        self.height / self.level_height.max(1)
    }

    pub fn step_for(&self, player_alive: bool) -> f64 {
        if player_alive { self.scroll_step } else { self.dying_scroll_step }
    }
}

/// Per-kind spawn odds inside the gap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpawnOdds {
    pub special: f64,
    pub bonus: f64,
    pub health: f64,
    pub energy: f64,
}

/// Row generation parameters of one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelConfig {
    pub initial_autocorrelation: f64,
    /// Autocorrelation is multiplied by this once per row.
    pub difficulty_factor: f64,
    /// Initial periods (rows) of the two gap oscillators.
    pub lfo_periods: [f64; 2],
    /// Per-row multiplier applied to each oscillator period.
    pub lfo_decay: [f64; 2],
    /// Mean gap width in columns.
    pub gap_width: f64,
    /// Uniform jitter around the mean gap width.
    pub gap_jitter: f64,
    pub spawn: SpawnOdds,
    /// Depth at which this stage is complete.
    pub goal_depth: u32,
}

impl LevelConfig {
    fn stage_one() -> Self {
        Self {
            initial_autocorrelation: 0.9,
            difficulty_factor: 0.9999,
            lfo_periods: [64.0, 23.0],
            lfo_decay: [0.9995, 0.999],
            gap_width: 4.5,
            gap_jitter: 1.5,
            spawn: SpawnOdds { special: 0.0005, bonus: 0.001, health: 0.004, energy: 0.015 },
            goal_depth: 500,
        }
    }

    fn stage_two() -> Self {
        Self {
            initial_autocorrelation: 0.85,
            difficulty_factor: 0.9998,
            lfo_periods: [48.0, 17.0],
            lfo_decay: [0.999, 0.998],
            gap_width: 4.0,
            gap_jitter: 1.5,
            spawn: SpawnOdds { special: 0.001, bonus: 0.0015, health: 0.006, energy: 0.02 },
            goal_depth: 1200,
        }
    }
}

/// Everything the core needs, keyed by stage where it varies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub format: AudioFormat,
    #[serde(default)]
    pub sounds: SoundConfig,
    #[serde(default)]
    pub earth: EarthConfig,
    pub music: BTreeMap<StageId, StageMusic>,
    pub levels: BTreeMap<StageId, LevelConfig>,
}

impl GameConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (stage, music) in &self.music {
            music.validate(*stage)?;
            if !self.levels.contains_key(stage) {
                return Err(ConfigError::MissingLevel(*stage));
            }
        }
        Ok(())
    }

    pub fn first_stage(&self) -> StageId {
        self.music.keys().next().copied().unwrap_or(1)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        let mut music = BTreeMap::new();
        music.insert(1, stage_one_music());
        music.insert(2, stage_two_music());

        let mut levels = BTreeMap::new();
        levels.insert(1, LevelConfig::stage_one());
        levels.insert(2, LevelConfig::stage_two());

        Self {
            transport: TransportConfig::default(),
            format: AudioFormat::default(),
            sounds: SoundConfig::default(),
            earth: EarthConfig::default(),
            music,
            levels,
        }
    }
}

fn stage_one_music() -> StageMusic {
    let p = "music/level1/";
    StageMusic {
        loops: vec![
            TrackConfig::new("pause", p, 45.176485260770974, &[("loop", 1.0)]).reversible(),
            TrackConfig::new("intro", p, 5.647074829931973, &[("verse1", 1.0)]),
            TrackConfig::new("verse1", p, 39.529433106575965, &[("verse2", 0.8), ("ref", 0.2)]),
            TrackConfig::new("verse2", p, 39.529433106575965, &[("verse1", 0.2), ("ref", 0.8)]),
            TrackConfig::new("ref", p, 33.88235827664399, &[("verse2", 0.4), ("bridge", 0.6)]),
            TrackConfig::new("bridge", p, 33.88235827664399, &[("verse1", 0.4), ("verse2", 0.2), ("ref", 0.4)]),
            TrackConfig::new("starship", p, 16.941179138321996, &[("verse2", 1.0)]),
        ],
        drums: vec![
            TrackConfig::new("drums0", p, 11.294126984126985, &[("drums1", 1.0)]),
            TrackConfig::new("drums1", p, 5.647074829931973, &[("loop", 0.8), ("drums0", 0.2)]),
            TrackConfig::new("drums2", p, 11.294126984126985, &[("loop", 0.8), ("drums3", 0.2)]),
            TrackConfig::new("drums3", p, 11.294126984126985, &[("drums2", 1.0)]),
        ],
        roles: StageRoles::default(),
    }
}

fn stage_two_music() -> StageMusic {
    let p = "music/level2/";
    StageMusic {
        loops: vec![
            TrackConfig::new("pause", p, 45.176485260770974, &[("loop", 1.0)]).reversible(),
            TrackConfig::new("intro", p, 44.30770975056689, &[("verse1", 1.0)]),
            TrackConfig::new("verse1", p, 22.153854875283447, &[("loop", 0.2), ("ref", 0.8)]),
            TrackConfig::new("ref", p, 29.538480725623582, &[("verse1", 0.3), ("bridge1", 0.6), ("bridge2", 0.2)]),
            TrackConfig::new("bridge1", p, 14.769251700680272, &[("verse1", 0.5), ("ref", 0.5)]),
            TrackConfig::new("bridge2", p, 44.30770975056689, &[("verse1", 0.5), ("ref", 0.5)]),
            TrackConfig::new("starship", p, 22.153854875283447, &[("verse1", 1.0)]),
        ],
        drums: vec![
            TrackConfig::new("drums0", p, 7.384625850340136, &[("drums1", 1.0)]),
            TrackConfig::new("drums1", p, 7.384625850340136, &[("loop", 0.8), ("drums0", 0.2)]),
            TrackConfig::new("drums2", p, 7.384625850340136, &[("loop", 1.0)]),
        ],
        roles: StageRoles::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_tables_validate() {
        let config = GameConfig::default();
        config.validate().expect("built-in tables are consistent");
        assert_eq!(config.first_stage(), 1);
        assert_eq!(config.earth.columns(), 16);
        assert_eq!(config.earth.visible_rows(), 12);
    }

    #[test]
    fn transition_order_is_preserved() {
        let config = GameConfig::default();
        let bridge = config.music[&1].loops.iter().find(|t| t.key == "bridge").unwrap();
        let keys: Vec<&str> = bridge.next.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["verse1", "verse2", "ref"]);
    }

    #[test]
    fn json_round_trip_keeps_tables() {
        let config = GameConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed = GameConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed.music[&2].drums.len(), 3);
        assert_eq!(parsed.levels[&1].goal_depth, config.levels[&1].goal_depth);
    }

    #[test]
    fn unknown_successor_is_rejected() {
        let mut config = GameConfig::default();
        if let Some(stage) = config.music.get_mut(&1) {
            stage.loops[1].next = vec![("nowhere".to_string(), 1.0)];
        }
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSuccessor { .. }), "{err}");
    }
}

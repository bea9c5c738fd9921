use std::collections::BTreeMap;

use pitfall_shared::config::LevelConfig;
use pitfall_shared::{ConfigError, GameConfig, StageId};

/// Per-stage generation parameters and the depth goals that chain stages.
#[derive(Debug, Clone)]
pub struct LevelDirector {
    levels: BTreeMap<StageId, LevelConfig>,
}

impl LevelDirector {
    pub fn new(levels: BTreeMap<StageId, LevelConfig>) -> Self {
        Self { levels }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(config.levels.clone())
    }

    pub fn config_for(&self, stage: StageId) -> Result<&LevelConfig, ConfigError> {
        self.levels.get(&stage).ok_or(ConfigError::MissingLevel(stage))
    }

    pub fn first_stage(&self) -> Option<StageId> {
        self.levels.keys().next().copied()
    }

    pub fn next_stage(&self, stage: StageId) -> Option<StageId> {
        self.levels.range(stage + 1..).next().map(|(s, _)| *s)
    }

    pub fn goal_for(&self, stage: StageId) -> u32 {
        self.levels.get(&stage).map_or(u32::MAX, |l| l.goal_depth)
    }

    /// Stage to be playing at `depth`: the first whose goal is still ahead.
    /// Past every goal the last stage keeps going.
    pub fn stage_for_depth(&self, depth: u32) -> Option<StageId> {
        self.levels
            .iter()
            .find(|(_, l)| l.goal_depth > depth)
            .or_else(|| self.levels.iter().next_back())
            .map(|(s, _)| *s)
    }
}

//! One game: the earth scrolling under the ship, the player's numbers and
//! the music following both.

use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use pitfall_earth::{CellId, Earth, LevelDirector, Player, PlayerSignal, Volley};
use pitfall_engine::{AssetLoader, AudioEngine, MusicEvent};
use pitfall_shared::{random, GameConfig, StageId};

pub const TICKS_PER_SECOND: f64 = 60.0;

/// What happened during one tick, for logging and tests.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub depth: u32,
    pub stage: StageId,
    pub signal: Option<PlayerSignal>,
    pub events: Vec<MusicEvent>,
}

pub struct Session {
    pub engine: AudioEngine,
    pub earth: Earth,
    pub player: Player,
    director: LevelDirector,
    config: GameConfig,
    events: Receiver<MusicEvent>,
    stage: StageId,
    /// Stage to start playing as soon as its assets are in.
    pending_play: Option<StageId>,
    recording: Option<Vec<f32>>,
}

impl Session {
    pub fn new(config: GameConfig, loader: Box<dyn AssetLoader>, seed: u64) -> Result<Self> {
        let director = LevelDirector::from_config(&config);
        let stage = director.first_stage().unwrap_or_else(|| config.first_stage());
        let level = director.config_for(stage)?.clone();

        let mut engine = AudioEngine::new(&config, loader, random::seeded(seed));
        let events = engine.events();
        engine.load_stage(stage).with_context(|| format!("loading stage {stage}"))?;

        // Separate streams so music choices never shift the terrain.
        let earth = Earth::new(config.earth.clone(), level, random::seeded(seed.wrapping_add(1)));
        let player = Player::new(stage, director.goal_for(stage));

        Ok(Self {
            engine,
            earth,
            player,
            director,
            config,
            events,
            stage,
            pending_play: None,
            recording: None,
        })
    }

    pub fn stage(&self) -> StageId {
        self.stage
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn wait_ready(&mut self, timeout: Duration) -> bool {
        self.engine.wait_ready(self.stage, timeout)
    }

    /// Start the stage's music now if it is loaded, otherwise once it is.
    pub fn start(&mut self) -> Result<()> {
        self.pending_play = Some(self.stage);
        self.engine.load_stage(self.stage)?;
        self.engine.pump();
        self.handle_events();
        Ok(())
    }

    /// Mix every following tick into a buffer instead of only moving the clock.
    pub fn record(&mut self) {
        self.recording = Some(Vec::new());
    }

    pub fn take_recording(&mut self) -> Option<Vec<f32>> {
        self.recording.take()
    }

    /// One frame of game time.
    pub fn tick(&mut self) -> Result<TickReport> {
        self.engine.pump();

        let step = self.config.earth.step_for(self.player.is_alive());
        let depth = self.earth.advance(step);

        let mut signal = None;
        if self.player.is_alive() {
            signal = self.player.update(depth, self.director.goal_for(self.stage));
            if signal == Some(PlayerSignal::DoubleTimeOff) {
                self.music(|e| e.double_time(false));
            }
            if let Some(next) = self.director.stage_for_depth(depth) {
                if next != self.stage {
                    self.switch_stage(next)?;
                }
            }
        }

        self.advance_audio();
        let events = self.handle_events();
        Ok(TickReport { depth, stage: self.stage, signal, events })
    }

    fn advance_audio(&mut self) {
        let frame = 1.0 / TICKS_PER_SECOND;
        match self.recording.as_mut() {
            Some(buffer) => {
                let frames = (frame * self.engine.ctx.transport.sample_rate as f64).round() as usize;
                let start = buffer.len();
                buffer.resize(start + frames * 2, 0.0);
                self.engine.render(&mut buffer[start..]);
            }
            None => self.engine.advance(frame),
        }
    }

    fn handle_events(&mut self) -> Vec<MusicEvent> {
        let events: Vec<MusicEvent> = self.events.try_iter().collect();
        for event in &events {
            match event {
                MusicEvent::StageReady(stage) if self.pending_play == Some(*stage) => {
                    self.pending_play = None;
                    if self.player.is_alive() {
                        self.resume_music(*stage);
                    }
                }
                MusicEvent::OverlayFinished { .. } => self.player.starship = false,
                MusicEvent::LoadFailed { url, reason, .. } => {
                    tracing::warn!(%url, %reason, "music asset missing");
                }
                _ => {}
            }
        }
        events
    }

    fn resume_music(&mut self, stage: StageId) {
        self.music(|e| e.play(Some(stage)));
        if self.player.in_double_time() {
            self.music(|e| e.double_time(true));
        }
    }

    fn switch_stage(&mut self, next: StageId) -> Result<()> {
        let level = self.director.config_for(next)?.clone();
        tracing::info!(from = self.stage, to = next, "stage complete");
        self.earth.set_level(level);
        self.stage = next;
        self.player.stage = next;
        self.player.goal = self.director.goal_for(next);
        self.pending_play = Some(next);
        self.engine.load_stage(next)?;
        Ok(())
    }

    /// Music failures never stop the game; they are logged and dropped.
    fn music<F>(&mut self, f: F)
    where
        F: FnOnce(&mut AudioEngine) -> Result<(), pitfall_engine::MusicError>,
    {
        if let Err(e) = f(&mut self.engine) {
            tracing::warn!("music: {e}");
        }
    }

    /// A bullet reached a cell. Only rock stops bullets. Returns whether it did.
    pub fn bullet_hits(&mut self, cell: CellId) -> bool {
        let Some(c) = self.earth.cell(cell) else { return false };
        if !c.is_block() {
            return false;
        }
        self.earth.explode(cell);
        self.earth.kill(cell, true);
        self.engine.play_sound("hit");
        true
    }

    /// The ship touched a cell: pickups are collected, rock hurts.
    pub fn player_hits(&mut self, cell: CellId) -> Option<PlayerSignal> {
        if !self.player.is_alive() {
            return None;
        }
        let (pickup, is_block) = self.earth.cell(cell).map(|c| (c.pickup(), c.is_block()))?;
        if let Some(pickup) = pickup {
            self.earth.kill(cell, true);
            self.engine.play_sound("rupee");
            let signal = self.player.collect(pickup);
            match signal {
                PlayerSignal::DoubleTimeOn => self.music(|e| e.double_time(true)),
                PlayerSignal::Overlay => self.music(|e| e.overlay_one_shot()),
                _ => {}
            }
            return Some(signal);
        }
        if !is_block {
            return None;
        }

        self.earth.kill(cell, true);
        self.earth.explode(cell);
        self.engine.play_sound("hurt");
        let signal = self.player.take_hit();
        if signal == PlayerSignal::Died {
            tracing::info!(depth = self.earth.depth(), stage = self.stage, "player died");
            self.engine.play_sound("die");
            self.music(|e| e.pause(true));
        }
        Some(signal)
    }

    pub fn fire(&mut self) -> Option<Volley> {
        let volley = self.player.fire(self.engine.now())?;
        self.engine.play_sound("arrow");
        Some(volley)
    }

    pub fn pause(&mut self) {
        self.music(|e| e.pause(false));
    }

    pub fn resume(&mut self) {
        self.resume_music(self.stage);
    }

    /// New earth and a revived ship, back at the first stage.
    pub fn restart(&mut self) -> Result<()> {
        let first = self.director.first_stage().unwrap_or(self.stage);
        self.earth.reset();
        self.earth.set_level(self.director.config_for(first)?.clone());
        self.player.stage = first;
        self.player.goal = self.director.goal_for(first);
        self.player.reset();
        self.stage = first;
        self.pending_play = Some(first);
        self.engine.load_stage(first)?;
        self.handle_events();
        Ok(())
    }
}

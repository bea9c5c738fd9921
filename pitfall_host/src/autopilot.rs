//! Stand-in for a human at the controls, so headless runs collide, collect
//! and shoot like a real game.

use pitfall_earth::{PlayerSignal, Volley};

use crate::session::Session;

/// Pixels the ship may move sideways per tick.
const STEER_SPEED: f64 = 6.0;

#[derive(Debug, Clone)]
pub struct Autopilot {
    pub x: f64,
    pub y: f64,
}

impl Autopilot {
    pub fn new(session: &Session) -> Self {
        let earth = &session.config().earth;
        Self { x: earth.width as f64 / 2.0, y: earth.height as f64 / 4.0 }
    }

    /// Steer towards the closest opening one row ahead, shoot rock straight
    /// ahead and report what the ship touched.
    pub fn step(&mut self, session: &mut Session) -> Option<PlayerSignal> {
        let (bw, lh) = {
            let earth = &session.config().earth;
            (earth.block_width as f64, earth.level_height as f64)
        };
        let ahead_y = self.y + lh;

        let target = (0..session.earth.columns())
            .map(|col| col as f64 * bw + bw / 2.0)
            .filter(|&x| {
                session
                    .earth
                    .cell_at(x, ahead_y)
                    .and_then(|id| session.earth.cell(id))
                    .is_some_and(|c| !c.is_block())
            })
            .min_by(|a, b| (a - self.x).abs().total_cmp(&(b - self.x).abs()));
        if let Some(target) = target {
            self.x += (target - self.x).clamp(-STEER_SPEED, STEER_SPEED);
        }

        if let Some(ahead) = session.earth.cell_at(self.x, ahead_y) {
            if session.earth.cell(ahead).is_some_and(|c| c.is_block()) {
                match session.fire() {
                    Some(Volley::Single) => {
                        session.bullet_hits(ahead);
                    }
                    Some(Volley::Double) => {
                        session.bullet_hits(ahead);
                        if let Some(side) = session.earth.cell_at(self.x + bw, ahead_y) {
                            session.bullet_hits(side);
                        }
                    }
                    None => {}
                }
            }
        }

        let touched = session.earth.cell_at(self.x, self.y)?;
        session.player_hits(touched)
    }
}

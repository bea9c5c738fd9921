//! Ship bookkeeping. Sprites and physics belong to the host; this only keeps
//! the numbers and reports when the music has to follow them.

use pitfall_shared::{Pickup, StageId};

pub const MAX_SHIELD: i32 = 100;
pub const MAX_ENERGY: i32 = 100;
/// Depth steps of double time granted by a bonus pickup.
pub const BONUS_STEPS: i32 = 100;
const PICKUP_REFILL: i32 = 20;
const HIT_DAMAGE: i32 = 10;
const SHOT_COST: i32 = 10;
/// Minimum time between volleys (seconds).
pub const FIRE_COOLDOWN: f64 = 0.2;

/// What the host has to tell the music or the sound bank about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSignal {
    DoubleTimeOn,
    DoubleTimeOff,
    Overlay,
    /// Any pickup collected.
    Collected,
    Hurt,
    Died,
}

/// Bullets released by one trigger pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Volley {
    Single,
    /// Bonus fire, two side-by-side bullets at no energy cost.
    Double,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub shield: i32,
    pub energy: i32,
    pub bonus: i32,
    pub depth: Option<u32>,
    pub goal: u32,
    pub starship: bool,
    pub stage: StageId,
    alive: bool,
    next_shot: f64,
}

impl Player {
    pub fn new(stage: StageId, goal: u32) -> Self {
        Self {
            shield: MAX_SHIELD,
            energy: MAX_ENERGY,
            bonus: 0,
            depth: None,
            goal,
            starship: false,
            stage,
            alive: true,
            next_shot: 0.0,
        }
    }

    /// Revive with full shield and energy. Stage and goal are kept.
    pub fn reset(&mut self) {
        *self = Self::new(self.stage, self.goal);
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Called every tick with the current depth; only a new depth counts as a step.
    pub fn update(&mut self, depth: u32, goal: u32) -> Option<PlayerSignal> {
        if self.depth == Some(depth) {
            return None;
        }
        self.depth = Some(depth);
        self.goal = goal;
        if self.energy < MAX_ENERGY {
            self.energy += 1;
        }
        if self.bonus > 0 {
            self.bonus -= 1;
            if self.bonus == 0 {
                return Some(PlayerSignal::DoubleTimeOff);
            }
        }
        None
    }

    pub fn collect(&mut self, pickup: Pickup) -> PlayerSignal {
        match pickup {
            Pickup::Health => self.shield += PICKUP_REFILL.min(MAX_SHIELD - self.shield),
            Pickup::Energy => self.energy += PICKUP_REFILL.min(MAX_ENERGY - self.energy),
            Pickup::Bonus => {
                self.bonus = BONUS_STEPS;
                return PlayerSignal::DoubleTimeOn;
            }
            Pickup::Special => {
                self.starship = true;
                return PlayerSignal::Overlay;
            }
        }
        PlayerSignal::Collected
    }

    pub fn take_hit(&mut self) -> PlayerSignal {
        self.shield -= HIT_DAMAGE;
        if self.shield <= 0 && self.alive {
            self.alive = false;
            PlayerSignal::Died
        } else {
            PlayerSignal::Hurt
        }
    }

    /// Pull the trigger at time `now`. Nothing happens while dead, cooling
    /// down or out of both energy and bonus.
    pub fn fire(&mut self, now: f64) -> Option<Volley> {
        if !self.alive || now < self.next_shot || (self.energy <= 0 && self.bonus <= 0) {
            return None;
        }
        self.next_shot = now + FIRE_COOLDOWN;
        if self.bonus > 0 {
            Some(Volley::Double)
        } else {
            self.energy -= SHOT_COST;
            Some(Volley::Single)
        }
    }

    pub fn in_double_time(&self) -> bool {
        self.bonus > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn steps_only_count_on_new_depth() {
        let mut p = Player::new(1, 500);
        p.energy = 50;
        p.update(3, 500);
        p.update(3, 500);
        assert_eq!(p.energy, 51);
        for d in 4..100 {
            p.update(d, 500);
        }
        assert_eq!(p.energy, MAX_ENERGY);
    }

    #[test]
    fn bonus_runs_out_into_half_time() {
        let mut p = Player::new(1, 500);
        assert_eq!(p.collect(Pickup::Bonus), PlayerSignal::DoubleTimeOn);
        let signals: Vec<_> = (0..BONUS_STEPS as u32).filter_map(|d| p.update(d, 500)).collect();
        assert_eq!(signals, vec![PlayerSignal::DoubleTimeOff]);
        assert!(!p.in_double_time());
    }

    #[test]
    fn refills_are_capped() {
        let mut p = Player::new(1, 500);
        p.shield = 90;
        p.collect(Pickup::Health);
        assert_eq!(p.shield, MAX_SHIELD);
        p.energy = 10;
        p.collect(Pickup::Energy);
        assert_eq!(p.energy, 30);
        assert_eq!(p.collect(Pickup::Special), PlayerSignal::Overlay);
        assert!(p.starship);
    }

    #[test]
    fn tenth_hit_is_fatal_once() {
        let mut p = Player::new(1, 500);
        for _ in 0..9 {
            assert_eq!(p.take_hit(), PlayerSignal::Hurt);
        }
        assert_eq!(p.take_hit(), PlayerSignal::Died);
        assert!(!p.is_alive());
        assert_eq!(p.take_hit(), PlayerSignal::Hurt);
        p.reset();
        assert!(p.is_alive());
        assert_eq!(p.shield, MAX_SHIELD);
    }

    #[test]
    fn firing_costs_energy_unless_bonus() {
        let mut p = Player::new(1, 500);
        assert_eq!(p.fire(0.0), Some(Volley::Single));
        assert_eq!(p.fire(0.1), None, "cooldown");
        assert_eq!(p.energy, 90);
        p.collect(Pickup::Bonus);
        assert_eq!(p.fire(0.3), Some(Volley::Double));
        assert_eq!(p.energy, 90);

        p.bonus = 0;
        p.energy = 0;
        assert_eq!(p.fire(10.0), None);
    }
}

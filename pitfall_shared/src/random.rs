//! Random number seam shared by the successor draw and the row generator.
//!
//! Production code runs on a seeded `fastrand::Rng`; tests substitute
//! [`ScriptedRandom`] to replay an exact sequence.

use std::collections::VecDeque;

/// Source of uniform values in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_f64(&mut self) -> f64;
}

impl RandomSource for fastrand::Rng {
    fn next_f64(&mut self) -> f64 {
        self.f64()
    }
}

/// Replays a fixed list of values, cycling once exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: VecDeque<f64>,
}

impl ScriptedRandom {
    pub fn new(values: &[f64]) -> Self {
        Self { values: values.iter().copied().collect() }
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&mut self) -> f64 {
        match self.values.pop_front() {
            Some(v) => {
                self.values.push_back(v);
                v
            }
            None => 0.0,
        }
    }
}

/// Boxed seeded generator, the default everywhere a seed is known.
pub fn seeded(seed: u64) -> Box<dyn RandomSource> {
    Box::new(fastrand::Rng::with_seed(seed))
}

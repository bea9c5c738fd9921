/// Monotonic audio clock. Every scheduled start, stop and ramp is an
/// absolute time on this clock, in seconds.
#[derive(Clone, Copy, Debug)]
pub struct Transport {
    now: f64,
    pub sample_rate: u32,
    /// Frames rendered or simulated since creation.
    pub frame_position: u64,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(44100)
    }
}

impl Transport {
    pub fn new(sample_rate: u32) -> Self {
        Self { now: 0.0, sample_rate: sample_rate.max(1), frame_position: 0 }
    }

    /// Current time of the audio clock.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Move the clock forward. Negative or NaN steps are ignored so the clock never runs back.
    pub fn advance(&mut self, seconds: f64) {
        if seconds > 0.0 {
            self.now += seconds;
            self.frame_position += (seconds * self.sample_rate as f64).round() as u64;
        }
    }

    /// Jump to an absolute time, landing on it exactly. Earlier times are ignored.
    pub fn advance_to(&mut self, time: f64) {
        if time > self.now {
            let frames = ((time - self.now) * self.sample_rate as f64).round() as u64;
            self.frame_position += frames;
            self.now = time;
        }
    }

    /// Move the clock forward by a block of rendered frames.
    pub fn advance_frames(&mut self, frames: u64) {
        self.frame_position += frames;
        self.now += frames as f64 / self.sample_rate as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_never_runs_backwards() {
        let mut t = Transport::new(48000);
        t.advance(1.5);
        t.advance(-3.0);
        t.advance(f64::NAN);
        assert_eq!(t.now(), 1.5);
        assert_eq!(t.frame_position, 72000);
    }

    #[test]
    fn frames_map_to_seconds() {
        let mut t = Transport::new(44100);
        t.advance_frames(44100);
        assert!((t.now() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn advance_to_lands_exactly() {
        let mut t = Transport::new(10);
        t.advance(0.1);
        t.advance_to(5.647074829931973);
        assert_eq!(t.now(), 5.647074829931973);
        t.advance_to(1.0);
        assert_eq!(t.now(), 5.647074829931973);
    }
}

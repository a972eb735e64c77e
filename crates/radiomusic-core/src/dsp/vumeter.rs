//! Peak-following level meter for the LED bar

use super::linear_to_db;

/// Decay rate of the peak follower, per second
const DECAY_LAMBDA: f32 = 30.0;

/// Instant-attack, exponential-release peak follower
#[derive(Debug, Clone, Copy, Default)]
pub struct VuMeter {
    level: f32,
}

impl VuMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample (full scale = 1.0)
    #[inline]
    pub fn process(&mut self, sample_time: f32, value: f32) {
        let magnitude = value.abs();
        if magnitude >= self.level {
            self.level = magnitude;
        } else {
            self.level += (magnitude - self.level) * (DECAY_LAMBDA * sample_time).min(1.0);
        }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// LED brightness for a segment spanning `db_min`..`db_max`
    ///
    /// 0 at or below `db_min`, 1 at or above `db_max`, linear in dB between.
    pub fn brightness(&self, db_min: f32, db_max: f32) -> f32 {
        let db = linear_to_db(self.level);
        if db >= db_max {
            1.0
        } else if db <= db_min {
            0.0
        } else {
            (db - db_min) / (db_max - db_min)
        }
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}

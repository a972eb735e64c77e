/// Rising-edge detector with hysteresis
///
/// Fires once when the input reaches `high`, then stays quiet until the
/// input has dropped to `low` again.
#[derive(Debug, Clone, Copy)]
pub struct SchmittTrigger {
    high: f32,
    low: f32,
    armed: bool,
}

impl SchmittTrigger {
    pub fn new(low: f32, high: f32) -> Self {
        Self {
            high,
            low,
            armed: true,
        }
    }

    /// Feed one value; true on a rising edge
    #[inline]
    pub fn process(&mut self, value: f32) -> bool {
        if self.armed {
            if value >= self.high {
                self.armed = false;
                return true;
            }
        } else if value <= self.low {
            self.armed = true;
        }
        false
    }
}

impl Default for SchmittTrigger {
    /// Thresholds for a momentary button (0 released, 1 pressed)
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

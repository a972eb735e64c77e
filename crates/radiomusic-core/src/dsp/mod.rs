//! Small control-rate helpers used by the controller

mod trigger;
mod vumeter;

pub use trigger::SchmittTrigger;
pub use vumeter::VuMeter;

/// Convert a linear amplitude to decibels
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.log10()
}

/// Knob value plus control voltage (±5 V spans the knob range), clamped to [0, 1]
#[inline]
pub fn combine(knob: f32, cv: f32) -> f32 {
    (knob + cv / 5.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_to_db() {
        assert!((linear_to_db(1.0)).abs() < 1e-6);
        assert!((linear_to_db(0.5) + 6.02).abs() < 0.01);
        assert_eq!(linear_to_db(0.0), f32::NEG_INFINITY);
    }

    #[test]
    fn test_combine() {
        assert_eq!(combine(0.5, 0.0), 0.5);
        assert_eq!(combine(0.5, 2.5), 1.0);
        assert_eq!(combine(0.2, -5.0), 0.0);
        assert!((combine(0.25, 1.0) - 0.45).abs() < 1e-6);
    }
}

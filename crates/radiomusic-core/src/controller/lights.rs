//! Indicator light timing
//!
//! | Light         | Normal           | Bank select | Loading          | Error             |
//! |---------------|------------------|-------------|------------------|-------------------|
//! | reset         | 50 ms flash      | on          | flash            | blinks (200 ms)   |
//! | LED 0..3      | level meter      | bank bits   | blink (1000 ms)  | level meter       |

use crate::types::{LED_0_LIGHT, NUM_LIGHTS, RESET_LIGHT};

/// Reset light flash length after a reset or station change
pub const RESET_FLASH_MS: u32 = 50;

/// Full on/off period of the loading indicator
pub const LOADING_BLINK_PERIOD_MS: u32 = 1000;

/// Full on/off period of the error indicator
pub const ERROR_BLINK_PERIOD_MS: u32 = 200;

/// Error blinks shown before the error clears itself
pub const ERROR_BLINK_COUNT: u32 = 10;

/// Meter segment floors, bottom LED first
const METER_FLOORS_DB: [f32; 4] = [-24.0, -18.0, -12.0, -6.0];

#[derive(Debug, Clone, Default)]
pub(crate) struct LightState {
    flash_remaining_ms: u32,
    loading_ms: u32,
    error_ms: u32,
    meter: [f32; 4],
}

impl LightState {
    pub(crate) fn flash_reset(&mut self) {
        self.flash_remaining_ms = RESET_FLASH_MS;
    }

    /// Advance one millisecond; returns true once the error display is done
    pub(crate) fn tick_ms(&mut self, loading: bool, error: bool) -> bool {
        self.flash_remaining_ms = self.flash_remaining_ms.saturating_sub(1);

        self.loading_ms = if loading {
            (self.loading_ms + 1) % LOADING_BLINK_PERIOD_MS
        } else {
            0
        };

        if !error {
            self.error_ms = 0;
            return false;
        }
        self.error_ms += 1;
        if self.error_ms >= ERROR_BLINK_PERIOD_MS * ERROR_BLINK_COUNT {
            self.error_ms = 0;
            return true;
        }
        false
    }

    /// Store meter brightness from segment floors up to 0 dB
    pub(crate) fn update_meter(&mut self, brightness: impl Fn(f32, f32) -> f32) {
        for (led, floor) in self.meter.iter_mut().zip(METER_FLOORS_DB) {
            *led = brightness(floor, 0.0);
        }
    }

    pub(crate) fn clear_meter(&mut self) {
        self.meter = [0.0; 4];
    }

    pub(crate) fn render(
        &self,
        bank_select: Option<usize>,
        loading: bool,
        error: bool,
    ) -> [f32; NUM_LIGHTS] {
        let mut lights = [0.0; NUM_LIGHTS];

        let flashing = self.flash_remaining_ms > 0;
        let error_on = error && self.error_ms % ERROR_BLINK_PERIOD_MS < ERROR_BLINK_PERIOD_MS / 2;
        lights[RESET_LIGHT] = if bank_select.is_some() || flashing || error_on {
            1.0
        } else {
            0.0
        };

        let bar = &mut lights[LED_0_LIGHT..LED_0_LIGHT + 4];
        match bank_select {
            Some(bank) => {
                for (bit, led) in bar.iter_mut().enumerate() {
                    *led = if bank & (1 << bit) != 0 { 1.0 } else { 0.0 };
                }
            }
            None if loading => {
                let on = self.loading_ms < LOADING_BLINK_PERIOD_MS / 2;
                bar.fill(if on { 1.0 } else { 0.0 });
            }
            None => bar.copy_from_slice(&self.meter),
        }

        lights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_flash_lasts_50_ms() {
        let mut lights = LightState::default();
        lights.flash_reset();
        for _ in 0..49 {
            lights.tick_ms(false, false);
        }
        assert_eq!(lights.render(None, false, false)[RESET_LIGHT], 1.0);
        lights.tick_ms(false, false);
        assert_eq!(lights.render(None, false, false)[RESET_LIGHT], 0.0);
    }

    #[test]
    fn test_bank_bits() {
        let lights = LightState::default();
        let out = lights.render(Some(0b1010), false, false);
        assert_eq!(out[RESET_LIGHT], 1.0);
        assert_eq!(&out[LED_0_LIGHT..], &[0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_loading_blink() {
        let mut lights = LightState::default();
        assert_eq!(&lights.render(None, true, false)[LED_0_LIGHT..], &[1.0; 4]);
        for _ in 0..500 {
            lights.tick_ms(true, false);
        }
        assert_eq!(&lights.render(None, true, false)[LED_0_LIGHT..], &[0.0; 4]);
        for _ in 0..500 {
            lights.tick_ms(true, false);
        }
        assert_eq!(&lights.render(None, true, false)[LED_0_LIGHT..], &[1.0; 4]);
    }

    #[test]
    fn test_error_clears_after_ten_blinks() {
        let mut lights = LightState::default();
        let mut toggles = 0;
        let mut last = lights.render(None, false, true)[RESET_LIGHT];
        let mut finished_at = None;

        for ms in 1..=3000 {
            if lights.tick_ms(false, true) {
                finished_at = Some(ms);
                break;
            }
            let now = lights.render(None, false, true)[RESET_LIGHT];
            if now != last && now == 1.0 {
                toggles += 1;
            }
            last = now;
        }

        assert_eq!(finished_at, Some(2000));
        assert_eq!(toggles, ERROR_BLINK_COUNT - 1);
    }

    #[test]
    fn test_meter_segments() {
        let mut lights = LightState::default();
        // A -15 dB signal reaches only the two bottom segments
        lights.update_meter(|floor, ceiling| {
            let db = -15.0;
            ((db - floor) / (ceiling - floor)).clamp(0.0, 1.0)
        });
        let out = lights.render(None, false, false);
        assert!(out[LED_0_LIGHT] > out[LED_0_LIGHT + 1]);
        assert_eq!(out[LED_0_LIGHT + 2], 0.0);
        assert_eq!(out[LED_0_LIGHT + 3], 0.0);

        lights.clear_meter();
        assert_eq!(&lights.render(None, false, false)[LED_0_LIGHT..], &[0.0; 4]);
    }
}

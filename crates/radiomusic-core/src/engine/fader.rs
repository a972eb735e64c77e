//! Gain envelopes for channel switching and reset
//!
//! Each envelope approaches its target exponentially, one step per
//! generated sample, and snaps to the target once within [`FADE_EPSILON`].

/// Per-sample coefficient of the switch crossfade (about 25 ms)
pub const CROSSFADE_COEFF: f32 = 0.005;

/// Per-sample coefficient of the pre-reset fade-out (about 5 ms)
pub const FADE_OUT_COEFF: f32 = 0.05;

/// Distance from the target at which an envelope is complete
pub const FADE_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FadeState {
    #[default]
    Normal,
    /// New slot fading in while the previous one fades out
    Crossfading,
    /// Current slot fading to silence before a reseek
    FadingOut,
}

#[inline]
fn approach(gain: f32, target: f32, coeff: f32) -> f32 {
    gain + (target - gain) * coeff
}

/// Envelope sequencer for one engine
///
/// A reset requested mid-crossfade waits for the crossfade to finish, and a
/// switch mid-fade-out carries the reset over to the new station, so every
/// gain moves continuously.
#[derive(Debug, Clone, Copy)]
pub struct Fader {
    state: FadeState,
    gain_in: f32,
    gain_out: f32,
    fade_out_gain: f32,
    /// Fade out and reseek once the crossfade completes
    pending_reset: bool,
}

impl Default for Fader {
    fn default() -> Self {
        Self {
            state: FadeState::Normal,
            gain_in: 1.0,
            gain_out: 0.0,
            fade_out_gain: 1.0,
            pending_reset: false,
        }
    }
}

impl Fader {
    pub fn state(&self) -> FadeState {
        self.state
    }

    /// A reset is waiting for the crossfade to finish
    pub fn reset_pending(&self) -> bool {
        self.pending_reset
    }

    /// Fade the new current slot in and the outgoing one out
    ///
    /// The outgoing slot starts from the gain it is audible at now. A fade-out
    /// in progress becomes a pending reset of the new station.
    pub fn start_crossfade(&mut self) {
        let outgoing = match self.state {
            FadeState::Normal => 1.0,
            FadeState::Crossfading => self.gain_in,
            FadeState::FadingOut => {
                self.pending_reset = true;
                self.fade_out_gain
            }
        };
        self.state = FadeState::Crossfading;
        self.gain_in = 0.0;
        self.gain_out = outgoing;
    }

    /// Fade the current slot to silence ahead of a reseek
    ///
    /// Deferred while crossfading; a fade-out already running continues.
    pub fn start_fade_out(&mut self) {
        match self.state {
            FadeState::Normal => {
                self.state = FadeState::FadingOut;
                self.fade_out_gain = 1.0;
            }
            FadeState::Crossfading => self.pending_reset = true,
            FadeState::FadingOut => {}
        }
    }

    /// Drop any envelope in progress
    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    /// Drop envelopes for a hard switch; true if a reset was still owed
    pub fn cut(&mut self) -> bool {
        let owed = self.pending_reset || self.state == FadeState::FadingOut;
        self.cancel();
        owed
    }

    /// Next (incoming, outgoing) gain pair
    ///
    /// Completes when the incoming gain reaches 1, then hands over to a
    /// pending fade-out if there is one.
    #[inline]
    pub fn next_crossfade(&mut self) -> (f32, f32) {
        self.gain_in = approach(self.gain_in, 1.0, CROSSFADE_COEFF);
        self.gain_out = approach(self.gain_out, 0.0, CROSSFADE_COEFF);

        if (1.0 - self.gain_in) < FADE_EPSILON {
            self.gain_in = 1.0;
            self.gain_out = 0.0;
            if self.pending_reset {
                self.pending_reset = false;
                self.state = FadeState::FadingOut;
                self.fade_out_gain = 1.0;
            } else {
                self.state = FadeState::Normal;
            }
        }
        (self.gain_in, self.gain_out)
    }

    /// Next fade-out gain and whether it reached silence
    #[inline]
    pub fn next_fade_out(&mut self) -> (f32, bool) {
        self.fade_out_gain = approach(self.fade_out_gain, 0.0, FADE_OUT_COEFF);

        if self.fade_out_gain < FADE_EPSILON {
            self.fade_out_gain = 0.0;
            self.state = FadeState::Normal;
            return (0.0, true);
        }
        (self.fade_out_gain, false)
    }
}

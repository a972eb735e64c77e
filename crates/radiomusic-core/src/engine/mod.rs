//! Real-time playback
//!
//! Two player slots alternate on every channel change so the outgoing
//! station can fade out while the new one fades in:
//!
//! ```text
//!            switch_to()            switch_to()
//!  slot 0:  current ──────► previous ──────► current (reloaded)
//!  slot 1:  (empty) ──────► current  ──────► previous
//! ```
//!
//! Everything here runs on the audio thread. No method allocates, locks or
//! frees memory; released buffers go to the basedrop collector.

mod fader;
mod output;
mod player;

use crate::decoder::AudioBuffer;
use crate::error::EngineError;
use crate::pool::AudioObjectPool;
use crate::types::{StereoFrame, BLOCK_SIZE, OUTPUT_HEADROOM};

pub use fader::{FadeState, Fader, CROSSFADE_COEFF, FADE_EPSILON, FADE_OUT_COEFF};
pub use output::OutputStage;
pub use player::{PlaybackCursor, Player};

/// Settings the engine reads every block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackParams {
    pub looping: bool,
    pub crossfade: bool,
    /// Route channels to two outputs instead of summing to mono
    pub stereo: bool,
    pub pitch_mode: bool,
    /// Start knob in [0, 1]: start position, or speed in pitch mode
    pub start: f32,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self {
            looping: true,
            crossfade: true,
            stereo: false,
            pitch_mode: false,
            start: 0.0,
        }
    }
}

impl PlaybackParams {
    /// Playback speed factor for the cursor
    #[inline]
    pub fn speed(&self) -> f64 {
        if self.pitch_mode {
            pitch_speed(self.start)
        } else {
            1.0
        }
    }
}

/// Speed for a start knob value in pitch mode: two octaves either side of 1
#[inline]
pub fn pitch_speed(start: f32) -> f64 {
    2f64.powf((start.clamp(0.0, 1.0) as f64 - 0.5) * 4.0)
}

/// Interleaved position for a start knob value
///
/// Picks the frame at `start` of the length, steps back one frame when
/// possible, and wraps into the buffer.
pub fn start_position(buffer: &AudioBuffer, start: f32) -> f64 {
    let channels = buffer.channels();
    let frame = (start.clamp(0.0, 1.0) as f64 * buffer.frames() as f64).floor() as usize;

    let mut position = frame * channels;
    if position >= channels {
        position -= channels;
    }
    (position % buffer.total_samples().max(1)) as f64
}

/// "Real radio" position: where the station would be had it kept playing
pub fn radio_position(buffer: &AudioBuffer, resume: f64, elapsed_ms: u64) -> f64 {
    let channels = buffer.channels() as f64;
    let total = buffer.total_samples() as f64;
    if total == 0.0 {
        return 0.0;
    }

    let advanced = resume + channels * elapsed_ms as f64 * buffer.sample_rate() as f64 / 1000.0;
    ((advanced % total) / channels).floor() * channels
}

pub struct PlaybackEngine {
    players: [Player; 2],
    current: usize,
    fader: Fader,
    output: OutputStage,
}

impl PlaybackEngine {
    pub fn new() -> Result<Self, EngineError> {
        Ok(Self {
            players: [Player::new(), Player::new()],
            current: 0,
            fader: Fader::default(),
            output: OutputStage::new()?,
        })
    }

    pub fn current(&self) -> &Player {
        &self.players[self.current]
    }

    pub fn previous(&self) -> &Player {
        &self.players[1 - self.current]
    }

    pub fn fade_state(&self) -> FadeState {
        self.fader.state()
    }

    /// Any slot has a buffer
    pub fn has_audio(&self) -> bool {
        self.players.iter().any(Player::is_loaded)
    }

    fn split_players(&mut self) -> (&mut Player, &mut Player) {
        let (first, second) = self.players.split_at_mut(1);
        if self.current == 0 {
            (&mut first[0], &mut second[0])
        } else {
            (&mut second[0], &mut first[0])
        }
    }

    /// Change station to pool entry `index`
    ///
    /// The slot being reused stores its position as that station's resume
    /// point. Returns false when `index` is not in the pool.
    pub fn switch_to(
        &mut self,
        pool: &AudioObjectPool,
        index: usize,
        elapsed_ms: u64,
        params: &PlaybackParams,
    ) -> bool {
        let Some(entry) = pool.get(index) else {
            return false;
        };

        let next = 1 - self.current;
        if let Some(stored) = self.players[next].entry().and_then(|e| pool.get(e)) {
            stored.set_resume_position(self.players[next].cursor().position);
        }

        self.current = next;
        let buffer = entry.buffer();
        let position = if params.pitch_mode {
            0.0
        } else {
            radio_position(buffer, entry.resume_position(), elapsed_ms)
        };

        let player = &mut self.players[next];
        player.load(buffer.clone(), Some(index));
        player.seek(position);

        let previous_channels = self.previous().channels();
        let channels_differ = previous_channels != 0 && previous_channels != buffer.channels();
        if params.crossfade && !channels_differ {
            self.fader.start_crossfade();
        } else if self.fader.cut() {
            self.reseek_current(params);
        }
        true
    }

    /// Restart the current station from the start knob position
    ///
    /// With crossfade enabled the reseek happens after a fade-out, which
    /// itself waits for any crossfade in progress.
    pub fn reset(&mut self, params: &PlaybackParams) {
        if params.crossfade {
            self.fader.start_fade_out();
        } else {
            self.fader.cancel();
            self.reseek_current(params);
        }
    }

    fn reseek_current(&mut self, params: &PlaybackParams) {
        let player = &mut self.players[self.current];
        let position = match player.buffer() {
            Some(_) if params.pitch_mode => 0.0,
            Some(buffer) => start_position(buffer, params.start),
            None => return,
        };
        player.reset_to(position);
    }

    /// Forget pool indices after the pool was replaced
    pub fn detach_pool(&mut self) {
        for player in &mut self.players {
            player.detach_entry();
        }
    }

    /// Empty both slots and the output queue
    pub fn clear(&mut self) {
        for player in &mut self.players {
            player.unload();
        }
        self.fader.cancel();
        self.output.clear();
    }

    /// Produce one output frame at the host rate
    #[inline]
    pub fn tick(&mut self, params: &PlaybackParams, host_rate: f32) -> StereoFrame {
        if self.output.needs_block() && self.has_audio() {
            self.render_block(params, host_rate);
        }
        self.output.pop().unwrap_or_default()
    }

    fn render_block(&mut self, params: &PlaybackParams, host_rate: f32) {
        let source_rate = self
            .current()
            .buffer()
            .or_else(|| self.previous().buffer())
            .map_or(host_rate as u32, AudioBuffer::sample_rate);

        let speed = params.speed();
        let mut block = [StereoFrame::silence(); BLOCK_SIZE];

        for frame in block.iter_mut() {
            *frame = match self.fader.state() {
                FadeState::Crossfading => {
                    let (gain_in, gain_out) = self.fader.next_crossfade();
                    let (current, previous) = self.split_players();
                    let out = mix(current, params.stereo).scale(gain_in)
                        + mix(previous, params.stereo).scale(gain_out);
                    current.advance(params.looping, speed);
                    previous.advance(params.looping, speed);
                    out
                }
                FadeState::FadingOut => {
                    let (gain, done) = self.fader.next_fade_out();
                    let current = &mut self.players[self.current];
                    let out = mix(current, params.stereo).scale(gain);
                    current.advance(params.looping, speed);
                    if done {
                        self.reseek_current(params);
                    }
                    out
                }
                FadeState::Normal => {
                    let current = &mut self.players[self.current];
                    let out = mix(current, params.stereo);
                    current.advance(params.looping, speed);
                    out
                }
            };
        }

        self.output.push_block(&block, source_rate, host_rate);
    }
}

/// Current frame of a slot, normalized by the buffer's peak
///
/// Stereo routing sends even channels left and odd channels right (mono is
/// duplicated); mono routing averages all channels.
#[inline]
fn mix(player: &Player, stereo: bool) -> StereoFrame {
    let Some(buffer) = player.buffer() else {
        return StereoFrame::silence();
    };

    let channels = buffer.channels();
    let gain = if buffer.peak() > 0.0 {
        OUTPUT_HEADROOM / buffer.peak()
    } else {
        OUTPUT_HEADROOM
    };

    let frame = if !stereo {
        let sum: f32 = (0..channels).map(|c| player.read(c)).sum();
        StereoFrame::mono(sum / channels as f32)
    } else if channels == 1 {
        StereoFrame::mono(player.read(0))
    } else {
        let mut out = StereoFrame::silence();
        for c in 0..channels {
            if c % 2 == 0 {
                out.left += player.read(c);
            } else {
                out.right += player.read(c);
            }
        }
        let left_count = channels.div_ceil(2) as f32;
        let right_count = (channels / 2) as f32;
        StereoFrame::new(out.left / left_count, out.right / right_count)
    };

    frame.scale(gain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const RATE: u32 = 44100;

    fn buffer(samples: Vec<f32>, channels: usize) -> AudioBuffer {
        AudioBuffer::from_interleaved(Path::new("t"), samples, channels, RATE).unwrap()
    }

    fn pool(buffers: Vec<AudioBuffer>) -> AudioObjectPool {
        let mut pool = AudioObjectPool::new();
        for b in buffers {
            assert!(pool.try_add(b));
        }
        pool
    }

    fn run(engine: &mut PlaybackEngine, params: &PlaybackParams, ticks: usize) -> StereoFrame {
        let mut last = StereoFrame::silence();
        for _ in 0..ticks {
            last = engine.tick(params, RATE as f32);
        }
        last
    }

    #[test]
    fn test_pitch_speed() {
        assert!((pitch_speed(0.5) - 1.0).abs() < 1e-12);
        assert!((pitch_speed(1.0) - 4.0).abs() < 1e-12);
        assert!((pitch_speed(0.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_start_position() {
        let b = buffer(vec![0.0; 200], 2); // 100 frames
        assert_eq!(start_position(&b, 0.0), 0.0);
        assert_eq!(start_position(&b, 0.5), 98.0);
        assert_eq!(start_position(&b, 1.0), 198.0);
    }

    #[test]
    fn test_radio_position_wraps() {
        let b = AudioBuffer::from_interleaved(Path::new("t"), vec![0.0; 2000], 1, 1000).unwrap();
        assert_eq!(radio_position(&b, 0.0, 500), 500.0);
        assert_eq!(radio_position(&b, 100.0, 2500), 600.0);

        let stereo = AudioBuffer::from_interleaved(Path::new("t"), vec![0.0; 2000], 2, 1000).unwrap();
        assert_eq!(radio_position(&stereo, 1.0, 1), 2.0);
    }

    #[test]
    fn test_switch_crossfades_to_completion() {
        let pool = pool(vec![buffer(vec![0.5; RATE as usize], 1), buffer(vec![0.25; RATE as usize], 1)]);
        let mut engine = PlaybackEngine::new().unwrap();
        let params = PlaybackParams::default();

        assert!(engine.switch_to(&pool, 0, 0, &params));
        run(&mut engine, &params, 4000);
        assert_eq!(engine.fade_state(), FadeState::Normal);

        assert!(engine.switch_to(&pool, 1, 0, &params));
        assert_eq!(engine.fade_state(), FadeState::Crossfading);
        assert_eq!(engine.current().entry(), Some(1));
        assert_eq!(engine.previous().entry(), Some(0));

        run(&mut engine, &params, 4000);
        assert_eq!(engine.fade_state(), FadeState::Normal);
    }

    #[test]
    fn test_channel_mismatch_switches_immediately() {
        let pool = pool(vec![buffer(vec![0.5; 1000], 1), buffer(vec![0.5; 1000], 2)]);
        let mut engine = PlaybackEngine::new().unwrap();
        let params = PlaybackParams::default();

        engine.switch_to(&pool, 0, 0, &params);
        engine.switch_to(&pool, 1, 0, &params);
        assert_eq!(engine.fade_state(), FadeState::Normal);
    }

    #[test]
    fn test_crossfade_disabled_switches_immediately() {
        let pool = pool(vec![buffer(vec![0.5; 1000], 1), buffer(vec![0.5; 1000], 1)]);
        let mut engine = PlaybackEngine::new().unwrap();
        let params = PlaybackParams {
            crossfade: false,
            ..Default::default()
        };

        engine.switch_to(&pool, 0, 0, &params);
        engine.switch_to(&pool, 1, 0, &params);
        assert_eq!(engine.fade_state(), FadeState::Normal);
    }

    #[test]
    fn test_reused_slot_stores_resume_position() {
        let pool = pool(vec![buffer(vec![0.1; 10_000], 1), buffer(vec![0.1; 10_000], 1)]);
        let mut engine = PlaybackEngine::new().unwrap();
        let params = PlaybackParams::default();

        engine.switch_to(&pool, 0, 0, &params);
        run(&mut engine, &params, 320);
        let played = engine.current().cursor().position;
        assert!(played > 0.0);

        engine.switch_to(&pool, 1, 0, &params);
        engine.switch_to(&pool, 0, 0, &params);
        assert!(pool.get(0).unwrap().resume_position() >= played);
        assert_eq!(engine.current().cursor().position, pool.get(0).unwrap().resume_position());
    }

    #[test]
    fn test_pitch_mode_switch_starts_at_zero() {
        let pool = pool(vec![buffer(vec![0.1; 1000], 1)]);
        pool.get(0).unwrap().set_resume_position(500.0);

        let mut engine = PlaybackEngine::new().unwrap();
        let params = PlaybackParams {
            pitch_mode: true,
            ..Default::default()
        };
        engine.switch_to(&pool, 0, 10, &params);
        assert_eq!(engine.current().cursor().position, 0.0);
    }

    #[test]
    fn test_reset_fades_out_then_reseeks() {
        let pool = pool(vec![buffer(vec![0.3; RATE as usize], 1)]);
        let mut engine = PlaybackEngine::new().unwrap();
        let mut params = PlaybackParams {
            crossfade: false,
            ..Default::default()
        };
        engine.switch_to(&pool, 0, 0, &params);

        params.crossfade = true;
        params.start = 0.5;
        engine.reset(&params);
        assert_eq!(engine.fade_state(), FadeState::FadingOut);

        run(&mut engine, &params, 400);
        assert_eq!(engine.fade_state(), FadeState::Normal);
        assert_eq!(engine.current().cursor().loop_start, 22049.0);
    }

    /// Slow ramp from silence: restarting it at 0 is continuous
    fn ramp(frames: usize) -> AudioBuffer {
        buffer((0..frames).map(|i| i as f32 * 1e-5).collect(), 1)
    }

    fn largest_step(engine: &mut PlaybackEngine, params: &PlaybackParams, ticks: usize) -> f32 {
        let mut last = engine.tick(params, RATE as f32).left;
        let mut largest = 0.0f32;
        for _ in 1..ticks {
            let left = engine.tick(params, RATE as f32).left;
            largest = largest.max((left - last).abs());
            last = left;
        }
        largest
    }

    #[test]
    fn test_reset_mid_crossfade_is_continuous() {
        let pool = pool(vec![buffer(vec![0.5; RATE as usize], 1), ramp(RATE as usize)]);
        let mut engine = PlaybackEngine::new().unwrap();
        let params = PlaybackParams::default();

        engine.switch_to(&pool, 0, 0, &params);
        run(&mut engine, &params, 5000);
        assert_eq!(engine.fade_state(), FadeState::Normal);

        engine.switch_to(&pool, 1, 0, &params);
        let during_crossfade = largest_step(&mut engine, &params, 96);
        engine.reset(&params);
        assert_eq!(engine.fade_state(), FadeState::Crossfading);

        let after_reset = largest_step(&mut engine, &params, 6000);
        assert!(during_crossfade < 0.05, "{}", during_crossfade);
        assert!(after_reset < 0.05, "step of {} after reset", after_reset);

        assert_eq!(engine.fade_state(), FadeState::Normal);
        assert_eq!(engine.current().cursor().loop_start, 0.0);
        // Restarted about 2000 samples after the switch, so well short of 6096
        assert!(engine.current().cursor().position < 5000.0);
    }

    #[test]
    fn test_switch_during_fade_out_keeps_reset() {
        let pool = pool(vec![buffer(vec![0.5; RATE as usize], 1), ramp(RATE as usize)]);
        let mut engine = PlaybackEngine::new().unwrap();
        let params = PlaybackParams {
            start: 0.5,
            ..Default::default()
        };

        engine.switch_to(&pool, 0, 0, &params);
        run(&mut engine, &params, 5000);

        engine.reset(&params);
        run(&mut engine, &params, 16);
        assert_eq!(engine.fade_state(), FadeState::FadingOut);

        engine.switch_to(&pool, 1, 0, &params);
        run(&mut engine, &params, 8000);

        assert_eq!(engine.fade_state(), FadeState::Normal);
        assert_eq!(engine.current().entry(), Some(1));
        assert_eq!(engine.current().cursor().loop_start, 22049.0);
    }

    #[test]
    fn test_hard_switch_during_fade_out_reseeks_at_once() {
        let pool = pool(vec![buffer(vec![0.5; 1000], 1), buffer(vec![0.5; 1000], 1)]);
        let mut engine = PlaybackEngine::new().unwrap();
        let mut params = PlaybackParams {
            start: 0.25,
            ..Default::default()
        };
        engine.switch_to(&pool, 0, 0, &params);
        run(&mut engine, &params, 3000);
        engine.reset(&params);

        params.crossfade = false;
        engine.switch_to(&pool, 1, 0, &params);
        assert_eq!(engine.fade_state(), FadeState::Normal);
        assert_eq!(engine.current().cursor().loop_start, 249.0);
    }

    #[test]
    fn test_reset_without_crossfade_is_immediate() {
        let pool = pool(vec![buffer(vec![0.3; 1000], 1)]);
        let mut engine = PlaybackEngine::new().unwrap();
        let params = PlaybackParams {
            crossfade: false,
            start: 0.25,
            ..Default::default()
        };
        engine.switch_to(&pool, 0, 0, &params);
        engine.reset(&params);

        assert_eq!(engine.fade_state(), FadeState::Normal);
        assert_eq!(engine.current().cursor().position, 249.0);
    }

    #[test]
    fn test_output_normalized_by_peak() {
        let pool = pool(vec![buffer(vec![0.5; RATE as usize], 1)]);
        let mut engine = PlaybackEngine::new().unwrap();
        let params = PlaybackParams {
            crossfade: false,
            ..Default::default()
        };
        engine.switch_to(&pool, 0, 0, &params);

        let frame = run(&mut engine, &params, 2000);
        assert!((frame.left - OUTPUT_HEADROOM).abs() < 1e-3);
        assert_eq!(frame.left, frame.right);
    }

    #[test]
    fn test_stereo_and_mono_routing() {
        let samples: Vec<f32> = (0..2000).flat_map(|_| [0.2f32, 0.4]).collect();
        let pool = pool(vec![buffer(samples, 2)]);
        let mut engine = PlaybackEngine::new().unwrap();

        let stereo = PlaybackParams {
            crossfade: false,
            stereo: true,
            ..Default::default()
        };
        engine.switch_to(&pool, 0, 0, &stereo);
        let frame = run(&mut engine, &stereo, 1000);
        assert!((frame.left - 2.5).abs() < 1e-3);
        assert!((frame.right - 5.0).abs() < 1e-3);

        let mono = PlaybackParams {
            stereo: false,
            ..stereo
        };
        let frame = run(&mut engine, &mono, 1000);
        assert!((frame.left - 3.75).abs() < 1e-3);
        assert_eq!(frame.left, frame.right);
    }

    #[test]
    fn test_clear_silences_output() {
        let pool = pool(vec![buffer(vec![0.5; 1000], 1)]);
        let mut engine = PlaybackEngine::new().unwrap();
        let params = PlaybackParams::default();
        engine.switch_to(&pool, 0, 0, &params);
        run(&mut engine, &params, 100);

        engine.clear();
        assert!(!engine.has_audio());
        assert_eq!(engine.tick(&params, RATE as f32), StereoFrame::silence());
    }

    #[test]
    fn test_switch_out_of_range() {
        let pool = pool(vec![buffer(vec![0.5; 10], 1)]);
        let mut engine = PlaybackEngine::new().unwrap();
        assert!(!engine.switch_to(&pool, 3, 0, &PlaybackParams::default()));
        assert!(!engine.has_audio());
    }
}

//! cpal output stream driving the module controller
//!
//! The stream callback owns the [`ModuleController`]. Everything else talks
//! to it without locks:
//!
//! - menu actions go through the rtrb command queue
//! - knob values and reset presses go through [`ControlAtomics`]
//! - a settings snapshot comes back through a one-slot ring on request

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use radiomusic_core::controller::command_channel;
use radiomusic_core::{ControlInputs, ModuleCommand, ModuleController, ModuleSettings, OUTPUT_HEADROOM};
use rtrb::{Consumer, Producer, RingBuffer};
use thiserror::Error;

/// Errors that can occur while opening the output stream
#[derive(Error, Debug)]
pub enum AudioError {
    /// Failed to get default device
    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Playback engine could not be created
    #[error("Failed to create playback engine: {0}")]
    Engine(#[from] radiomusic_core::EngineError),
}

pub type AudioResult<T> = Result<T, AudioError>;

/// Knob values and button presses shared with the audio callback
#[derive(Debug)]
pub struct ControlAtomics {
    station: AtomicU32,
    start: AtomicU32,
    reset: AtomicBool,
    settings_request: AtomicBool,
}

impl ControlAtomics {
    fn new() -> Self {
        Self {
            station: AtomicU32::new(0f32.to_bits()),
            start: AtomicU32::new(0f32.to_bits()),
            reset: AtomicBool::new(false),
            settings_request: AtomicBool::new(false),
        }
    }

    pub fn set_station(&self, value: f32) {
        self.station.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn set_start(&self, value: f32) {
        self.start.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Press the reset button once
    pub fn press_reset(&self) {
        self.reset.store(true, Ordering::Release);
    }

    fn station(&self) -> f32 {
        f32::from_bits(self.station.load(Ordering::Relaxed))
    }

    fn start(&self) -> f32 {
        f32::from_bits(self.start.load(Ordering::Relaxed))
    }
}

/// Running output stream plus the handles that control it
pub struct AudioHandle {
    _stream: Stream,
    commands: Producer<ModuleCommand>,
    controls: Arc<ControlAtomics>,
    settings_rx: Consumer<ModuleSettings>,
    pub sample_rate: u32,
}

impl AudioHandle {
    pub fn controls(&self) -> &ControlAtomics {
        &self.controls
    }

    /// Queue a menu command; false when the queue is full
    pub fn send(&mut self, command: ModuleCommand) -> bool {
        self.commands.push(command).is_ok()
    }

    /// Ask the callback for the current settings and wait for the answer
    pub fn snapshot_settings(&mut self, timeout: Duration) -> Option<ModuleSettings> {
        self.controls.settings_request.store(true, Ordering::Release);
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(settings) = self.settings_rx.pop() {
                return Some(settings);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        log::warn!("Audio callback did not answer the settings request");
        None
    }
}

/// Per-callback state moved into the stream
struct CallbackState {
    controller: ModuleController,
    commands: Consumer<ModuleCommand>,
    controls: Arc<ControlAtomics>,
    settings_tx: Producer<ModuleSettings>,
    /// Release the reset button on the tick after a press
    reset_held: bool,
}

impl CallbackState {
    fn fill(&mut self, data: &mut [f32], channels: usize) {
        self.controller.process_commands(&mut self.commands);

        if self.controls.settings_request.swap(false, Ordering::Acquire) {
            // Only on shutdown; the clone allocates
            let _ = self.settings_tx.push(self.controller.settings());
        }

        let mut inputs = ControlInputs {
            station: self.controls.station(),
            start: self.controls.start(),
            ..Default::default()
        };

        for frame in data.chunks_mut(channels) {
            inputs.reset_button = if self.reset_held {
                self.reset_held = false;
                0.0
            } else if self.controls.reset.swap(false, Ordering::Acquire) {
                self.reset_held = true;
                1.0
            } else {
                0.0
            };

            let out = self.controller.process(&inputs);
            frame[0] = out.left / OUTPUT_HEADROOM;
            if channels > 1 {
                frame[1] = out.right / OUTPUT_HEADROOM;
            }
            for ch in frame.iter_mut().skip(2) {
                *ch = 0.0;
            }
        }
    }
}

/// Get the system default output device
fn default_device() -> AudioResult<cpal::Device> {
    let host = cpal::default_host();
    host.default_output_device()
        .ok_or_else(|| AudioError::NoDefaultDevice(format!("{:?} host has no output", host.id())))
}

/// Pick an f32 config with at least two channels when the device offers one
fn output_config(
    device: &cpal::Device,
    buffer_size: Option<u32>,
) -> AudioResult<StreamConfig> {
    let default = device
        .default_output_config()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;

    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let rate = default.sample_rate();
    let best = supported
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(|c| rate >= c.min_sample_rate() && rate <= c.max_sample_rate())
        .or_else(|| {
            supported
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32)
        })
        .ok_or_else(|| AudioError::ConfigError("No f32 output configuration".to_string()))?;

    let rate = if rate >= best.min_sample_rate() && rate <= best.max_sample_rate() {
        rate
    } else {
        best.max_sample_rate()
    };

    let mut config: StreamConfig = best.clone().with_sample_rate(rate).config();
    if let Some(frames) = buffer_size {
        config.buffer_size = cpal::BufferSize::Fixed(frames.clamp(64, 4096));
    }
    Ok(config)
}

/// Open the default output and start the controller on it
///
/// `setup` runs on the calling thread once the host rate is known, before
/// the controller moves into the audio callback.
pub fn start_audio(
    buffer_size: Option<u32>,
    setup: impl FnOnce(&mut ModuleController),
) -> AudioResult<AudioHandle> {
    let device = default_device()?;
    log::info!(
        "Using output device: {}",
        device.name().unwrap_or_else(|_| "unknown".to_string())
    );

    let config = output_config(&device, buffer_size)?;
    let sample_rate = config.sample_rate.0;
    let channels = config.channels as usize;
    log::info!(
        "Output config: {} Hz, {} channels, buffer {:?}",
        sample_rate,
        channels,
        config.buffer_size
    );

    let mut controller = ModuleController::new(sample_rate as f32)?;
    setup(&mut controller);

    let (commands_tx, commands_rx) = command_channel();
    let (settings_tx, settings_rx) = RingBuffer::new(1);
    let controls = Arc::new(ControlAtomics::new());

    let mut state = CallbackState {
        controller,
        commands: commands_rx,
        controls: Arc::clone(&controls),
        settings_tx,
        reset_held: false,
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                state.fill(data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
    log::info!("Audio stream started");

    Ok(AudioHandle {
        _stream: stream,
        commands: commands_tx,
        controls,
        settings_rx,
        sample_rate,
    })
}

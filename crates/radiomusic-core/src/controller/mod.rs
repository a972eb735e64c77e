//! The module controller
//!
//! Turns per-tick control values into loader requests and engine actions,
//! and produces the audio frame and light values for the host. A host owns
//! one controller, calls [`ModuleController::process`] once per audio tick
//! on its audio thread, and forwards menu actions as [`ModuleCommand`]s.
//!
//! While a bank is loading, station changes and resets are ignored; the
//! previous bank keeps playing until the new pool is taken from the loader.

mod command;
mod lights;

use std::path::{Path, PathBuf};

use basedrop::Shared;
use rtrb::Consumer;

use crate::dsp::{SchmittTrigger, VuMeter};
use crate::engine::{PlaybackEngine, PlaybackParams};
use crate::error::EngineError;
use crate::loader::{Loader, LoaderStatus, PoolReceiver};
use crate::patch_storage;
use crate::pool::AudioObjectPool;
use crate::scanner::ScanOptions;
use crate::settings::ModuleSettings;
use crate::types::{NUM_LIGHTS, OUTPUT_HEADROOM};

pub use command::{command_channel, ModuleCommand, COMMAND_QUEUE_CAPACITY};
pub use lights::{ERROR_BLINK_COUNT, ERROR_BLINK_PERIOD_MS, LOADING_BLINK_PERIOD_MS, RESET_FLASH_MS};

use lights::LightState;

/// Ticks between meter light refreshes
const METER_REFRESH_TICKS: u64 = 512;

/// Control surface values for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlInputs {
    /// Station knob (plus CV), in [0, 1]
    pub station: f32,
    /// Start knob (plus CV), in [0, 1]
    pub start: f32,
    /// Reset button, 0 released / 1 pressed
    pub reset_button: f32,
    /// Reset gate input, if patched
    pub reset_gate: Option<f32>,
}

/// Audio and light values for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModuleOutputs {
    pub left: f32,
    pub right: f32,
    pub lights: [f32; NUM_LIGHTS],
}

impl ScanOptions {
    fn from_settings(settings: &ModuleSettings) -> Self {
        Self {
            sort: settings.sort_files,
            audio_only: !settings.allow_all_files,
        }
    }
}

pub struct ModuleController {
    loader: Loader,
    receiver: PoolReceiver,
    pool: Option<Shared<AudioObjectPool>>,
    engine: PlaybackEngine,
    settings: ModuleSettings,

    bank_select: bool,
    bank_on_enter: usize,
    prev_index: Option<usize>,

    button_trigger: SchmittTrigger,
    gate_trigger: SchmittTrigger,

    host_rate: f32,
    ticks_per_ms: u64,
    tick: u64,
    elapsed_ms: u64,

    lights: LightState,
    meter: VuMeter,
}

impl ModuleController {
    /// Create a controller with its own loader thread
    pub fn new(host_rate: f32) -> Result<Self, EngineError> {
        let (loader, receiver) = Loader::spawn();
        Self::with_loader(loader, receiver, host_rate)
    }

    /// Create a controller around an existing loader
    pub fn with_loader(
        loader: Loader,
        receiver: PoolReceiver,
        host_rate: f32,
    ) -> Result<Self, EngineError> {
        let settings = ModuleSettings::default();
        loader.set_scan_options(ScanOptions::from_settings(&settings));

        let mut controller = Self {
            loader,
            receiver,
            pool: None,
            engine: PlaybackEngine::new()?,
            settings,
            bank_select: false,
            bank_on_enter: 0,
            prev_index: None,
            button_trigger: SchmittTrigger::default(),
            gate_trigger: SchmittTrigger::new(0.1, 2.0),
            host_rate,
            ticks_per_ms: 1,
            tick: 0,
            elapsed_ms: 0,
            lights: LightState::default(),
            meter: VuMeter::new(),
        };
        controller.set_host_rate(host_rate);
        Ok(controller)
    }

    pub fn set_host_rate(&mut self, host_rate: f32) {
        self.host_rate = host_rate.max(1.0);
        self.ticks_per_ms = ((self.host_rate / 1000.0) as u64).max(1);
    }

    /// Where "save bank" copies to; also consulted on restore
    pub fn set_patch_dir(&self, patch_dir: Option<PathBuf>) {
        self.loader.set_patch_dir(patch_dir);
    }

    pub fn loader_status(&self) -> LoaderStatus {
        self.loader.status()
    }

    pub fn is_bank_select(&self) -> bool {
        self.bank_select
    }

    /// Number of stations in the playing bank
    pub fn pool_len(&self) -> usize {
        self.pool.as_ref().map_or(0, |p| p.len())
    }

    /// Station currently selected
    pub fn current_station(&self) -> Option<usize> {
        self.prev_index
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    fn playback_params(&self, start: f32) -> PlaybackParams {
        PlaybackParams {
            looping: self.settings.looping_enabled,
            crossfade: self.settings.crossfade_enabled,
            stereo: self.settings.stereo_output_mode,
            pitch_mode: self.settings.pitch_mode,
            start,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Settings
    // ─────────────────────────────────────────────────────────────

    /// Current persisted settings
    ///
    /// Allocates and reads the loader's root under its lock; not for the
    /// per-tick path.
    pub fn settings(&self) -> ModuleSettings {
        ModuleSettings {
            current_bank: self.loader.current_bank(),
            root_dir: self.loader.root_dir().to_string_lossy().into_owned(),
            ..self.settings.clone()
        }
    }

    /// Settings as a JSON record
    pub fn save_settings(&self) -> serde_json::Value {
        self.settings().to_json()
    }

    /// Apply a saved record and rescan
    ///
    /// A bank saved into `<patch_dir>/audiopool` takes precedence over the
    /// recorded root directory.
    pub fn restore_settings(&mut self, record: &serde_json::Value, patch_dir: Option<&Path>) {
        let mut settings = self.settings();
        settings.apply_json(record);

        if let Some(saved) = patch_dir.and_then(patch_storage::preferred_root) {
            log::info!("Using saved bank at {:?}", saved);
            settings.root_dir = saved.to_string_lossy().into_owned();
        }

        self.loader.set_current_bank(settings.current_bank);
        self.loader.set_scan_params(
            PathBuf::from(&settings.root_dir),
            ScanOptions::from_settings(&settings),
        );
        self.settings = settings;
        self.loader.request_scan();
    }

    // ─────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────

    /// Apply all queued menu commands
    pub fn process_commands(&mut self, commands: &mut Consumer<ModuleCommand>) {
        while let Ok(command) = commands.pop() {
            self.handle_command(command);
        }
    }

    pub fn handle_command(&mut self, command: ModuleCommand) {
        match command {
            ModuleCommand::SetRootDir(root) => {
                if self.loader.set_root(root) {
                    self.loader.request_abort();
                    self.loader.request_scan();
                }
            }
            ModuleCommand::ToggleBankSelect => self.toggle_bank_select(),
            ModuleCommand::ClearBank => self.clear_bank(),
            ModuleCommand::SaveBank => self.loader.request_save(),
            ModuleCommand::ToggleLooping => {
                self.settings.looping_enabled = !self.settings.looping_enabled;
            }
            ModuleCommand::ToggleCrossfade => {
                self.settings.crossfade_enabled = !self.settings.crossfade_enabled;
            }
            ModuleCommand::ToggleSort => {
                self.settings.sort_files = !self.settings.sort_files;
                self.loader
                    .set_scan_options(ScanOptions::from_settings(&self.settings));
            }
            ModuleCommand::ToggleAllowAllFiles => {
                self.settings.allow_all_files = !self.settings.allow_all_files;
                self.loader
                    .set_scan_options(ScanOptions::from_settings(&self.settings));
            }
            ModuleCommand::ToggleStereo => {
                self.settings.stereo_output_mode = !self.settings.stereo_output_mode;
            }
            ModuleCommand::TogglePitch => {
                self.settings.pitch_mode = !self.settings.pitch_mode;
            }
        }
    }

    fn toggle_bank_select(&mut self) {
        if self.bank_select {
            self.bank_select = false;
            if self.loader.current_bank() != self.bank_on_enter {
                self.loader.request_load();
            }
        } else {
            self.bank_select = true;
            self.bank_on_enter = self.loader.current_bank();
            self.meter.reset();
            self.lights.clear_meter();
        }
    }

    fn clear_bank(&mut self) {
        log::info!("Clearing current bank");
        self.pool = None;
        self.engine.clear();
        self.prev_index = None;
    }

    // ─────────────────────────────────────────────────────────────
    // Audio tick
    // ─────────────────────────────────────────────────────────────

    /// Run one audio tick
    pub fn process(&mut self, inputs: &ControlInputs) -> ModuleOutputs {
        if let Some(pool) = self.receiver.poll() {
            // Old pool is released here; the collector frees it
            self.pool = Some(pool);
            self.engine.detach_pool();
            self.prev_index = None;
            self.elapsed_ms = 0;
        }

        let loading = self.loader.is_loading();
        let error = self.loader.has_error();

        if self.tick % self.ticks_per_ms == 0 {
            self.elapsed_ms += 1;
            if self.lights.tick_ms(loading, error) {
                self.loader.clear_error();
            }
        }
        self.tick = self.tick.wrapping_add(1);

        let params = self.playback_params(inputs.start);
        let ready = self.pool.is_some() && !loading;

        let button = self.button_trigger.process(inputs.reset_button);
        let gate = inputs
            .reset_gate
            .is_some_and(|value| self.gate_trigger.process(value));

        if self.bank_select {
            let count = self.loader.bank_count();
            if button && count > 0 {
                let next = (self.loader.current_bank() + 1) % count;
                self.loader.set_current_bank(next);
            }
        } else if ready && (button || gate) {
            self.engine.reset(&params);
            self.lights.flash_reset();
        }

        if ready {
            self.update_station(inputs.station, &params);
        }

        let frame = self.engine.tick(&params, self.host_rate);

        if !self.bank_select {
            let level = frame.left.abs().max(frame.right.abs()) / OUTPUT_HEADROOM;
            self.meter.process(1.0 / self.host_rate, level);
            if self.tick % METER_REFRESH_TICKS == 0 {
                let meter = self.meter;
                self.lights.update_meter(|min, max| meter.brightness(min, max));
            }
        }

        let bank_display = self.bank_select.then(|| self.loader.current_bank());
        let lights = self.lights.render(bank_display, loading, error);

        let (left, right) = if self.settings.stereo_output_mode {
            (frame.left, frame.right)
        } else {
            (frame.mid(), frame.mid())
        };

        ModuleOutputs {
            left,
            right,
            lights,
        }
    }

    fn update_station(&mut self, station: f32, params: &PlaybackParams) {
        let Some(pool) = self.pool.as_ref() else {
            return;
        };
        let count = pool.len();
        if count == 0 {
            return;
        }

        let index = ((station.clamp(0.0, 1.0) * count as f32) as usize).min(count - 1);
        if self.prev_index == Some(index) {
            return;
        }

        if self.engine.switch_to(pool, index, self.elapsed_ms, params) {
            log::debug!("Station {} of {}", index, count);
            self.elapsed_ms = 0;
            self.lights.flash_reset();
        }
        self.prev_index = Some(index);
    }
}

//! RadioMusic Core - sample-bank radio player for modular hosts
//!
//! A bank of audio files is scanned from a root directory, decoded on a
//! background worker and handed to the audio thread, which plays one file
//! ("station") at a time with crossfaded switching, looping and pitch control.
//!
//! ```text
//! ModuleController ──request──► Loader worker ──scan──► scanner
//!        ▲                          │           ──decode─► decoder
//!        │ poll (lock-free)         ▼
//!        └────────────── Shared<AudioObjectPool> mailbox
//! ```

pub mod config;
pub mod controller;
pub mod decoder;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod gc;
pub mod loader;
pub mod patch_storage;
pub mod pool;
pub mod scanner;
pub mod settings;
pub mod types;

pub use controller::{ControlInputs, ModuleCommand, ModuleController, ModuleOutputs};
pub use error::{DecodeError, EngineError, StorageError};
pub use settings::ModuleSettings;
pub use types::*;

//! Menu commands for the controller
//!
//! Hosts push commands from their UI thread; the audio thread drains them
//! before processing a tick:
//!
//! ```ignore
//! let (mut tx, mut rx) = command_channel();
//! tx.push(ModuleCommand::ToggleLooping).ok();
//! controller.process_commands(&mut rx);
//! ```

use std::path::PathBuf;

/// Queue capacity; menu actions are rare
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleCommand {
    /// Choose a new sample root and scan it
    SetRootDir(PathBuf),
    /// Enter or leave bank selection mode
    ToggleBankSelect,
    /// Release the current bank and stop playback
    ClearBank,
    /// Copy the current bank into patch storage
    SaveBank,
    ToggleLooping,
    ToggleCrossfade,
    /// Takes effect on the next scan
    ToggleSort,
    /// Takes effect on the next scan
    ToggleAllowAllFiles,
    ToggleStereo,
    TogglePitch,
}

/// Create the lock-free command queue
pub fn command_channel() -> (rtrb::Producer<ModuleCommand>, rtrb::Consumer<ModuleCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

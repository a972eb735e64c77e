//! State shared between the controller and the loader worker
//!
//! Everything the audio thread touches is an atomic. The root and patch
//! directories sit behind a mutex taken only by the worker and by non-audio
//! callers; a root chosen from the audio thread travels through a ring
//! owned by [`Loader`](super::Loader) instead.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::scanner::ScanOptions;

/// Upper bound on a single worker sleep, so a wake-up skipped by the audio
/// thread's non-blocking notify is picked up shortly after
const WAKE_TIMEOUT: Duration = Duration::from_millis(50);

/// What the worker is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LoaderPhase {
    #[default]
    Idle = 0,
    Scanning = 1,
    Loading = 2,
    Aborting = 3,
    Publishing = 4,
}

impl LoaderPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Scanning,
            2 => Self::Loading,
            3 => Self::Aborting,
            4 => Self::Publishing,
            _ => Self::Idle,
        }
    }
}

/// Directories used by the next scan and save
#[derive(Debug, Clone, Default)]
pub struct ScanParams {
    pub root: PathBuf,
    /// Destination of "save bank"
    pub patch_dir: Option<PathBuf>,
}

/// Request flags and status shared with the worker
#[derive(Debug, Default)]
pub struct LoaderState {
    pub(crate) scan_requested: AtomicBool,
    pub(crate) load_requested: AtomicBool,
    pub(crate) abort_requested: AtomicBool,
    pub(crate) kill_requested: AtomicBool,
    pub(crate) save_requested: AtomicBool,
    /// A pool is waiting in the mailbox; cleared by the audio thread on take
    pub(crate) files_loaded: AtomicBool,
    pub(crate) loading_in_progress: AtomicBool,
    pub(crate) error_flag: AtomicBool,
    pub(crate) current_bank: AtomicUsize,
    pub(crate) bank_count: AtomicUsize,
    sort_files: AtomicBool,
    allow_all_files: AtomicBool,
    phase: AtomicU8,
    pub(crate) params: Mutex<ScanParams>,
    wake_lock: Mutex<()>,
    wake: Condvar,
}

impl LoaderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> LoaderPhase {
        LoaderPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn set_phase(&self, phase: LoaderPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    #[inline]
    pub(crate) fn killed(&self) -> bool {
        self.kill_requested.load(Ordering::Acquire)
    }

    fn has_request(&self) -> bool {
        self.killed()
            || self.scan_requested.load(Ordering::Acquire)
            || self.load_requested.load(Ordering::Acquire)
            || self.save_requested.load(Ordering::Acquire)
    }

    /// Wake the worker without ever blocking the caller
    pub(crate) fn notify(&self) {
        // Holding the lock orders the notify after the worker's flag check
        let _guard = self.wake_lock.try_lock();
        self.wake.notify_one();
    }

    /// Block the worker until a request flag is set
    pub(crate) fn wait_for_request(&self) {
        let mut guard = match self.wake_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while !self.has_request() {
            guard = match self.wake.wait_timeout(guard, WAKE_TIMEOUT) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Set the options for the next scan; lock-free
    pub(crate) fn set_options(&self, options: ScanOptions) {
        self.sort_files.store(options.sort, Ordering::Release);
        self.allow_all_files.store(!options.audio_only, Ordering::Release);
    }

    pub(crate) fn options(&self) -> ScanOptions {
        ScanOptions {
            sort: self.sort_files.load(Ordering::Acquire),
            audio_only: !self.allow_all_files.load(Ordering::Acquire),
        }
    }

    /// Snapshot of the scan parameters
    pub(crate) fn scan_params(&self) -> ScanParams {
        match self.params.lock() {
            Ok(params) => params.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn update_params(&self, f: impl FnOnce(&mut ScanParams)) {
        match self.params.lock() {
            Ok(mut params) => f(&mut *params),
            Err(poisoned) => f(&mut *poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_phase_roundtrip() {
        let state = LoaderState::new();
        assert_eq!(state.phase(), LoaderPhase::Idle);
        state.set_phase(LoaderPhase::Publishing);
        assert_eq!(state.phase(), LoaderPhase::Publishing);
    }

    #[test]
    fn test_options_default_to_audio_only() {
        let state = LoaderState::new();
        assert_eq!(state.options(), ScanOptions::default());

        let all = ScanOptions {
            sort: true,
            audio_only: false,
        };
        state.set_options(all);
        assert_eq!(state.options(), all);
    }

    #[test]
    fn test_wait_returns_on_request() {
        let state = Arc::new(LoaderState::new());
        let waiter = {
            let state = state.clone();
            thread::spawn(move || state.wait_for_request())
        };

        thread::sleep(Duration::from_millis(10));
        state.scan_requested.store(true, Ordering::Release);
        state.notify();
        waiter.join().unwrap();
    }
}

//! The loader worker thread
//!
//! ```text
//! Idle ──scan──► Scanning ──► Idle (load flagged)
//! Idle ──load──► Loading ──► Publishing ──ack──► Idle
//!                   └─abort─► Aborting ──► Idle
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use basedrop::Shared;
use rtrb::{Consumer, Producer};

use super::state::{LoaderPhase, LoaderState};
use crate::decoder::DecoderChain;
use crate::gc::gc_handle;
use crate::patch_storage;
use crate::pool::AudioObjectPool;
use crate::scanner::{self, ScanResult};

const MIB: f64 = 1024.0 * 1024.0;

/// Poll interval while waiting for the audio thread to take a published pool
const ACK_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How a bank load ended
pub(crate) enum LoadOutcome {
    /// Every file was decoded or skipped
    Complete(AudioObjectPool),
    /// The memory ceiling stopped the load; accepted files are kept
    MemoryLimit(AudioObjectPool),
    /// Abort observed; nothing is published
    Aborted,
    /// Kill observed; the worker must exit
    Killed,
}

pub(crate) struct Worker {
    state: Arc<LoaderState>,
    mailbox: Producer<Shared<AudioObjectPool>>,
    roots: Consumer<PathBuf>,
    decoders: DecoderChain,
    pool_limit: u64,
    banks: ScanResult,
}

impl Worker {
    pub(crate) fn new(
        state: Arc<LoaderState>,
        mailbox: Producer<Shared<AudioObjectPool>>,
        roots: Consumer<PathBuf>,
        decoders: DecoderChain,
        pool_limit: u64,
    ) -> Self {
        Self {
            state,
            mailbox,
            roots,
            decoders,
            pool_limit,
            banks: ScanResult::new(),
        }
    }

    pub(crate) fn run(mut self) {
        log::info!("Loader thread started");

        loop {
            self.state.wait_for_request();
            if self.state.killed() {
                break;
            }

            if self.state.scan_requested.swap(false, Ordering::AcqRel) {
                self.scan();
            }

            if self.state.save_requested.swap(false, Ordering::AcqRel) {
                self.save();
            }

            if self.state.load_requested.swap(false, Ordering::AcqRel) && !self.load() {
                break;
            }

            self.state.set_phase(LoaderPhase::Idle);
        }

        self.state.loading_in_progress.store(false, Ordering::Release);
        self.state.set_phase(LoaderPhase::Idle);
        log::info!("Loader thread stopped");
    }

    fn scan(&mut self) {
        self.state.set_phase(LoaderPhase::Scanning);

        // Latest root queued from the audio thread wins
        while let Ok(root) = self.roots.pop() {
            log::info!("Root directory set to {:?}", root);
            self.state.update_params(move |params| params.root = root);
        }
        let params = self.state.scan_params();

        if params.root.as_os_str().is_empty() {
            log::warn!("No root directory set, scan skipped");
            return;
        }

        self.banks = scanner::scan(&params.root, self.state.options());
        let count = self.banks.len();
        self.state.bank_count.store(count, Ordering::Release);

        if count == 0 {
            log::warn!("No banks found in {:?}", params.root);
            return;
        }

        let bank = self.state.current_bank.load(Ordering::Acquire).min(count - 1);
        self.state.current_bank.store(bank, Ordering::Release);
        self.state.load_requested.store(true, Ordering::Release);
    }

    fn save(&self) {
        let Some(patch_dir) = self.state.scan_params().patch_dir else {
            log::warn!("No patch directory set, bank not saved");
            return;
        };

        let bank = self.state.current_bank.load(Ordering::Acquire);
        let files = self.banks.get(bank).map(Vec::as_slice).unwrap_or_default();
        if let Err(e) = patch_storage::save_bank(files, &patch_dir) {
            log::error!("Failed to save bank {}: {}", bank, e);
            self.state.error_flag.store(true, Ordering::Release);
        }
    }

    /// Load the current bank and publish it; returns false once killed
    fn load(&mut self) -> bool {
        let bank = self.state.current_bank.load(Ordering::Acquire);
        let Some(files) = self.banks.get(bank) else {
            log::warn!("Bank {} not available, load skipped", bank);
            return true;
        };

        log::info!("Loading bank {} ({} files)", bank, files.len());
        self.state.abort_requested.store(false, Ordering::Release);
        self.state.loading_in_progress.store(true, Ordering::Release);
        self.state.set_phase(LoaderPhase::Loading);

        let outcome = load_bank(&self.state, &self.decoders, files, self.pool_limit);
        let pool = match outcome {
            LoadOutcome::Complete(pool) => pool,
            LoadOutcome::MemoryLimit(pool) => {
                self.state.error_flag.store(true, Ordering::Release);
                pool
            }
            LoadOutcome::Aborted => {
                log::info!("Load of bank {} aborted", bank);
                self.state.loading_in_progress.store(false, Ordering::Release);
                return true;
            }
            LoadOutcome::Killed => return false,
        };

        let published = self.publish(pool);
        self.state.loading_in_progress.store(false, Ordering::Release);
        published
    }

    /// Hand a pool to the audio thread and wait for it to be taken
    fn publish(&mut self, pool: AudioObjectPool) -> bool {
        self.state.set_phase(LoaderPhase::Publishing);
        let seconds: f64 = pool.iter().map(|e| e.buffer().duration_seconds()).sum();
        log::info!(
            "Publishing pool: {} files, {:.1} s of audio, {:.1} of {:.0} MiB",
            pool.len(),
            seconds,
            pool.memory_usage() as f64 / MIB,
            pool.limit() as f64 / MIB
        );

        let shared = Shared::new(&gc_handle(), pool);
        if self.mailbox.push(shared).is_err() {
            log::error!("Pool mailbox still occupied, dropping new pool");
            return true;
        }
        self.state.files_loaded.store(true, Ordering::Release);

        while self.state.files_loaded.load(Ordering::Acquire) {
            if self.state.killed() {
                return false;
            }
            thread::sleep(ACK_POLL_INTERVAL);
        }

        log::debug!("Pool swap acknowledged");
        true
    }
}

/// Decode `files` into a fresh pool, honoring abort and kill at file boundaries
pub(crate) fn load_bank(
    state: &LoaderState,
    decoders: &DecoderChain,
    files: &[PathBuf],
    pool_limit: u64,
) -> LoadOutcome {
    let mut pool = AudioObjectPool::with_limit(pool_limit);

    for path in files {
        if state.killed() {
            return LoadOutcome::Killed;
        }
        if state.abort_requested.load(Ordering::Acquire) {
            state.set_phase(LoaderPhase::Aborting);
            pool.clear();
            return LoadOutcome::Aborted;
        }

        let buffer = match decoders.decode(path) {
            Ok(buffer) => buffer,
            Err(e) => {
                log::warn!("Skipping {:?}: {}", path, e);
                continue;
            }
        };

        // Checked again before touching the pool
        if state.killed() {
            return LoadOutcome::Killed;
        }
        if state.abort_requested.load(Ordering::Acquire) {
            state.set_phase(LoaderPhase::Aborting);
            pool.clear();
            return LoadOutcome::Aborted;
        }

        if !pool.try_add(buffer) {
            log::error!("Bank exceeds memory limit, remaining files skipped");
            return LoadOutcome::MemoryLimit(pool);
        }
    }

    LoadOutcome::Complete(pool)
}

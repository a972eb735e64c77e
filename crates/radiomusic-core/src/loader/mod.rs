//! Background scanning and loading
//!
//! One persistent worker thread performs scans, bank loads and bank saves.
//! The controller talks to it through [`Loader`] (request flags, lock-free)
//! and receives finished pools through [`PoolReceiver`], a single-slot
//! mailbox polled from the audio thread.
//!
//! # Publish handshake
//!
//! 1. Worker pushes the new `Shared<AudioObjectPool>` and sets `files_loaded`
//! 2. Audio thread pops it in [`PoolReceiver::poll`] and clears `files_loaded`
//! 3. Worker sees the flag cleared and returns to idle
//!
//! The pool that was replaced is dropped on the audio thread; `basedrop`
//! defers the actual free to the collector thread.

mod state;
mod worker;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use basedrop::Shared;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::decoder::DecoderChain;
use crate::pool::AudioObjectPool;
use crate::scanner::ScanOptions;
use crate::types::MAX_BANK_SIZE;

pub use state::{LoaderPhase, LoaderState, ScanParams};

/// Root directories queued ahead of the next scan
const ROOT_QUEUE_CAPACITY: usize = 4;

/// Lock-free snapshot of the loader for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderStatus {
    pub phase: LoaderPhase,
    pub bank_count: usize,
    pub current_bank: usize,
    pub loading: bool,
    pub error: bool,
}

/// Handle to the loader worker
///
/// Dropping the handle stops the worker and joins it.
pub struct Loader {
    state: Arc<LoaderState>,
    roots: Producer<PathBuf>,
    handle: Option<JoinHandle<()>>,
}

/// Audio-thread end of the pool mailbox
pub struct PoolReceiver {
    mailbox: Consumer<Shared<AudioObjectPool>>,
    state: Arc<LoaderState>,
}

impl Loader {
    /// Spawn the worker with the default decoders and memory ceiling
    pub fn spawn() -> (Self, PoolReceiver) {
        Self::spawn_with(DecoderChain::default(), MAX_BANK_SIZE)
    }

    /// Spawn the worker with explicit decoders and pool memory ceiling
    pub fn spawn_with(decoders: DecoderChain, pool_limit: u64) -> (Self, PoolReceiver) {
        let state = Arc::new(LoaderState::new());
        let (producer, consumer) = RingBuffer::new(1);
        let (roots_tx, roots_rx) = RingBuffer::new(ROOT_QUEUE_CAPACITY);

        let worker = worker::Worker::new(state.clone(), producer, roots_rx, decoders, pool_limit);
        let handle = thread::Builder::new()
            .name("radiomusic-loader".to_string())
            .spawn(move || worker.run())
            .expect("Failed to spawn loader thread");

        log::info!("Loader spawned (pool limit {} bytes)", pool_limit);

        let receiver = PoolReceiver {
            mailbox: consumer,
            state: state.clone(),
        };
        (
            Self {
                state,
                roots: roots_tx,
                handle: Some(handle),
            },
            receiver,
        )
    }

    /// Set root directory and scan options for the next scan
    ///
    /// Takes the parameter lock; use [`Loader::set_root`] from the audio
    /// thread.
    pub fn set_scan_params(&self, root: PathBuf, options: ScanOptions) {
        self.state.set_options(options);
        self.state.update_params(|params| params.root = root);
    }

    /// Queue a root directory for the next scan
    ///
    /// Lock-free and allocation-free. Returns false when the queue is full,
    /// in which case the root is dropped.
    pub fn set_root(&mut self, root: PathBuf) -> bool {
        self.roots.push(root).is_ok()
    }

    /// Update only the scan options; lock-free
    pub fn set_scan_options(&self, options: ScanOptions) {
        self.state.set_options(options);
    }

    /// Set where "save bank" copies files to
    pub fn set_patch_dir(&self, patch_dir: Option<PathBuf>) {
        self.state.update_params(|params| params.patch_dir = patch_dir);
    }

    /// Root directory of the last scan, or as set by [`Loader::set_scan_params`]
    ///
    /// A root queued with [`Loader::set_root`] shows up once the worker
    /// starts scanning it.
    pub fn root_dir(&self) -> PathBuf {
        self.state.scan_params().root
    }

    pub fn request_scan(&self) {
        self.state.scan_requested.store(true, Ordering::Release);
        self.state.notify();
    }

    /// Load the current bank, aborting a load already in progress
    pub fn request_load(&self) {
        self.request_abort();
        self.state.load_requested.store(true, Ordering::Release);
        self.state.notify();
    }

    /// Abandon the load in progress, if any; the current pool stays in place
    pub fn request_abort(&self) {
        if self.is_loading() {
            self.state.abort_requested.store(true, Ordering::Release);
        }
    }

    /// Copy the current bank into patch storage
    pub fn request_save(&self) {
        self.state.save_requested.store(true, Ordering::Release);
        self.state.notify();
    }

    pub fn current_bank(&self) -> usize {
        self.state.current_bank.load(Ordering::Acquire)
    }

    pub fn set_current_bank(&self, bank: usize) {
        self.state.current_bank.store(bank, Ordering::Release);
    }

    /// Number of banks found by the last scan
    pub fn bank_count(&self) -> usize {
        self.state.bank_count.load(Ordering::Acquire)
    }

    pub fn is_loading(&self) -> bool {
        self.state.loading_in_progress.load(Ordering::Acquire)
    }

    pub fn has_error(&self) -> bool {
        self.state.error_flag.load(Ordering::Acquire)
    }

    pub fn clear_error(&self) {
        self.state.error_flag.store(false, Ordering::Release);
    }

    pub fn status(&self) -> LoaderStatus {
        LoaderStatus {
            phase: self.state.phase(),
            bank_count: self.bank_count(),
            current_bank: self.current_bank(),
            loading: self.is_loading(),
            error: self.has_error(),
        }
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        self.state.kill_requested.store(true, Ordering::Release);
        self.state.notify();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Loader thread panicked");
            }
        }
    }
}

impl PoolReceiver {
    /// Take a newly published pool, acknowledging the swap
    ///
    /// Lock-free; safe to call every audio tick.
    #[inline]
    pub fn poll(&mut self) -> Option<Shared<AudioObjectPool>> {
        if !self.state.files_loaded.load(Ordering::Acquire) {
            return None;
        }
        let pool = self.mailbox.pop().ok()?;
        self.state.files_loaded.store(false, Ordering::Release);
        Some(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::test_util::write_raw;
    use crate::decoder::{decode_raw, AudioBuffer, AudioDecoder};
    use crate::error::DecodeResult;
    use std::path::Path;
    use std::time::{Duration, Instant};

    /// Raw decoder that takes its time, so a load can be interrupted
    struct SlowRaw(Duration);

    impl AudioDecoder for SlowRaw {
        fn name(&self) -> &'static str {
            "slow-raw"
        }

        fn try_decode(&self, path: &Path) -> Option<DecodeResult<AudioBuffer>> {
            thread::sleep(self.0);
            Some(decode_raw(path))
        }
    }

    fn wait_for_pool(receiver: &mut PoolReceiver) -> Option<Shared<AudioObjectPool>> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(pool) = receiver.poll() {
                return Some(pool);
            }
            thread::sleep(Duration::from_millis(1));
        }
        None
    }

    fn wait_until(f: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    fn sample_root(dir: &Path) {
        write_raw(&dir.join("loose.raw"), &[100; 8]);
        std::fs::create_dir(dir.join("A")).unwrap();
        write_raw(&dir.join("A/1.raw"), &[200; 8]);
        write_raw(&dir.join("A/2.raw"), &[300; 8]);
    }

    fn sorted() -> ScanOptions {
        ScanOptions {
            sort: true,
            audio_only: true,
        }
    }

    #[test]
    fn test_scan_then_load_publishes_first_bank() {
        let dir = tempfile::tempdir().unwrap();
        sample_root(dir.path());

        let (loader, mut receiver) = Loader::spawn();
        loader.set_scan_params(dir.path().to_path_buf(), sorted());
        loader.request_scan();

        let pool = wait_for_pool(&mut receiver).expect("pool published");
        assert_eq!(pool.len(), 1);
        assert_eq!(loader.bank_count(), 2);
        assert!(wait_until(|| !loader.is_loading()));
    }

    #[test]
    fn test_bank_index_clamped_after_scan() {
        let dir = tempfile::tempdir().unwrap();
        sample_root(dir.path());

        let (loader, mut receiver) = Loader::spawn();
        loader.set_current_bank(9);
        loader.set_scan_params(dir.path().to_path_buf(), sorted());
        loader.request_scan();

        let pool = wait_for_pool(&mut receiver).expect("pool published");
        assert_eq!(loader.current_bank(), 1);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_memory_limit_sets_error_flag() {
        let dir = tempfile::tempdir().unwrap();
        sample_root(dir.path());

        // Each file decodes to 32 bytes
        let (loader, mut receiver) = Loader::spawn_with(DecoderChain::default(), 40);
        loader.set_current_bank(1);
        loader.set_scan_params(dir.path().to_path_buf(), sorted());
        loader.request_scan();

        let pool = wait_for_pool(&mut receiver).expect("partial pool published");
        assert_eq!(pool.len(), 1);
        assert!(loader.has_error());
        assert!(loader.status().error);
    }

    #[test]
    fn test_empty_root_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (loader, mut receiver) = Loader::spawn();
        loader.set_scan_params(dir.path().to_path_buf(), sorted());
        loader.request_scan();

        assert!(wait_until(|| loader.status().phase == LoaderPhase::Idle));
        thread::sleep(Duration::from_millis(20));
        assert!(receiver.poll().is_none());
        assert_eq!(loader.bank_count(), 0);
    }

    #[test]
    fn test_drop_while_waiting_for_ack() {
        let dir = tempfile::tempdir().unwrap();
        sample_root(dir.path());

        let (loader, _receiver) = Loader::spawn();
        loader.set_scan_params(dir.path().to_path_buf(), sorted());
        loader.request_scan();
        assert!(wait_until(|| loader.status().phase == LoaderPhase::Publishing));

        // Nobody polls; dropping must still join
        drop(loader);
    }

    #[test]
    fn test_save_bank_to_patch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let patch = tempfile::tempdir().unwrap();
        sample_root(dir.path());

        let (loader, mut receiver) = Loader::spawn();
        loader.set_current_bank(1);
        loader.set_patch_dir(Some(patch.path().to_path_buf()));
        loader.set_scan_params(dir.path().to_path_buf(), sorted());
        loader.request_scan();
        wait_for_pool(&mut receiver).expect("pool published");

        loader.request_save();
        let saved = patch.path().join("audiopool");
        assert!(wait_until(|| saved.join("2.raw").exists()));
        assert!(saved.join("1.raw").exists());
    }

    #[test]
    fn test_bank_change_mid_load_aborts_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        write_raw(&dir.path().join("loose.raw"), &[100; 8]);
        std::fs::create_dir(dir.path().join("A")).unwrap();
        for i in 0..10 {
            write_raw(&dir.path().join(format!("A/{}.raw", i)), &[200; 8]);
        }
        std::fs::create_dir(dir.path().join("B")).unwrap();
        write_raw(&dir.path().join("B/1.raw"), &[300; 8]);
        write_raw(&dir.path().join("B/2.raw"), &[300; 8]);

        let chain = DecoderChain::new(vec![Box::new(SlowRaw(Duration::from_millis(20)))]);
        let (loader, mut receiver) = Loader::spawn_with(chain, MAX_BANK_SIZE);
        loader.set_scan_params(dir.path().to_path_buf(), sorted());
        loader.request_scan();

        let playing = wait_for_pool(&mut receiver).expect("first bank published");
        assert_eq!(playing.len(), 1);
        assert!(wait_until(|| !loader.is_loading()));

        // Start the slow bank A, then switch to B while it is still decoding
        loader.set_current_bank(1);
        loader.request_load();
        assert!(wait_until(|| loader.status().phase == LoaderPhase::Loading));
        loader.set_current_bank(2);
        loader.request_load();

        let next = wait_for_pool(&mut receiver).expect("bank B published");
        assert_eq!(next.len(), 2);
        assert!(next.iter().all(|e| e.buffer().path().parent().unwrap().ends_with("B")));

        // Nothing from A follows
        assert!(wait_until(|| !loader.is_loading()));
        thread::sleep(Duration::from_millis(300));
        assert!(receiver.poll().is_none());

        // The pool in use before the abort is untouched
        assert_eq!(playing.len(), 1);
        assert!(playing.get(0).unwrap().buffer().path().ends_with("loose.raw"));
    }

    #[test]
    fn test_queued_root_used_by_next_scan() {
        let dir = tempfile::tempdir().unwrap();
        sample_root(dir.path());

        let (mut loader, mut receiver) = Loader::spawn();
        loader.set_scan_options(sorted());
        assert!(loader.set_root(dir.path().to_path_buf()));
        loader.request_scan();

        let pool = wait_for_pool(&mut receiver).expect("pool published");
        assert_eq!(pool.len(), 1);
        assert_eq!(loader.root_dir(), dir.path());
    }

    #[test]
    fn test_abort_without_load_is_ignored() {
        let (loader, _receiver) = Loader::spawn();
        loader.request_abort();
        assert!(!loader.state.abort_requested.load(Ordering::Acquire));
    }
}

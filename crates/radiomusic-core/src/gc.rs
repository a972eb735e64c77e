//! RT-safe garbage collection for audio buffers
//!
//! Pools and their buffers are wrapped in `basedrop::Shared`. When the audio
//! thread drops the last reference (pool swap, player slot reuse, bank clear)
//! the memory is not freed there; the pointer is queued and a dedicated
//! collector thread performs the deallocation.
//!
//! ```ignore
//! use basedrop::Shared;
//! use radiomusic_core::gc::gc_handle;
//!
//! let buffer = Shared::new(&gc_handle(), decoded);
//! let for_player = buffer.clone();
//! drop(buffer);
//! drop(for_player); // queued for the collector thread
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Interval between collection passes
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("radiomusic-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives and dies on this thread
            let mut collector = Collector::new();
            tx.send(collector.handle()).expect("Failed to send GC handle");

            log::info!("Audio GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn audio GC thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Get a handle for creating `Shared<T>` allocations
///
/// The first call starts the collector thread.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

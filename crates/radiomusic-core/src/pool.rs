//! Decoded buffers of the active bank
//!
//! The loader fills a pool off the audio thread, then publishes it wrapped in
//! `basedrop::Shared`. Once published the entry list is frozen; only each
//! entry's atomic resume position changes afterwards.

use std::sync::atomic::{AtomicU64, Ordering};

use basedrop::Shared;

use crate::decoder::AudioBuffer;
use crate::gc::gc_handle;
use crate::types::MAX_BANK_SIZE;

/// One decoded file plus its "real radio" resume position
pub struct PoolEntry {
    buffer: Shared<AudioBuffer>,
    /// Interleaved sample position (f64 bits) where playback left off
    resume_position: AtomicU64,
}

impl PoolEntry {
    fn new(buffer: AudioBuffer) -> Self {
        Self {
            buffer: Shared::new(&gc_handle(), buffer),
            resume_position: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Counted handle to the decoded buffer
    pub fn buffer(&self) -> &Shared<AudioBuffer> {
        &self.buffer
    }

    /// Position stored when this station was last left
    pub fn resume_position(&self) -> f64 {
        f64::from_bits(self.resume_position.load(Ordering::Relaxed))
    }

    /// Store the position playback left off at
    pub fn set_resume_position(&self, position: f64) {
        self.resume_position.store(position.to_bits(), Ordering::Relaxed);
    }
}

/// The decoded files of one bank with memory accounting
pub struct AudioObjectPool {
    entries: Vec<PoolEntry>,
    memory_usage: u64,
    limit: u64,
}

impl AudioObjectPool {
    /// Create an empty pool bounded by [`MAX_BANK_SIZE`]
    pub fn new() -> Self {
        Self::with_limit(MAX_BANK_SIZE)
    }

    /// Create an empty pool with a custom memory ceiling in bytes
    pub fn with_limit(limit: u64) -> Self {
        Self {
            entries: Vec::new(),
            memory_usage: 0,
            limit,
        }
    }

    /// Append a buffer if the pool stays strictly below its ceiling
    ///
    /// On rejection the pool is unchanged and the buffer is dropped.
    pub fn try_add(&mut self, buffer: AudioBuffer) -> bool {
        let new_usage = self.memory_usage + buffer.memory_usage();
        if new_usage >= self.limit {
            log::error!(
                "Memory limit reached: {:?} needs {} bytes, pool holds {} of {}",
                buffer.path(),
                buffer.memory_usage(),
                self.memory_usage,
                self.limit
            );
            return false;
        }

        self.memory_usage = new_usage;
        self.entries.push(PoolEntry::new(buffer));
        true
    }

    /// Release all buffers and zero the counter
    pub fn clear(&mut self) {
        self.entries.clear();
        self.memory_usage = 0;
    }

    /// Entry at `index`
    #[inline]
    pub fn get(&self, index: usize) -> Option<&PoolEntry> {
        self.entries.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of decoded sizes in bytes
    pub fn memory_usage(&self) -> u64 {
        self.memory_usage
    }

    /// Memory ceiling in bytes
    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoolEntry> {
        self.entries.iter()
    }
}

impl Default for AudioObjectPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AudioObjectPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioObjectPool")
            .field("entries", &self.entries.len())
            .field("memory_usage", &self.memory_usage)
            .field("limit", &self.limit)
            .finish()
    }
}

//! One playback slot: a buffer handle plus a fractional cursor

use basedrop::Shared;

use crate::decoder::AudioBuffer;

/// Read position within a buffer
///
/// Positions are interleaved sample indices, so one frame advances the
/// position by the channel count. `0 <= position <= total samples`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackCursor {
    pub position: f64,
    pub loop_start: f64,
}

/// A playback slot
#[derive(Default)]
pub struct Player {
    buffer: Option<Shared<AudioBuffer>>,
    /// Index of the buffer in the pool it came from
    entry: Option<usize>,
    cursor: PlaybackCursor,
}

impl Player {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a buffer into this slot, rewinding to the start
    pub fn load(&mut self, buffer: Shared<AudioBuffer>, entry: Option<usize>) {
        self.buffer = Some(buffer);
        self.entry = entry;
        self.cursor = PlaybackCursor::default();
    }

    /// Empty the slot
    ///
    /// The buffer handle is dropped here; the collector thread frees it.
    pub fn unload(&mut self) {
        self.buffer = None;
        self.entry = None;
        self.cursor = PlaybackCursor::default();
    }

    #[inline]
    pub fn buffer(&self) -> Option<&AudioBuffer> {
        self.buffer.as_deref()
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    /// Pool index this slot was loaded from
    pub fn entry(&self) -> Option<usize> {
        self.entry
    }

    /// Forget the pool index (the pool it referred to was replaced)
    pub fn detach_entry(&mut self) {
        self.entry = None;
    }

    /// Channel count, or 0 when empty
    #[inline]
    pub fn channels(&self) -> usize {
        self.buffer().map_or(0, AudioBuffer::channels)
    }

    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    #[inline]
    fn total(&self) -> f64 {
        self.buffer().map_or(0.0, |b| b.total_samples() as f64)
    }

    /// Move the cursor without touching the loop start
    pub fn seek(&mut self, position: f64) {
        self.cursor.position = position.clamp(0.0, self.total());
    }

    /// Move the cursor and make that position the loop start
    pub fn reset_to(&mut self, position: f64) {
        self.seek(position);
        self.cursor.loop_start = self.cursor.position;
    }

    /// Sample of `channel` at the cursor, interpolated between frames
    ///
    /// Returns silence past the end, for channels the buffer lacks, and for
    /// an empty slot.
    #[inline]
    pub fn read(&self, channel: usize) -> f32 {
        let Some(buffer) = self.buffer() else {
            return 0.0;
        };
        let channels = buffer.channels();
        if channel >= channels {
            return 0.0;
        }

        let samples = buffer.samples();
        let frame_pos = self.cursor.position / channels as f64;
        let frame = frame_pos.floor();
        let frac = (frame_pos - frame) as f32;

        let index = frame as usize * channels + channel;
        let Some(&a) = samples.get(index) else {
            return 0.0;
        };
        let b = samples.get(index + channels).copied().unwrap_or(a);

        a + (b - a) * frac
    }

    /// Step one frame scaled by `speed`
    ///
    /// At the end the cursor jumps to the loop start when looping, otherwise
    /// it parks exactly at the end.
    #[inline]
    pub fn advance(&mut self, looping: bool, speed: f64) {
        let total = self.total();
        if total == 0.0 {
            return;
        }

        let next = self.cursor.position + self.channels() as f64 * speed;
        self.cursor.position = if next >= total {
            if looping {
                self.cursor.loop_start
            } else {
                total
            }
        } else {
            next
        };
    }
}

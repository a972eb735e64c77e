//! Headerless PCM fallback

use std::path::Path;

use super::AudioBuffer;
use crate::error::{DecodeError, DecodeResult};
use crate::types::RAW_SAMPLE_RATE;

/// Read a file as mono little-endian signed 16-bit PCM at 44.1 kHz
///
/// Samples are normalized to [-1, 1). A trailing odd byte is ignored.
pub fn decode_raw(path: &Path) -> DecodeResult<AudioBuffer> {
    let bytes = std::fs::read(path).map_err(|e| DecodeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    if bytes.len() < 2 {
        return Err(DecodeError::TooShort(path.to_path_buf()));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    AudioBuffer::from_interleaved(path, samples, 1, RAW_SAMPLE_RATE)
}

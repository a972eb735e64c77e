//! WAV decoding via hound

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::{SampleFormat, WavReader};

use super::{AudioBuffer, AudioDecoder};
use crate::error::{DecodeError, DecodeResult};

/// Decoder for RIFF/WAVE files (integer PCM up to 32 bit, 32-bit float)
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn try_decode(&self, path: &Path) -> Option<DecodeResult<AudioBuffer>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                return Some(Err(DecodeError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }))
            }
        };

        // Anything short of a complete header is left to the next decoder
        let reader = WavReader::new(BufReader::new(file)).ok()?;

        let spec = reader.spec();
        log::debug!(
            "WAV {:?}: {} ch, {} Hz, {} bit {:?}",
            path,
            spec.channels,
            spec.sample_rate,
            spec.bits_per_sample,
            spec.sample_format
        );

        // A truncated data chunk yields the samples read before the failure
        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader.into_samples::<f32>().map_while(Result::ok).collect(),
            SampleFormat::Int => {
                let bits = spec.bits_per_sample.clamp(1, 32) as u32;
                let scale = 1.0 / (1i64 << (bits - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map_while(Result::ok)
                    .map(|s| s as f32 * scale)
                    .collect()
            }
        };

        Some(AudioBuffer::from_interleaved(
            path,
            samples,
            spec.channels as usize,
            spec.sample_rate,
        ))
    }
}

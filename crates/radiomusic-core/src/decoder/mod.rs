//! Audio file decoding
//!
//! A file is decoded by asking each structured decoder in turn whether it
//! recognizes the file's header. The extension is never consulted here; it is
//! only a fast filter for the scanner. A file no decoder claims is read as
//! headerless 16-bit mono PCM.
//!
//! | Decoder      | Detection                 | Output                       |
//! |--------------|---------------------------|------------------------------|
//! | `wav`        | RIFF/WAVE header (hound)  | any channel count and rate   |
//! | `compressed` | `fLaC` / MP3 sync or ID3  | any channel count and rate   |
//! | raw fallback | none                      | mono, 44.1 kHz               |

mod compressed;
mod raw;
mod wav;

use std::path::{Path, PathBuf};

use crate::error::{DecodeError, DecodeResult};

pub use compressed::CompressedDecoder;
pub use raw::decode_raw;
pub use wav::WavDecoder;

/// A fully decoded audio file
///
/// Samples are interleaved by channel. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    path: PathBuf,
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
    peak: f32,
}

impl AudioBuffer {
    /// Build a buffer from interleaved samples
    ///
    /// A trailing partial frame is dropped. Fails when there are no channels
    /// or not a single complete frame.
    pub fn from_interleaved(
        path: &Path,
        mut samples: Vec<f32>,
        channels: usize,
        sample_rate: u32,
    ) -> DecodeResult<Self> {
        if channels == 0 {
            return Err(DecodeError::NoChannels(path.to_path_buf()));
        }

        let whole_frames = samples.len() - samples.len() % channels;
        samples.truncate(whole_frames);
        if samples.is_empty() {
            return Err(DecodeError::TooShort(path.to_path_buf()));
        }

        let peak = compute_peak(&samples);

        Ok(Self {
            path: path.to_path_buf(),
            samples,
            channels,
            sample_rate,
            peak,
        })
    }

    /// Source file of this buffer
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Interleaved samples
    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of interleaved channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Native sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total interleaved sample count (frames × channels)
    #[inline]
    pub fn total_samples(&self) -> usize {
        self.samples.len()
    }

    /// Number of frames
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Largest sample value in the buffer (never negative)
    #[inline]
    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// Decoded size in bytes, as accounted by the pool
    pub fn memory_usage(&self) -> u64 {
        (self.samples.len() * std::mem::size_of::<f32>()) as u64
    }

    /// Duration in seconds at the native rate
    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate.max(1) as f64
    }
}

/// Largest sample value, starting from zero
///
/// This is the maximum, not the maximum magnitude: a file whose loudest
/// excursions are negative reports a smaller peak than its true level.
pub fn compute_peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .fold(0.0f32, |peak, &s| if s > peak { s } else { peak })
}

/// A structured-format decoder
pub trait AudioDecoder: Send + Sync {
    /// Short name used in log messages
    fn name(&self) -> &'static str;

    /// Try to decode `path`
    ///
    /// Returns `None` when the header is not recognized, so the next decoder
    /// gets a chance. Returns `Some(Err(_))` when the header was recognized
    /// but the stream is unusable; the file is then skipped.
    fn try_decode(&self, path: &Path) -> Option<DecodeResult<AudioBuffer>>;
}

/// Ordered list of decoders with raw PCM fallback
pub struct DecoderChain {
    decoders: Vec<Box<dyn AudioDecoder>>,
}

impl DecoderChain {
    /// Create a chain from an explicit decoder list
    pub fn new(decoders: Vec<Box<dyn AudioDecoder>>) -> Self {
        Self { decoders }
    }

    /// Decode a file
    pub fn decode(&self, path: &Path) -> DecodeResult<AudioBuffer> {
        for decoder in &self.decoders {
            if let Some(result) = decoder.try_decode(path) {
                log::debug!("{} decoder claimed {:?}", decoder.name(), path);
                return result;
            }
        }

        log::debug!("No structured decoder claimed {:?}, reading as raw PCM", path);
        decode_raw(path)
    }
}

impl Default for DecoderChain {
    fn default() -> Self {
        Self::new(vec![Box::new(WavDecoder), Box::new(CompressedDecoder)])
    }
}

/// Decode a file with the default decoder chain
pub fn decode(path: &Path) -> DecodeResult<AudioBuffer> {
    DecoderChain::default().decode(path)
}


#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn test_wav_float_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav_f32(&path, 2, 48000, &[0.1, -0.2, 0.3, -0.4, 0.5, -0.6]);

        let buffer = decode(&path).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.sample_rate(), 48000);
        assert_eq!(buffer.total_samples(), 6);
        assert_eq!(buffer.frames(), 3);
        assert!((buffer.peak() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_wav_detected_regardless_of_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actually_wav.raw");
        write_wav_i16(&path, 1, 22050, &[0, 16384, -16384, 8192]);

        let buffer = decode(&path).unwrap();
        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(buffer.total_samples(), 4);
        assert!((buffer.samples()[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_header_falls_back_to_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        write_raw(&path, &[100, -100, 200, -200, 300]);

        let buffer = decode(&path).unwrap();
        assert_eq!(buffer.channels(), 1);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.total_samples(), 5);
    }

    #[test]
    fn test_single_byte_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.raw");
        std::fs::write(&path, [0x7Fu8]).unwrap();

        assert!(matches!(decode(&path), Err(DecodeError::TooShort(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = decode(Path::new("/nonexistent/radiomusic/none.wav"));
        assert!(matches!(result, Err(DecodeError::Io { .. })));
    }

    #[test]
    fn test_peak_ignores_negative_excursions() {
        // Known quirk: peak is the largest value, not the largest magnitude
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("negative.wav");
        write_wav_f32(&path, 1, 44100, &[-0.9, -0.5, 0.1, -0.8]);

        let buffer = decode(&path).unwrap();
        assert!((buffer.peak() - 0.1).abs() < 1e-6);

        let silent_negative = compute_peak(&[-1.0, -0.5]);
        assert_eq!(silent_negative, 0.0);
    }

    #[test]
    fn test_partial_frame_is_truncated() {
        let buffer =
            AudioBuffer::from_interleaved(Path::new("x"), vec![0.1, 0.2, 0.3], 2, 44100).unwrap();
        assert_eq!(buffer.total_samples(), 2);
        assert_eq!(buffer.memory_usage(), 8);
    }

    #[test]
    fn test_zero_channels_rejected() {
        let result = AudioBuffer::from_interleaved(Path::new("x"), vec![0.1], 0, 44100);
        assert!(matches!(result, Err(DecodeError::NoChannels(_))));
    }
}

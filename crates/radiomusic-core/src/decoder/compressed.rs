//! FLAC and MP3 decoding via symphonia
//!
//! Only files whose first bytes carry a FLAC or MP3 signature are claimed.
//! Probing arbitrary bytes would let the MP3 reader resynchronize on noise
//! inside headerless PCM files.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{AudioBuffer, AudioDecoder};
use crate::error::{DecodeError, DecodeResult};

/// Compressed container recognized from the file signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signature {
    Flac,
    Mp3,
}

impl Signature {
    fn detect(head: &[u8]) -> Option<Self> {
        if head.starts_with(b"fLaC") {
            Some(Self::Flac)
        } else if head.starts_with(b"ID3") {
            Some(Self::Mp3)
        } else if head.len() >= 2 && head[0] == 0xFF && (head[1] & 0xE0) == 0xE0 {
            Some(Self::Mp3)
        } else {
            None
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
        }
    }
}

/// Decoder for FLAC and MP3 files
pub struct CompressedDecoder;

impl AudioDecoder for CompressedDecoder {
    fn name(&self) -> &'static str {
        "compressed"
    }

    fn try_decode(&self, path: &Path) -> Option<DecodeResult<AudioBuffer>> {
        let mut head = [0u8; 4];
        let read = File::open(path).and_then(|mut f| f.read(&mut head));
        let signature = match read {
            Ok(n) => Signature::detect(&head[..n])?,
            Err(e) => {
                return Some(Err(DecodeError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }))
            }
        };

        Some(decode_with_symphonia(path, signature))
    }
}

fn malformed(path: &Path, reason: impl ToString) -> DecodeError {
    DecodeError::Malformed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn decode_with_symphonia(path: &Path, signature: Signature) -> DecodeResult<AudioBuffer> {
    let file = File::open(path).map_err(|e| DecodeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(signature.extension());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| malformed(path, e))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| malformed(path, "no audio track"))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| malformed(path, "unknown sample rate"))?;
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| malformed(path, e))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("Error reading packet in {:?}: {}", path, e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping bad packet in {:?}: {}", path, e);
                continue;
            }
            Err(e) => {
                log::warn!("Decoder error in {:?}: {}", path, e);
                break;
            }
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        let needed = decoded.capacity() as u64;
        if sample_buf.as_ref().map_or(true, |b| (b.capacity() as u64) < needed * channels as u64)
        {
            sample_buf = Some(SampleBuffer::new(needed, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    AudioBuffer::from_interleaved(path, samples, channels, sample_rate)
}

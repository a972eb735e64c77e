//! Error types for RadioMusic
//!
//! Only per-file and storage failures are modelled as errors. Scan failures
//! degrade to an empty scan result, and bank-level conditions (memory limit)
//! are reported through the loader's error flag.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while decoding a single audio file
#[derive(Debug, Error)]
pub enum DecodeError {
    /// File could not be opened or read
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File does not contain a single complete sample
    #[error("File too short to contain audio: {0}")]
    TooShort(PathBuf),

    /// Decoded stream reported no channels
    #[error("No audio channels in '{0}'")]
    NoChannels(PathBuf),

    /// Header was recognized but the stream could not be decoded
    #[error("Malformed audio in '{path}': {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Errors that can occur while copying a bank into patch storage
#[derive(Debug, Error)]
pub enum StorageError {
    /// No bank is available to save
    #[error("No bank loaded")]
    NoBank,

    /// Source file has no file name component
    #[error("Invalid source path: {0}")]
    InvalidPath(PathBuf),

    /// IO error while creating the folder or copying files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while constructing the playback engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Output resampler rejected its configuration
    #[error("Failed to create output resampler: {0}")]
    Resampler(#[from] rubato::ResamplerConstructionError),
}

/// Result type for decode operations
pub type DecodeResult<T> = Result<T, DecodeError>;

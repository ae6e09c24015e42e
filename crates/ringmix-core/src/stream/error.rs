//! Stream source error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors from decoding, seeking or resampling an upstream source
#[derive(Error, Debug)]
pub enum SourceError {
    /// Failed to open the file
    #[error("Failed to read audio file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Container or codec not supported, or no audio track present
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Unrecoverable decode failure
    #[error("Decode error: {0}")]
    Decode(String),

    /// The source could not be repositioned
    #[error("Seek failed: {0}")]
    Seek(String),

    /// Resampler construction or processing failed
    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

//! Engine error types

use thiserror::Error;

/// Errors surfaced by buffer creation and buffer control
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// PCM memory for a buffer could not be reserved
    #[error("Failed to allocate {frames} frames of buffer memory")]
    AllocationFailure { frames: usize },

    /// A parameter was rejected outright
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The buffer was destroyed or never belonged to this session
    #[error("Buffer handle is stale or unknown")]
    InvalidHandle,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

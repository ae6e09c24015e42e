//! Caller-facing handles
//!
//! Each handle owns exactly one registered buffer plus the metadata of what
//! feeds it, and destroys the buffer when dropped:
//!
//! - [`Sound`]: fully resident, one-shot playback
//! - [`AudioStream`]: streaming buffer fed with caller-generated PCM
//! - [`Music`]: streaming buffer fed from a decoded (and resampled) file

mod music;
mod sound;
mod stream;

pub use music::Music;
pub use sound::Sound;
pub use stream::AudioStream;

use thiserror::Error;

use crate::engine::{EngineError, EngineResult};
use crate::stream::SourceError;

/// Errors while creating a handle
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Source(#[from] SourceError),

    /// Decoded data was empty or had no usable format
    #[error("Audio data is empty or malformed")]
    InvalidWave,
}

/// Control calls on a handle cannot fail unless the session was cleared
/// underneath it; log and carry on.
pub(crate) fn log_stale<T>(result: EngineResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("Handle control ignored: {}", e);
            None
        }
    }
}

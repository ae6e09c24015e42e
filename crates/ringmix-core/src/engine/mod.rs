//! Audio engine - buffers, registry, mixing and the session
//!
//! This module contains the real-time core:
//! - AudioBuffer: double-buffered PCM ring with transport and gain state
//! - Registry: insertion-ordered arena of live buffers behind generation-checked ids
//! - Mixer: sums every playing buffer into the device block
//! - Session: master volume, lock discipline and mix statistics

mod buffer;
mod error;
mod mixer;
mod registry;
mod session;

pub use buffer::{
    AudioBuffer, BufferUsage, PlaybackState, DEFAULT_PAN, DEFAULT_PITCH, DEFAULT_VOLUME,
};
pub use error::{EngineError, EngineResult};
pub use mixer::{apply_master_volume, mix_buffers, MixReport};
pub use registry::{BufferId, Registry, SharedBuffer};
pub use session::{MixStats, Session};

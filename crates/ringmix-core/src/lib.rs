//! Ringmix Core - real-time mixing and streaming for game audio
//!
//! - `engine`: buffers, registry, mixer and session
//! - `stream`: decoders, resampling and the refill protocol
//! - `handles`: Sound, AudioStream and Music
//! - `library`: name-keyed sounds and music for host code
//! - `audio`: CPAL device output
//! - `config`: YAML settings

pub mod audio;
pub mod config;
pub mod engine;
pub mod handles;
pub mod library;
pub mod stream;
pub mod types;
pub mod wave;

pub use engine::{BufferId, BufferUsage, EngineError, PlaybackState, Session};
pub use handles::{AudioStream, LoadError, Music, Sound};
pub use library::AudioLibrary;
pub use types::*;
pub use wave::Wave;

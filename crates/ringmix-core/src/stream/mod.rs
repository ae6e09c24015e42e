//! Streaming - upstream sources and the refill protocol
//!
//! - [`PcmSource`]: anything that yields interleaved float PCM (files, memory)
//! - [`ResamplingSource`]: converts a source to the device rate
//! - [`LoopingSource`]: restarts a source at end of file within a single read
//! - [`refill_stream`]: keeps the stale half of a streaming buffer topped up

mod error;
mod looping;
mod refill;
mod resample;
mod source;

pub use error::{SourceError, SourceResult};
pub use looping::LoopingSource;
pub use refill::{
    convert_channels, push_pcm, refill_stream, reset_stream_position, RefillReport,
    RefillScratch,
};
pub use resample::{resample_interleaved, ResamplingSource, RESAMPLE_CHUNK_FRAMES};
pub use source::{MemorySource, PcmSource, SymphoniaSource};

#[cfg(test)]
pub(crate) use source::tests::write_ramp_wav;

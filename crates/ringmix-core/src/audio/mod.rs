//! Audio output for ringmix
//!
//! Opens a device through CPAL and mixes the [`Session`](crate::engine::Session)
//! into it from the device callback.
//!
//! # Example Usage
//!
//! ```ignore
//! use ringmix_core::audio::{start_output, AudioConfig};
//! use ringmix_core::handles::Sound;
//!
//! let output = start_output(&AudioConfig::default())?;
//! let sound = Sound::load(output.session(), Path::new("click.wav"))?;
//! sound.play();
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{
    AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, LOW_LATENCY_BUFFER_SIZE,
    MAX_BUFFER_SIZE, MIN_BUFFER_SIZE,
};
pub use cpal_backend::{start_output, AudioOutput};
pub use device::{list_output_devices, open_output_device, OutputDevice};
pub use error::{AudioError, AudioResult};

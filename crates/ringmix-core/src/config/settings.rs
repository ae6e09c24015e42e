//! Audio settings file
//!
//! Everything the host needs to open the device and set up the library:
//!
//! ```yaml
//! device:
//!   name: default
//!   host: ALSA
//! sample_rate: 44100
//! buffer_size: Default
//! master_volume: 0.75
//! stream_buffer_frames: null
//! volume_presets:
//!   music: 0.6
//!   sound: 1.0
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::{default_config_path, AUDIO_CONFIG_FILE};
use crate::audio::{AudioConfig, BufferSize, DeviceId};
use crate::types::DEFAULT_SAMPLE_RATE;

/// Master volume applied when the file does not set one
pub const DEFAULT_MASTER_VOLUME: f32 = 0.75;

/// Presets every settings file starts with
pub const DEFAULT_VOLUME_PRESETS: [&str; 5] = ["sound", "music", "voice", "hitsound", "attract_mode"];

/// Persisted audio settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,

    /// Preferred device rate (None = 44100Hz)
    pub sample_rate: Option<u32>,

    pub buffer_size: BufferSize,

    /// Applied to the session at startup, clamped to [0, 1]
    pub master_volume: f32,

    /// Ring size for music streams in device frames (None = one second)
    pub stream_buffer_frames: Option<u32>,

    /// Named volumes handed to the library (e.g. "music", "voice")
    pub volume_presets: BTreeMap<String, f32>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: Some(DEFAULT_SAMPLE_RATE),
            buffer_size: BufferSize::default(),
            master_volume: DEFAULT_MASTER_VOLUME,
            stream_buffer_frames: None,
            volume_presets: DEFAULT_VOLUME_PRESETS
                .iter()
                .map(|name| (name.to_string(), 1.0))
                .collect(),
        }
    }
}

impl AudioSettings {
    /// `<config dir>/ringmix/audio.yaml`
    pub fn default_path() -> PathBuf {
        default_config_path(AUDIO_CONFIG_FILE)
    }

    /// Device request derived from these settings
    pub fn audio_config(&self) -> AudioConfig {
        AudioConfig {
            device: self.device.clone(),
            buffer_size: self.buffer_size,
            sample_rate: self.sample_rate,
        }
    }

    /// Master volume in [0, 1]
    pub fn master_volume(&self) -> f32 {
        if self.master_volume.is_nan() {
            return DEFAULT_MASTER_VOLUME;
        }
        self.master_volume.clamp(0.0, 1.0)
    }

    /// Ring size for music at `device_rate`
    pub fn stream_ring_frames(&self, device_rate: u32) -> usize {
        match self.stream_buffer_frames {
            Some(frames) if frames > 0 => frames as usize,
            _ => device_rate as usize,
        }
    }

    pub fn volume_preset(&self, name: &str) -> Option<f32> {
        self.volume_presets.get(name).copied()
    }
}

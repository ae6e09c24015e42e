//! Output device configuration
//!
//! Device selection, sample rate and block size requested from the backend.
//! The backend may negotiate different values; the running output reports
//! what was actually granted.

use serde::{Deserialize, Serialize};

/// Largest device block mixed in one pass (bigger callbacks are split)
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Smallest fixed block size accepted
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Block size when no preference is given (frames)
/// 512 frames @ 44.1kHz = ~11.6ms
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Block size used in low-latency mode (frames)
pub const LOW_LATENCY_BUFFER_SIZE: u32 = 256;

/// Preferred block size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Safe default for most systems
    #[default]
    Default,
    /// Specific size in frames (clamped to the supported range)
    Fixed(u32),
    /// Small block for responsive effects
    LowLatency,
}

impl BufferSize {
    /// Frames to request from the device
    pub fn frames(&self) -> u32 {
        match self {
            BufferSize::Default => DEFAULT_BUFFER_SIZE,
            BufferSize::Fixed(frames) => (*frames).clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE as u32),
            BufferSize::LowLatency => LOW_LATENCY_BUFFER_SIZE,
        }
    }

    /// One-way output latency at `sample_rate`
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        (self.frames() as f32 / sample_rate as f32) * 1000.0
    }
}

/// Output device identifier
///
/// The host (ALSA, PulseAudio, CoreAudio, WASAPI...) is optional; without it
/// every available host is searched by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Label with the host prefix, e.g. "[ALSA] default"
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// What to ask the backend for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,

    pub buffer_size: BufferSize,

    /// Preferred sample rate (None = 44100Hz)
    pub sample_rate: Option<u32>,
}

impl AudioConfig {
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_buffer_size(mut self, size: BufferSize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_frames() {
        assert_eq!(BufferSize::Default.frames(), DEFAULT_BUFFER_SIZE);
        assert_eq!(BufferSize::LowLatency.frames(), LOW_LATENCY_BUFFER_SIZE);
        assert_eq!(BufferSize::Fixed(16).frames(), MIN_BUFFER_SIZE);
        assert_eq!(BufferSize::Fixed(100_000).frames(), MAX_BUFFER_SIZE as u32);
        assert_eq!(BufferSize::Fixed(1024).frames(), 1024);
    }

    #[test]
    fn test_latency_ms() {
        let latency = BufferSize::Fixed(441).latency_ms(44100);
        assert!((latency - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_device_label() {
        assert_eq!(DeviceId::new("hw:0").display_label(), "hw:0");
        assert_eq!(DeviceId::with_host("hw:0", "ALSA").display_label(), "[ALSA] hw:0");
    }

    #[test]
    fn test_config_yaml_roundtrip() {
        let config = AudioConfig::default()
            .with_device(DeviceId::with_host("pulse", "ALSA"))
            .with_buffer_size(BufferSize::Fixed(1024))
            .with_sample_rate(48000);

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AudioConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}

//! Common types for ringmix
//!
//! This module contains the fundamental audio types shared by the mixing engine,
//! the streaming refill protocol and the device backend.

/// Output channel count of every session (stereo)
pub const DEVICE_CHANNELS: usize = 2;

/// Default device sample rate when none is configured
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Audio sample type (32-bit float everywhere)
pub type Sample = f32;

/// A single stereo frame (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&[StereoSample]` and `&[f32]`
/// (interleaved format) using bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Multiply each channel by its own gain
    #[inline]
    pub fn apply_gains(&self, gains: StereoGain) -> Self {
        Self {
            left: self.left * gains.left,
            right: self.right * gains.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, factor: Sample) {
        self.left *= factor;
        self.right *= factor;
    }
}

/// Per-channel gain pair produced by volume and pan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoGain {
    pub left: Sample,
    pub right: Sample,
}

impl StereoGain {
    /// Equal-power pan law scaled by volume
    ///
    /// `pan` runs from 0.0 (full left) to 1.0 (full right). Values outside that
    /// range are clamped. At centre both channels get `sqrt(0.5)`.
    #[inline]
    pub fn from_volume_pan(volume: Sample, pan: Sample) -> Self {
        let pan = pan.clamp(0.0, 1.0);
        Self {
            left: volume * (1.0 - pan).sqrt(),
            right: volume * pan.sqrt(),
        }
    }
}

/// A buffer of stereo samples
///
/// Used as the pre-allocated mix block handed to the engine on every device callback.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Fills any newly exposed elements with silence. Never grows past capacity.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        let new_len = new_len.min(self.samples.capacity());
        if new_len > self.samples.len() {
            self.samples.resize(new_len, StereoSample::silence());
        } else {
            self.samples.truncate(new_len);
        }
    }

    /// Get a mutable slice of the samples
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Get a zero-copy view of samples as interleaved f32 [L, R, L, R, ...]
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }
}

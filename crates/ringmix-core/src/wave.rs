//! Wave - a fully decoded audio asset
//!
//! Holds interleaved f32 PCM at the file's own rate and channel count. Sounds
//! are built from waves after conversion to the device rate.

use std::path::Path;

use crate::stream::{
    convert_channels, resample_interleaved, PcmSource, SourceResult, SymphoniaSource,
};
use crate::types::StereoSample;

/// Frames decoded per read while loading
const LOAD_CHUNK_FRAMES: usize = 4096;

/// Decoded PCM plus its format
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Wave {
    /// Frames per channel
    pub frame_count: u64,
    pub sample_rate: u32,
    /// Bits per sample (always 32: samples are f32 once decoded)
    pub sample_size: u32,
    pub channels: u16,
    /// Interleaved samples
    pub data: Vec<f32>,
}

impl Wave {
    /// Wrap interleaved samples
    pub fn from_samples(data: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let frame_count = if channels == 0 {
            0
        } else {
            (data.len() / channels as usize) as u64
        };
        Self {
            frame_count,
            sample_rate,
            sample_size: 32,
            channels,
            data,
        }
    }

    /// Decode an entire file
    pub fn load(path: &Path) -> SourceResult<Self> {
        let mut source = SymphoniaSource::open(path)?;
        let channels = source.channels();

        let mut data = Vec::with_capacity(
            source.total_frames().unwrap_or(0) as usize * channels,
        );
        let mut chunk = vec![0.0f32; LOAD_CHUNK_FRAMES * channels];
        loop {
            let frames = source.read_frames(&mut chunk)?;
            if frames == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..frames * channels]);
        }

        let wave = Self::from_samples(data, channels as u16, source.sample_rate());
        log::debug!(
            "Loaded wave {:?}: {} frames, {}Hz, {} channels",
            path,
            wave.frame_count,
            wave.sample_rate,
            wave.channels
        );
        Ok(wave)
    }

    /// Has PCM and a usable format
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty() && self.frame_count > 0 && self.sample_rate > 0 && self.channels > 0
    }

    /// Copy converted to `sample_rate`
    pub fn resampled(&self, sample_rate: u32) -> SourceResult<Self> {
        let data = resample_interleaved(
            &self.data,
            self.channels as usize,
            self.sample_rate,
            sample_rate,
        )?;
        Ok(Self::from_samples(data, self.channels, sample_rate))
    }

    /// PCM in the device's stereo layout
    pub fn to_stereo_frames(&self) -> Vec<StereoSample> {
        let mut frames = Vec::with_capacity(self.frame_count as usize);
        convert_channels(&self.data, self.channels as usize, &mut frames);
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::write_ramp_wav;

    #[test]
    fn test_load_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hit.wav");
        write_ramp_wav(&path, 1200, 1, 22050);

        let wave = Wave::load(&path).unwrap();
        assert!(wave.is_valid());
        assert_eq!(wave.frame_count, 1200);
        assert_eq!(wave.channels, 1);
        assert_eq!(wave.sample_rate, 22050);
        assert_eq!(wave.sample_size, 32);
        assert_eq!(wave.data.len(), 1200);
    }

    #[test]
    fn test_empty_wave_invalid() {
        assert!(!Wave::default().is_valid());
        assert!(!Wave::from_samples(vec![0.0; 4], 0, 44100).is_valid());
    }

    #[test]
    fn test_resampled_format() {
        let wave = Wave::from_samples(vec![0.25; 2205 * 2], 2, 22050);
        let resampled = wave.resampled(44100).unwrap();
        assert_eq!(resampled.sample_rate, 44100);
        assert_eq!(resampled.channels, 2);
        assert_eq!(resampled.frame_count, 4410);
    }

    #[test]
    fn test_mono_to_stereo_frames() {
        let wave = Wave::from_samples(vec![0.1, 0.2, 0.3], 1, 44100);
        let frames = wave.to_stereo_frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1], StereoSample::mono(0.2));
    }
}

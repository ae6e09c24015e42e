//! CPAL output backend
//!
//! Opens one output stream and drives [`Session::mix`] from its callback.
//!
//! ```text
//! ┌──────────────────┐   play/stop/refill    ┌─────────────────────┐
//! │   Game Thread    │──────────────────────►│  Session registry   │
//! │  (update loop)   │   (short locks)       │  (per-buffer locks) │
//! └──────────────────┘                       └──────────┬──────────┘
//!                                                       │ try_lock
//!                                                       ▼
//!                                            ┌─────────────────────┐
//!                                            │  CPAL Audio Thread  │
//!                                            │  (mix into block)   │
//!                                            └─────────────────────┘
//! ```
//!
//! The callback never blocks: contention on the registry or a buffer costs
//! one block of silence for that buffer instead of a stall.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};

use super::config::{AudioConfig, MAX_BUFFER_SIZE};
use super::device::open_output_device;
use super::error::{AudioError, AudioResult};
use crate::engine::Session;
use crate::types::{StereoBuffer, DEFAULT_SAMPLE_RATE, DEVICE_CHANNELS};

/// A running output stream and the session it plays
///
/// Drop this to stop audio. Handles created from [`AudioOutput::session`]
/// keep working without a device; they are simply not heard.
pub struct AudioOutput {
    _stream: Stream,
    session: Session,
    device_name: String,
    sample_rate: u32,
    buffer_size: u32,
    channels: u16,
}

impl AudioOutput {
    /// Session running at the negotiated device rate
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Negotiated block size in frames
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Device channel count (channels past the first two get silence)
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// One-way output latency
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

impl std::fmt::Debug for AudioOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioOutput")
            .field("device_name", &self.device_name)
            .field("sample_rate", &self.sample_rate)
            .field("buffer_size", &self.buffer_size)
            .field("channels", &self.channels)
            .finish()
    }
}

/// Open the configured device and start mixing
///
/// The session is created at whatever rate the device grants, so every
/// buffer created from it plays at the right speed.
pub fn start_output(config: &AudioConfig) -> AudioResult<AudioOutput> {
    let device = open_output_device(config.device.as_ref())?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let (supported, buffer_size) = negotiate_output_config(&device, config)?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();

    let stream_config = StreamConfig {
        channels,
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(buffer_size),
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {:?}, {} frames (~{:.1}ms latency)",
        channels,
        sample_rate,
        supported.sample_format(),
        buffer_size,
        (buffer_size as f32 / sample_rate as f32) * 1000.0
    );

    let session = Session::new(sample_rate);
    let callback = OutputCallback::new(session.clone(), channels as usize);

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, callback),
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, callback),
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, callback),
        other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    }?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(AudioOutput {
        _stream: stream,
        session,
        device_name,
        sample_rate,
        buffer_size,
        channels,
    })
}

/// Pick a stream format and block size for a device
///
/// Prefers f32 with at least two channels at the requested rate, then any
/// stereo format, then anything at all.
fn negotiate_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(cpal::SupportedStreamConfig, u32)> {
    let ranges: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let target = config.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let supports_target =
        |r: &&cpal::SupportedStreamConfigRange| (r.min_sample_rate().0..=r.max_sample_rate().0).contains(&target);

    let best = ranges
        .iter()
        .filter(|r| r.sample_format() == SampleFormat::F32 && r.channels() >= 2)
        .find(supports_target)
        .or_else(|| ranges.iter().filter(|r| r.channels() >= 2).find(supports_target))
        .or_else(|| ranges.iter().find(|r| r.channels() >= 2))
        .or_else(|| ranges.first())
        .ok_or_else(|| {
            AudioError::ConfigError("No supported output configurations".to_string())
        })?;

    let rate = select_sample_rate(target, best.min_sample_rate().0, best.max_sample_rate().0);
    if rate != target {
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz (audio will be resampled)",
            target,
            rate
        );
    }

    let buffer_size = config.buffer_size.frames();
    log::debug!(
        "Selected buffer size: {} frames for {:?}",
        buffer_size,
        config.buffer_size
    );

    Ok((best.clone().with_sample_rate(cpal::SampleRate(rate)), buffer_size))
}

/// `target` if the range allows it, else the closest supported edge
fn select_sample_rate(target: u32, min: u32, max: u32) -> u32 {
    target.clamp(min, max.max(min))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut callback: OutputCallback,
) -> AudioResult<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| callback.render(data),
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

/// State owned by the device callback
struct OutputCallback {
    session: Session,
    /// Pre-allocated mix block, never grown on the audio thread
    mix_buffer: StereoBuffer,
    channels: usize,
}

impl OutputCallback {
    fn new(session: Session, channels: usize) -> Self {
        Self {
            session,
            mix_buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
            channels: channels.max(1),
        }
    }

    /// Fill one interleaved device block
    fn render<T: Sample + FromSample<f32>>(&mut self, data: &mut [T]) {
        let block = MAX_BUFFER_SIZE * self.channels;
        for chunk in data.chunks_mut(block) {
            let n_frames = chunk.len() / self.channels;
            self.mix_buffer.set_len_from_capacity(n_frames);
            self.session.mix(self.mix_buffer.as_mut_slice());
            write_device_frames(self.mix_buffer.as_interleaved(), chunk, self.channels);
        }
    }
}

/// Copy interleaved stereo [L, R, ...] to an interleaved device block
///
/// Mono devices take the left channel; channels past the first two
/// and frames past the end of `stereo` are silent.
fn write_device_frames<T: Sample + FromSample<f32>>(stereo: &[f32], data: &mut [T], channels: usize) {
    let mut frames = stereo.chunks_exact(DEVICE_CHANNELS);
    for frame in data.chunks_mut(channels) {
        let (l, r) = match frames.next() {
            Some(&[l, r]) => (l, r),
            _ => (0.0, 0.0),
        };
        match frame {
            [mono] => *mono = T::from_sample(l),
            [left, right, rest @ ..] => {
                *left = T::from_sample(l);
                *right = T::from_sample(r);
                for ch in rest {
                    *ch = T::from_sample(0.0f32);
                }
            }
            [] => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BufferUsage;
    use crate::types::StereoSample;

    #[test]
    fn test_select_sample_rate() {
        assert_eq!(select_sample_rate(44100, 8000, 192000), 44100);
        assert_eq!(select_sample_rate(44100, 48000, 48000), 48000);
        assert_eq!(select_sample_rate(96000, 8000, 48000), 48000);
    }

    #[test]
    fn test_write_extra_channels_silent() {
        let mut data = [1.0f32; 8];
        write_device_frames(&[0.5, -0.5], &mut data, 4);
        assert_eq!(data, [0.5, -0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_write_mono_takes_left() {
        let mut data = [0.0f32; 1];
        write_device_frames(&[0.5, 0.25], &mut data, 1);
        assert_eq!(data, [0.5]);
    }

    #[test]
    fn test_write_converts_to_i16() {
        let mut data = [0i16; 2];
        write_device_frames(&[1.0, -1.0], &mut data, 2);
        assert_eq!(data[0], i16::MAX);
        assert!(data[1] <= -i16::MAX);
    }

    #[test]
    fn test_render_mixes_session() {
        let session = Session::new(44100);
        let frames = vec![StereoSample::new(0.5, 0.5); 4];
        let id = session.create_static_buffer(2, &frames).unwrap();
        session.set_master_volume(1.0);
        session.play(id).unwrap();

        let mut callback = OutputCallback::new(session.clone(), 2);
        let mut data = [0.0f32; 12];
        callback.render(&mut data);

        assert!(data[..8].iter().all(|s| *s > 0.0));
        assert!(data[8..].iter().all(|s| *s == 0.0));
        assert_eq!(session.stats().cycles(), 1);
    }

    #[test]
    fn test_render_keeps_channel_order() {
        let session = Session::new(44100);
        let frames = vec![StereoSample::new(0.25, -0.75); 2];
        let id = session.create_static_buffer(2, &frames).unwrap();
        session.set_master_volume(1.0);
        session.play(id).unwrap();

        let mut callback = OutputCallback::new(session.clone(), 2);
        let mut data = [1.0f32; 6];
        callback.render(&mut data);

        let gain = 0.5f32.sqrt();
        assert!((data[0] - 0.25 * gain).abs() < 1e-6);
        assert!((data[1] + 0.75 * gain).abs() < 1e-6);
        assert!((data[2] - 0.25 * gain).abs() < 1e-6);
        assert!((data[3] + 0.75 * gain).abs() < 1e-6);
        assert_eq!(&data[4..], &[0.0, 0.0]);
    }

    #[test]
    fn test_render_splits_large_blocks() {
        let session = Session::new(44100);
        session.create_buffer(2, 64, BufferUsage::Streaming).unwrap();

        let mut callback = OutputCallback::new(session.clone(), 2);
        let mut data = vec![1.0f32; (MAX_BUFFER_SIZE + 10) * 2];
        callback.render(&mut data);

        assert_eq!(session.stats().cycles(), 2);
        assert!(data.iter().all(|s| *s == 0.0));
    }
}

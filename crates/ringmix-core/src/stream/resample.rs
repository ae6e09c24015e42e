//! Sample rate conversion for upstream sources
//!
//! Wraps any [`PcmSource`] and converts it to the device rate with a rubato
//! sinc resampler. Input is pulled in fixed chunks; the resampler's startup
//! delay is trimmed so frame positions line up with the source.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::error::{SourceError, SourceResult};
use super::source::{MemorySource, PcmSource};

/// Input frames fed to the resampler per step
pub const RESAMPLE_CHUNK_FRAMES: usize = 1024;

fn sinc_parameters() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// A source converted to another sample rate
pub struct ResamplingSource {
    inner: Box<dyn PcmSource>,
    resampler: SincFixedIn<f32>,
    target_rate: u32,
    ratio: f64,
    channels: usize,
    interleaved_in: Vec<f32>,
    planar_in: Vec<Vec<f32>>,
    /// Interleaved output not yet handed out
    pending: Vec<f32>,
    pending_pos: usize,
    /// Leading output frames still to drop
    delay_frames: usize,
    input_done: bool,
    flushed: bool,
}

impl ResamplingSource {
    pub fn new(inner: Box<dyn PcmSource>, target_rate: u32) -> SourceResult<Self> {
        let source_rate = inner.sample_rate();
        if source_rate == 0 || target_rate == 0 {
            return Err(SourceError::UnsupportedFormat(format!(
                "cannot resample {}Hz to {}Hz",
                source_rate, target_rate
            )));
        }

        let channels = inner.channels().max(1);
        let ratio = target_rate as f64 / source_rate as f64;
        let resampler = SincFixedIn::<f32>::new(
            ratio,
            1.0,
            sinc_parameters(),
            RESAMPLE_CHUNK_FRAMES,
            channels,
        )
        .map_err(|e| SourceError::Resample(e.to_string()))?;
        let delay_frames = resampler.output_delay();

        log::debug!(
            "Resampling {}Hz -> {}Hz ({} channels, ratio {:.4})",
            source_rate,
            target_rate,
            channels,
            ratio
        );

        Ok(Self {
            inner,
            resampler,
            target_rate,
            ratio,
            channels,
            interleaved_in: Vec::with_capacity(RESAMPLE_CHUNK_FRAMES * channels),
            planar_in: vec![Vec::with_capacity(RESAMPLE_CHUNK_FRAMES); channels],
            pending: Vec::new(),
            pending_pos: 0,
            delay_frames,
            input_done: false,
            flushed: false,
        })
    }

    /// Run one resampler step into `pending`. Returns false once fully flushed.
    fn produce(&mut self) -> SourceResult<bool> {
        if self.flushed {
            return Ok(false);
        }

        let channels = self.channels;
        let needed = self.resampler.input_frames_next();
        self.interleaved_in.resize(needed * channels, 0.0);

        let mut got = 0;
        while !self.input_done && got < needed {
            let n = self
                .inner
                .read_frames(&mut self.interleaved_in[got * channels..needed * channels])?;
            if n == 0 {
                self.input_done = true;
            }
            got += n;
        }

        for (ch, plane) in self.planar_in.iter_mut().enumerate() {
            plane.clear();
            plane.extend(
                self.interleaved_in[..got * channels]
                    .iter()
                    .skip(ch)
                    .step_by(channels),
            );
        }

        let output = if got == needed {
            self.resampler.process(self.planar_in.as_slice(), None)
        } else if got > 0 {
            self.resampler.process_partial(Some(self.planar_in.as_slice()), None)
        } else {
            self.flushed = true;
            self.resampler.process_partial::<Vec<f32>>(None, None)
        }
        .map_err(|e| SourceError::Resample(e.to_string()))?;

        let out_frames = output.first().map(|c| c.len()).unwrap_or(0);
        let skip = self.delay_frames.min(out_frames);
        self.delay_frames -= skip;

        self.pending.clear();
        self.pending_pos = 0;
        for frame in skip..out_frames {
            for plane in &output {
                self.pending.push(plane[frame]);
            }
        }

        Ok(true)
    }
}

impl PcmSource for ResamplingSource {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.target_rate
    }

    fn total_frames(&self) -> Option<u64> {
        self.inner
            .total_frames()
            .map(|frames| (frames as f64 * self.ratio).round() as u64)
    }

    fn read_frames(&mut self, out: &mut [f32]) -> SourceResult<usize> {
        let channels = self.channels;
        let wanted = out.len() / channels;
        let mut filled = 0;

        while filled < wanted {
            if self.pending_pos >= self.pending.len() && !self.produce()? {
                break;
            }

            let available = (self.pending.len() - self.pending_pos) / channels;
            let frames = available.min(wanted - filled);
            let len = frames * channels;
            out[filled * channels..filled * channels + len]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + len]);
            self.pending_pos += len;
            filled += frames;
        }

        Ok(filled)
    }

    fn seek(&mut self, frame: u64) -> SourceResult<()> {
        let source_frame = (frame as f64 / self.ratio).round() as u64;
        self.inner.seek(source_frame)?;
        self.resampler.reset();
        self.pending.clear();
        self.pending_pos = 0;
        self.delay_frames = self.resampler.output_delay();
        self.input_done = false;
        self.flushed = false;
        Ok(())
    }
}

/// Resample a whole interleaved buffer
///
/// The result is exactly `round(frames * to / from)` frames long.
pub fn resample_interleaved(
    data: &[f32],
    channels: usize,
    from_rate: u32,
    to_rate: u32,
) -> SourceResult<Vec<f32>> {
    let channels = channels.max(1);
    if from_rate == to_rate {
        return Ok(data.to_vec());
    }

    let frames = data.len() / channels;
    let expected = (frames as f64 * to_rate as f64 / from_rate as f64).round() as usize;

    let inner = MemorySource::new(data.to_vec(), channels, from_rate);
    let mut source = ResamplingSource::new(Box::new(inner), to_rate)?;

    let mut out = vec![0.0; expected * channels];
    let mut filled = 0;
    while filled < expected {
        let n = source.read_frames(&mut out[filled * channels..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    Ok(out)
}

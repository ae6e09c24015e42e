//! Upstream PCM sources for streaming buffers
//!
//! A [`PcmSource`] hands out interleaved f32 frames at its own rate and channel
//! count. The refill protocol converts them to the device layout.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::error::{SourceError, SourceResult};

/// Something that yields interleaved float PCM
pub trait PcmSource: Send {
    /// Interleaved channel count
    fn channels(&self) -> usize;

    /// Frames per second
    fn sample_rate(&self) -> u32;

    /// Total length in frames, if known
    fn total_frames(&self) -> Option<u64>;

    /// Fill `out` with whole frames and return how many were written
    ///
    /// `out.len()` should be a multiple of `channels()`. Zero means the source
    /// is exhausted.
    fn read_frames(&mut self, out: &mut [f32]) -> SourceResult<usize>;

    /// Reposition to an absolute frame
    fn seek(&mut self, frame: u64) -> SourceResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory source
// ─────────────────────────────────────────────────────────────────────────────

/// PCM already held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Vec<f32>,
    channels: usize,
    sample_rate: u32,
    position: usize,
}

impl MemorySource {
    pub fn new(data: Vec<f32>, channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let mut data = data;
        data.truncate(data.len() - data.len() % channels);
        Self {
            data,
            channels,
            sample_rate,
            position: 0,
        }
    }

    fn frame_count(&self) -> usize {
        self.data.len() / self.channels
    }
}

impl PcmSource for MemorySource {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.frame_count() as u64)
    }

    fn read_frames(&mut self, out: &mut [f32]) -> SourceResult<usize> {
        let wanted = out.len() / self.channels;
        let frames = wanted.min(self.frame_count() - self.position);
        let start = self.position * self.channels;
        let len = frames * self.channels;
        out[..len].copy_from_slice(&self.data[start..start + len]);
        self.position += frames;
        Ok(frames)
    }

    fn seek(&mut self, frame: u64) -> SourceResult<()> {
        self.position = (frame as usize).min(self.frame_count());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File source (Symphonia)
// ─────────────────────────────────────────────────────────────────────────────

/// Incremental file decoder backed by Symphonia
pub struct SymphoniaSource {
    path: PathBuf,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
    sample_rate: u32,
    total_frames: Option<u64>,
    sample_buf: Option<SampleBuffer<f32>>,
    /// Decoded samples not yet handed out
    pending: Vec<f32>,
    pending_pos: usize,
    /// Frames to drop after an accurate seek landed early
    skip_frames: u64,
    finished: bool,
}

impl std::fmt::Debug for SymphoniaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymphoniaSource")
            .field("path", &self.path)
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("total_frames", &self.total_frames)
            .finish()
    }
}

impl SymphoniaSource {
    /// Open and probe an audio file
    pub fn open(path: &Path) -> SourceResult<Self> {
        let file = File::open(path).map_err(|e| SourceError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint with the file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| SourceError::UnsupportedFormat(e.to_string()))?;

        let format = probed.format;

        // Find the first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| SourceError::UnsupportedFormat("No audio track found".to_string()))?;

        let track_id = track.id;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| SourceError::UnsupportedFormat("Unknown sample rate".to_string()))?;

        let channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(2);

        let total_frames = track.codec_params.n_frames;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| SourceError::UnsupportedFormat(e.to_string()))?;

        log::debug!(
            "Opened {:?}: {} channels, {}Hz, {:?} frames",
            path,
            channels,
            sample_rate,
            total_frames
        );

        Ok(Self {
            path: path.to_path_buf(),
            format,
            decoder,
            track_id,
            channels,
            sample_rate,
            total_frames,
            sample_buf: None,
            pending: Vec::new(),
            pending_pos: 0,
            skip_frames: 0,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the next packet of our track into `pending`
    ///
    /// Returns false at end of stream.
    fn decode_next(&mut self) -> SourceResult<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.finished = true;
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    log::warn!("{:?}: stream parameters changed, ending playback", self.path);
                    self.finished = true;
                    return Ok(false);
                }
                Err(e) => return Err(SourceError::Decode(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("{:?}: skipping corrupt packet: {}", self.path, e);
                    continue;
                }
                Err(e) => return Err(SourceError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let capacity = decoded.capacity() as u64;
            let buf = self
                .sample_buf
                .get_or_insert_with(|| SampleBuffer::new(capacity, spec));
            buf.copy_interleaved_ref(decoded);

            let mut samples = buf.samples();
            if self.skip_frames > 0 {
                let frames = samples.len() / self.channels;
                let skip = (self.skip_frames as usize).min(frames);
                samples = &samples[skip * self.channels..];
                self.skip_frames -= skip as u64;
            }

            if samples.is_empty() {
                continue;
            }

            self.pending.clear();
            self.pending.extend_from_slice(samples);
            self.pending_pos = 0;
            return Ok(true);
        }
    }
}

impl PcmSource for SymphoniaSource {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    fn read_frames(&mut self, out: &mut [f32]) -> SourceResult<usize> {
        let channels = self.channels;
        let wanted = out.len() / channels;
        let mut filled = 0;

        while filled < wanted {
            if self.pending_pos >= self.pending.len() {
                if self.finished || !self.decode_next()? {
                    break;
                }
            }

            let available = (self.pending.len() - self.pending_pos) / channels;
            if available == 0 {
                self.pending_pos = self.pending.len();
                continue;
            }

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
        self.pending.clear();
        self.pending_pos = 0;
        self.skip_frames = 0;

        if let Some(total) = self.total_frames {
            if frame >= total {
                self.finished = true;
                return Ok(());
            }
        }

        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: frame,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| SourceError::Seek(e.to_string()))?;

        self.decoder.reset();
        self.skip_frames = seeked.required_ts.saturating_sub(seeked.actual_ts);
        self.finished = false;
        log::debug!("{:?}: seeked to frame {}", self.path, frame);
        Ok(())
    }
}

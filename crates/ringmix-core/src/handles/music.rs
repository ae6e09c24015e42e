//! Music - a streaming buffer fed from a decoded file

use std::path::Path;

use crate::engine::{BufferId, PlaybackState, Session};
use crate::stream::{
    refill_stream, reset_stream_position, LoopingSource, PcmSource, RefillReport,
    RefillScratch, ResamplingSource, SymphoniaSource,
};

use super::{log_stale, AudioStream, LoadError};

/// A file decoded on demand into a streaming buffer
///
/// Call [`Music::update`] regularly (every frame of the caller's loop) so the
/// stale half is refilled before the mixer reaches it.
pub struct Music {
    stream: AudioStream,
    source: Box<dyn PcmSource>,
    scratch: RefillScratch,
    /// Total length in device frames, 0 when unknown
    frame_count: u64,
    looping: bool,
}

impl Music {
    /// Open a file with a one-second ring
    pub fn load(session: &Session, path: &Path) -> Result<Self, LoadError> {
        Self::load_with_ring(session, path, session.sample_rate() as usize)
    }

    /// Open a file with a ring of `ring_frames` device frames
    pub fn load_with_ring(
        session: &Session,
        path: &Path,
        ring_frames: usize,
    ) -> Result<Self, LoadError> {
        let source = SymphoniaSource::open(path)?;
        log::info!(
            "Opened music {:?} ({}Hz, {} channels)",
            path,
            source.sample_rate(),
            source.channels()
        );
        Self::from_source(session, Box::new(source), ring_frames)
    }

    /// Stream from any source, converting it to the device rate if needed
    pub fn from_source(
        session: &Session,
        source: Box<dyn PcmSource>,
        ring_frames: usize,
    ) -> Result<Self, LoadError> {
        let device_rate = session.sample_rate();
        let source: Box<dyn PcmSource> = if source.sample_rate() == device_rate {
            source
        } else {
            Box::new(ResamplingSource::new(source, device_rate)?)
        };

        let channels = source.channels();
        if channels == 0 {
            return Err(LoadError::InvalidWave);
        }

        let stream = AudioStream::with_ring_frames(session, device_rate, 32, channels as u16, ring_frames)?;
        let frame_count = source.total_frames().unwrap_or(0);

        Ok(Self {
            stream,
            source,
            scratch: RefillScratch::new(),
            frame_count,
            looping: false,
        })
    }

    pub fn id(&self) -> BufferId {
        self.stream.id()
    }

    pub fn channels(&self) -> u16 {
        self.stream.channels()
    }

    /// Total length in device frames (0 if the container does not say)
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Continue from the start at end of file instead of trailing off into silence
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Refill whatever the mixer has consumed
    ///
    /// When looping, a half that crosses the end of the file is completed
    /// from the start, so the loop point is seamless.
    pub fn update(&mut self) -> RefillReport {
        let session = self.stream.session();
        let id = self.stream.id();
        let report = if self.looping {
            let mut source = LoopingSource::new(self.source.as_mut());
            refill_stream(session, id, &mut source, &mut self.scratch)
        } else {
            refill_stream(session, id, self.source.as_mut(), &mut self.scratch)
        };
        log_stale(report).unwrap_or_default()
    }

    /// Jump to `seconds` from the start
    pub fn seek(&mut self, seconds: f32) -> Result<(), LoadError> {
        let rate = self.stream.session().sample_rate() as f64;
        let mut frame = (seconds.max(0.0) as f64 * rate) as u64;
        if self.frame_count > 0 {
            frame = frame.min(self.frame_count);
        }

        self.source.seek(frame)?;
        reset_stream_position(self.stream.session(), self.stream.id(), frame)?;
        log::debug!("Music {} seeked to frame {}", self.stream.id().index(), frame);
        Ok(())
    }

    /// Length in seconds (0 if unknown)
    pub fn time_length(&self) -> f32 {
        self.frame_count as f32 / self.stream.session().sample_rate() as f32
    }

    /// Seconds played since play or the last seek target
    ///
    /// Wraps back to 0 at each loop point while looping.
    pub fn time_played(&self) -> f32 {
        let mut frames = self.stream.frames_processed();
        if self.frame_count > 0 {
            frames = if self.looping {
                frames % self.frame_count
            } else {
                frames.min(self.frame_count)
            };
        }
        frames as f32 / self.stream.session().sample_rate() as f32
    }

    /// Played past the end of a non-looping source
    pub fn is_finished(&self) -> bool {
        !self.looping && self.frame_count > 0 && self.stream.frames_processed() >= self.frame_count
    }

    pub fn play(&self) {
        self.stream.play();
    }

    /// Stop and rewind to the start
    pub fn stop(&mut self) {
        self.stream.stop();
        if let Err(e) = self.source.seek(0) {
            log::warn!("Failed to rewind music: {}", e);
        }
    }

    pub fn pause(&self) {
        self.stream.pause();
    }

    pub fn resume(&self) {
        self.stream.resume();
    }

    pub fn is_playing(&self) -> bool {
        self.stream.is_playing()
    }

    pub fn state(&self) -> PlaybackState {
        self.stream.state()
    }

    pub fn set_volume(&self, volume: f32) {
        self.stream.set_volume(volume);
    }

    pub fn set_pitch(&self, pitch: f32) -> bool {
        self.stream.set_pitch(pitch)
    }

    pub fn set_pan(&self, pan: f32) {
        self.stream.set_pan(pan);
    }
}

impl std::fmt::Debug for Music {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Music")
            .field("stream", &self.stream)
            .field("frame_count", &self.frame_count)
            .field("looping", &self.looping)
            .finish()
    }
}

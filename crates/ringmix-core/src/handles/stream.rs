//! AudioStream - a streaming buffer fed by the caller

use crate::engine::{BufferId, BufferUsage, PlaybackState, Session};
use crate::stream::push_pcm;
use crate::types::StereoSample;

use super::{log_stale, LoadError};

/// A streaming buffer whose PCM is pushed by the caller
///
/// Pushed audio must already be at the device rate; it is not resampled.
pub struct AudioStream {
    session: Session,
    id: BufferId,
    sample_rate: u32,
    sample_size: u32,
    channels: u16,
    scratch: Vec<StereoSample>,
}

impl AudioStream {
    /// Open a stream with a one-second ring
    pub fn new(
        session: &Session,
        sample_rate: u32,
        sample_size: u32,
        channels: u16,
    ) -> Result<Self, LoadError> {
        let frames = session.sample_rate() as usize;
        Self::with_ring_frames(session, sample_rate, sample_size, channels, frames)
    }

    /// Open a stream with a ring of `ring_frames` device frames (rounded up to even)
    pub fn with_ring_frames(
        session: &Session,
        sample_rate: u32,
        sample_size: u32,
        channels: u16,
        ring_frames: usize,
    ) -> Result<Self, LoadError> {
        if channels == 0 {
            return Err(LoadError::InvalidWave);
        }
        if sample_rate != session.sample_rate() {
            log::warn!(
                "Stream PCM at {}Hz will play at the device rate of {}Hz",
                sample_rate,
                session.sample_rate()
            );
        }

        let id = session.create_buffer(channels, ring_frames, BufferUsage::Streaming)?;
        Ok(Self {
            session: session.clone(),
            id,
            sample_rate,
            sample_size,
            channels,
            scratch: Vec::new(),
        })
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Frames per sub-buffer, the most one `update` can take
    pub fn sub_buffer_frames(&self) -> usize {
        log_stale(self.session.with_buffer(self.id, |b| b.sub_buffer_frames())).unwrap_or(0)
    }

    /// At least one half is waiting for data
    pub fn is_processed(&self) -> bool {
        log_stale(self.session.with_buffer(self.id, |b| b.needs_refill())).unwrap_or(false)
    }

    /// Push interleaved PCM into the next stale half
    ///
    /// Returns false if neither half was free; the data is not queued.
    pub fn update(&mut self, pcm: &[f32]) -> bool {
        let pushed = push_pcm(
            &self.session,
            self.id,
            pcm,
            self.channels as usize,
            &mut self.scratch,
        );
        let pushed = log_stale(pushed).unwrap_or(false);
        if !pushed {
            log::trace!("Stream {} has no stale sub-buffer, push dropped", self.id.index());
        }
        pushed
    }

    pub fn play(&self) {
        log_stale(self.session.play(self.id));
    }

    pub fn stop(&self) {
        log_stale(self.session.stop(self.id));
    }

    pub fn pause(&self) {
        log_stale(self.session.pause(self.id));
    }

    pub fn resume(&self) {
        log_stale(self.session.resume(self.id));
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_playing(self.id)
    }

    pub fn state(&self) -> PlaybackState {
        log_stale(self.session.state(self.id)).unwrap_or(PlaybackState::Stopped)
    }

    pub fn set_volume(&self, volume: f32) {
        log_stale(self.session.set_volume(self.id, volume));
    }

    /// Stored only; playback speed is unaffected
    pub fn set_pitch(&self, pitch: f32) -> bool {
        log_stale(self.session.set_pitch(self.id, pitch)).unwrap_or(false)
    }

    pub fn set_pan(&self, pan: f32) {
        log_stale(self.session.set_pan(self.id, pan));
    }

    /// Device frames consumed since play or the last seek
    pub fn frames_processed(&self) -> u64 {
        log_stale(self.session.frames_processed(self.id)).unwrap_or(0)
    }
}

impl Drop for AudioStream {
    fn drop(&mut self) {
        self.session.destroy_buffer(self.id);
    }
}

impl std::fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioStream")
            .field("id", &self.id)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}

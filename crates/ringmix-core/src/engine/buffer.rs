//! AudioBuffer - double-buffered PCM ring with playback state
//!
//! Every buffer holds its PCM at the device layout (stereo frames). A streaming
//! buffer is split into two equal sub-buffers: the mixing engine consumes one
//! half while the refill protocol rewrites the other. Each half carries a
//! "processed" flag:
//!
//! - `true`: stale, must be refilled before it is mixed again
//! - `false`: fresh data ready to mix
//!
//! The mixer marks a half stale when the cursor leaves it. Refill and push
//! clear the flag in the same critical section that writes the half, so the
//! mixer never reads a half that is mid-write.
//!
//! Static buffers reuse the same cursor/segment logic over the whole decoded
//! asset and stop when the cursor reaches the end.

use crate::types::{StereoGain, StereoSample};

use super::error::{EngineError, EngineResult};

/// Default buffer volume
pub const DEFAULT_VOLUME: f32 = 1.0;
/// Default pitch (stored, never applied by the mixer)
pub const DEFAULT_PITCH: f32 = 1.0;
/// Default pan (centre)
pub const DEFAULT_PAN: f32 = 0.5;

/// How a buffer's PCM is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Fully resident data, stops at the end
    Static,
    /// Two sub-buffers refilled forever by a producer
    Streaming,
}

/// Observable playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// A single playable buffer
#[derive(Debug)]
pub struct AudioBuffer {
    data: Vec<StereoSample>,
    size_in_frames: usize,
    frame_cursor_pos: usize,
    frames_processed: u64,
    sub_buffer_processed: [bool; 2],
    playing: bool,
    paused: bool,
    volume: f32,
    pitch: f32,
    pan: f32,
    usage: BufferUsage,
    /// Channel count of the producer feeding this buffer
    source_channels: u16,
    /// Bumped by stop and seek so an in-flight refill cannot land stale audio
    refill_epoch: u64,
}

impl AudioBuffer {
    /// Allocate a zeroed buffer
    ///
    /// Streaming buffers round their size up to an even frame count so both
    /// halves are the same length. Memory is reserved fallibly: on failure no
    /// buffer exists and nothing needs to be unwound.
    pub fn new(source_channels: u16, size_in_frames: usize, usage: BufferUsage) -> EngineResult<Self> {
        if size_in_frames == 0 {
            return Err(EngineError::InvalidParameter(
                "buffer size must be at least one frame".to_string(),
            ));
        }

        let size_in_frames = match usage {
            BufferUsage::Static => Some(size_in_frames),
            BufferUsage::Streaming => size_in_frames.checked_add(size_in_frames % 2),
        }
        .ok_or(EngineError::AllocationFailure { frames: size_in_frames })?;

        let mut data: Vec<StereoSample> = Vec::new();
        data.try_reserve_exact(size_in_frames)
            .map_err(|_| EngineError::AllocationFailure { frames: size_in_frames })?;
        data.resize(size_in_frames, StereoSample::silence());

        let stale = usage == BufferUsage::Streaming;

        Ok(Self {
            data,
            size_in_frames,
            frame_cursor_pos: 0,
            frames_processed: 0,
            sub_buffer_processed: [stale, stale],
            playing: false,
            paused: false,
            volume: DEFAULT_VOLUME,
            pitch: DEFAULT_PITCH,
            pan: DEFAULT_PAN,
            usage,
            source_channels,
            refill_epoch: 0,
        })
    }

    /// Allocate a static buffer holding `frames`
    pub fn from_frames(source_channels: u16, frames: &[StereoSample]) -> EngineResult<Self> {
        let mut buffer = Self::new(source_channels, frames.len(), BufferUsage::Static)?;
        buffer.data.copy_from_slice(frames);
        Ok(buffer)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────────

    /// Start from the top
    ///
    /// Static buffers mark both halves fresh again. Streaming freshness is left
    /// to the refill protocol.
    pub fn play(&mut self) {
        self.playing = true;
        self.paused = false;
        self.frame_cursor_pos = 0;
        self.frames_processed = 0;
        if self.usage == BufferUsage::Static {
            self.sub_buffer_processed = [false, false];
        }
    }

    /// Stop and force a refill before the next play
    pub fn stop(&mut self) {
        self.playing = false;
        self.paused = false;
        self.frame_cursor_pos = 0;
        self.frames_processed = 0;
        self.sub_buffer_processed = [true, true];
        self.refill_epoch = self.refill_epoch.wrapping_add(1);
    }

    /// Freeze in place
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Continue exactly where `pause` left off
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Playing and not paused
    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing && !self.paused
    }

    pub fn state(&self) -> PlaybackState {
        match (self.playing, self.paused) {
            (false, _) => PlaybackState::Stopped,
            (true, true) => PlaybackState::Paused,
            (true, false) => PlaybackState::Playing,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Parameters
    // ─────────────────────────────────────────────────────────────────────────

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    /// Set the gain multiplier. Non-finite values are ignored.
    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            log::warn!("Ignoring non-finite volume {}", volume);
            return;
        }
        self.volume = volume;
    }

    /// Store a new pitch. Negative and non-finite values are rejected and the
    /// previous pitch is kept; returns whether the write happened.
    pub fn set_pitch(&mut self, pitch: f32) -> bool {
        if !pitch.is_finite() || pitch < 0.0 {
            log::warn!("Rejecting invalid pitch {}", pitch);
            return false;
        }
        self.pitch = pitch;
        true
    }

    /// Set the pan position, clamped to [0, 1]
    pub fn set_pan(&mut self, pan: f32) {
        if pan.is_nan() {
            log::warn!("Ignoring NaN pan");
            return;
        }
        self.pan = pan.clamp(0.0, 1.0);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ring state
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    #[inline]
    pub fn size_in_frames(&self) -> usize {
        self.size_in_frames
    }

    /// Frames per sub-buffer (at least one)
    #[inline]
    pub fn sub_buffer_frames(&self) -> usize {
        (self.size_in_frames / 2).max(1)
    }

    #[inline]
    pub fn frame_cursor_pos(&self) -> usize {
        self.frame_cursor_pos
    }

    #[inline]
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    #[inline]
    pub fn is_sub_buffer_processed(&self, index: usize) -> bool {
        self.sub_buffer_processed[index & 1]
    }

    /// True if either half is waiting for data
    #[inline]
    pub fn needs_refill(&self) -> bool {
        self.sub_buffer_processed[0] || self.sub_buffer_processed[1]
    }

    #[inline]
    pub fn source_channels(&self) -> u16 {
        self.source_channels
    }

    #[inline]
    pub fn refill_epoch(&self) -> u64 {
        self.refill_epoch
    }

    /// Read-only view of the PCM
    pub fn frames(&self) -> &[StereoSample] {
        &self.data
    }

    /// Index (0 or 1) of the half holding the cursor
    #[inline]
    fn current_sub_buffer(&self) -> usize {
        if self.frame_cursor_pos < self.sub_buffer_frames() {
            0
        } else {
            1
        }
    }

    /// First frame past the end of a half
    #[inline]
    fn sub_buffer_end(&self, index: usize) -> usize {
        if index == 0 {
            self.sub_buffer_frames().min(self.size_in_frames)
        } else {
            self.size_in_frames
        }
    }

    /// Copy device-layout frames into one half and mark it fresh
    ///
    /// Frames beyond the half are dropped; a short write zero-fills the rest of
    /// the half so old audio is never replayed.
    pub fn write_sub_buffer(&mut self, index: usize, frames: &[StereoSample]) -> usize {
        let index = index & 1;
        let start = if index == 0 { 0 } else { self.sub_buffer_frames().min(self.size_in_frames) };
        let end = self.sub_buffer_end(index);
        let half = &mut self.data[start..end];

        let written = frames.len().min(half.len());
        half[..written].copy_from_slice(&frames[..written]);
        half[written..].fill(StereoSample::silence());

        self.sub_buffer_processed[index] = false;
        written
    }

    /// Land a refill computed outside the lock
    ///
    /// The write is discarded if the buffer was stopped or seeked since
    /// `epoch` was read, or if the half was already refilled.
    pub fn complete_refill(&mut self, index: usize, epoch: u64, frames: &[StereoSample]) -> bool {
        if epoch != self.refill_epoch || !self.sub_buffer_processed[index & 1] {
            return false;
        }
        self.write_sub_buffer(index, frames);
        true
    }

    /// Reposition after the upstream source was seeked
    ///
    /// Both halves become stale and the cursor returns to the ring start, so the
    /// next mix reads nothing from before the seek.
    pub fn reset_for_seek(&mut self, frames_processed: u64) {
        self.frame_cursor_pos = 0;
        self.frames_processed = frames_processed;
        self.sub_buffer_processed = [true, true];
        self.refill_epoch = self.refill_epoch.wrapping_add(1);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mixing
    // ─────────────────────────────────────────────────────────────────────────

    /// Add exactly `out.len()` frames of this buffer into `out`
    ///
    /// Walks the ring in segments that never cross a sub-buffer boundary. A
    /// stale segment contributes silence but still advances the cursor.
    /// Returns the number of silent (underrun) segments.
    pub fn mix_into(&mut self, out: &mut [StereoSample]) -> usize {
        if !self.is_playing() || self.data.is_empty() {
            return 0;
        }

        let gains = StereoGain::from_volume_pan(self.volume, self.pan);
        let mut underruns = 0;
        let mut mixed = 0;

        while mixed < out.len() {
            let half = self.current_sub_buffer();
            let boundary = self.sub_buffer_end(half);
            let segment = (out.len() - mixed).min(boundary - self.frame_cursor_pos);

            if self.sub_buffer_processed[half] {
                underruns += 1;
            } else {
                let src = &self.data[self.frame_cursor_pos..self.frame_cursor_pos + segment];
                for (dst, frame) in out[mixed..mixed + segment].iter_mut().zip(src) {
                    *dst += frame.apply_gains(gains);
                }
            }

            mixed += segment;
            self.frames_processed += segment as u64;
            let next = self.frame_cursor_pos + segment;

            if next >= boundary {
                self.sub_buffer_processed[half] = true;
            }
            self.frame_cursor_pos = next % self.size_in_frames;

            if self.usage == BufferUsage::Static && next >= self.size_in_frames {
                self.playing = false;
                break;
            }
        }

        underruns
    }
}

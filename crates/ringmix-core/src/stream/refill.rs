//! Streaming refill protocol - the producer side of the double buffer
//!
//! For each stale sub-buffer the protocol:
//!
//! 1. snapshots the flag and refill epoch under the buffer lock, then releases it
//! 2. reads exactly one sub-buffer of frames from the source with no lock held
//! 3. converts the frames to the device layout
//! 4. re-locks, writes the half, zero-fills any shortfall and clears the flag
//!    in one critical section
//!
//! If the buffer was stopped or seeked between 1 and 4, the epoch no longer
//! matches and the write is dropped. Falling behind is not an error: the mixer
//! plays silence for stale halves until the next refill lands.

use crate::engine::{BufferId, EngineResult, Session};
use crate::types::StereoSample;

use super::source::PcmSource;

/// Reusable scratch memory for refills
#[derive(Debug, Default)]
pub struct RefillScratch {
    source: Vec<f32>,
    frames: Vec<StereoSample>,
}

impl RefillScratch {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Outcome of one refill pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefillReport {
    /// Sub-buffers written and marked fresh
    pub sub_buffers_written: usize,
    /// Source frames consumed
    pub frames_read: usize,
    /// The source returned fewer frames than asked for
    pub exhausted: bool,
    /// Refills dropped because the buffer was stopped or seeked meanwhile
    pub discarded: usize,
}

/// Convert interleaved PCM to stereo frames
///
/// Mono is duplicated into both channels, stereo is copied verbatim, wider
/// layouts keep their first two channels.
pub fn convert_channels(src: &[f32], channels: usize, dst: &mut Vec<StereoSample>) {
    dst.clear();
    match channels {
        0 => {}
        1 => dst.extend(src.iter().map(|&s| StereoSample::mono(s))),
        _ => dst.extend(
            src.chunks_exact(channels)
                .map(|frame| StereoSample::new(frame[0], frame[1])),
        ),
    }
}

/// Top up every stale half of a streaming buffer from `source`
///
/// Source errors are logged and degrade to a short read (silence), so a
/// corrupt packet never stalls playback.
pub fn refill_stream(
    session: &Session,
    id: BufferId,
    source: &mut dyn PcmSource,
    scratch: &mut RefillScratch,
) -> EngineResult<RefillReport> {
    let mut report = RefillReport::default();
    let channels = source.channels().max(1);

    for index in 0..2 {
        let (stale, epoch, sub_frames) = session.with_buffer(id, |b| {
            (
                b.is_sub_buffer_processed(index),
                b.refill_epoch(),
                b.sub_buffer_frames(),
            )
        })?;
        if !stale {
            continue;
        }

        scratch.source.resize(sub_frames * channels, 0.0);
        let frames = match source.read_frames(&mut scratch.source) {
            Ok(frames) => frames,
            Err(e) => {
                log::warn!("Refill read failed, writing silence: {}", e);
                0
            }
        };
        if frames < sub_frames {
            report.exhausted = true;
        }
        report.frames_read += frames;

        convert_channels(&scratch.source[..frames * channels], channels, &mut scratch.frames);

        let landed =
            session.with_buffer(id, |b| b.complete_refill(index, epoch, &scratch.frames))?;
        if landed {
            report.sub_buffers_written += 1;
        } else {
            report.discarded += 1;
        }
    }

    if report.sub_buffers_written > 0 {
        log::trace!(
            "Refilled {} sub-buffer(s) of buffer {} ({} frames)",
            report.sub_buffers_written,
            id.index(),
            report.frames_read
        );
    }

    Ok(report)
}

/// Reposition a streaming buffer after its source was seeked
///
/// `frames_processed` is the new playback position in device frames.
pub fn reset_stream_position(
    session: &Session,
    id: BufferId,
    frames_processed: u64,
) -> EngineResult<()> {
    session.with_buffer(id, |b| b.reset_for_seek(frames_processed))
}

/// Push caller-generated PCM into the first stale half
///
/// At most one sub-buffer is written; extra frames are dropped and a short
/// push is zero-filled. Returns false if both halves still hold unplayed audio.
pub fn push_pcm(
    session: &Session,
    id: BufferId,
    pcm: &[f32],
    channels: usize,
    scratch: &mut Vec<StereoSample>,
) -> EngineResult<bool> {
    convert_channels(pcm, channels.max(1), scratch);

    session.with_buffer(id, |b| {
        let index = (0..2).find(|&i| b.is_sub_buffer_processed(i));
        match index {
            Some(index) => {
                b.write_sub_buffer(index, &scratch[..]);
                true
            }
            None => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BufferUsage;
    use crate::stream::source::MemorySource;

    fn ramp(frames: usize) -> Vec<f32> {
        (1..=frames).map(|i| i as f32).collect()
    }

    #[test]
    fn test_convert_mono_duplicates() {
        let mut out = Vec::new();
        convert_channels(&[0.1, 0.2], 1, &mut out);
        assert_eq!(out, vec![StereoSample::mono(0.1), StereoSample::mono(0.2)]);
    }

    #[test]
    fn test_convert_stereo_verbatim() {
        let mut out = Vec::new();
        convert_channels(&[0.1, 0.2, 0.3, 0.4], 2, &mut out);
        assert_eq!(out, vec![StereoSample::new(0.1, 0.2), StereoSample::new(0.3, 0.4)]);
    }

    #[test]
    fn test_convert_wide_truncates() {
        let mut out = Vec::new();
        convert_channels(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, &mut out);
        assert_eq!(out, vec![StereoSample::new(1.0, 2.0), StereoSample::new(4.0, 5.0)]);
    }

    #[test]
    fn test_refill_fills_both_stale_halves() {
        let session = Session::default();
        let id = session.create_buffer(1, 8, BufferUsage::Streaming).unwrap();
        let mut source = MemorySource::new(ramp(100), 1, 44100);
        let mut scratch = RefillScratch::new();

        let report = refill_stream(&session, id, &mut source, &mut scratch).unwrap();

        assert_eq!(report.sub_buffers_written, 2);
        assert_eq!(report.frames_read, 8);
        assert!(!report.exhausted);
        session
            .with_buffer(id, |b| {
                assert!(!b.needs_refill());
                assert_eq!(b.frames()[0], StereoSample::mono(1.0));
                assert_eq!(b.frames()[7], StereoSample::mono(8.0));
            })
            .unwrap();
    }

    #[test]
    fn test_refill_only_touches_stale_half() {
        let session = Session::default();
        let id = session.create_buffer(2, 8, BufferUsage::Streaming).unwrap();
        let mut source = MemorySource::new(vec![0.5; 200], 2, 44100);
        let mut scratch = RefillScratch::new();
        refill_stream(&session, id, &mut source, &mut scratch).unwrap();

        // Play through half 0 only
        session.play(id).unwrap();
        let mut out = vec![StereoSample::silence(); 4];
        session.mix(&mut out);
        session
            .with_buffer(id, |b| {
                assert!(b.is_sub_buffer_processed(0));
                assert!(!b.is_sub_buffer_processed(1));
            })
            .unwrap();

        let report = refill_stream(&session, id, &mut source, &mut scratch).unwrap();
        assert_eq!(report.sub_buffers_written, 1);
        assert_eq!(report.frames_read, 4);
    }

    #[test]
    fn test_short_read_zero_fills() {
        let session = Session::default();
        let id = session.create_buffer(1, 8, BufferUsage::Streaming).unwrap();
        let mut source = MemorySource::new(ramp(5), 1, 44100);
        let mut scratch = RefillScratch::new();

        let report = refill_stream(&session, id, &mut source, &mut scratch).unwrap();

        assert!(report.exhausted);
        assert_eq!(report.frames_read, 5);
        session
            .with_buffer(id, |b| {
                assert_eq!(b.frames()[4], StereoSample::mono(5.0));
                assert!(b.frames()[5..].iter().all(|f| *f == StereoSample::silence()));
                assert!(!b.needs_refill());
            })
            .unwrap();
    }

    #[test]
    fn test_refill_then_mix_plays_source() {
        let session = Session::default();
        let id = session.create_buffer(1, 8, BufferUsage::Streaming).unwrap();
        session.set_pan(id, 0.0).unwrap();
        let mut source = MemorySource::new(ramp(64), 1, 44100);
        let mut scratch = RefillScratch::new();

        session.play(id).unwrap();
        let mut heard = Vec::new();
        for _ in 0..4 {
            refill_stream(&session, id, &mut source, &mut scratch).unwrap();
            let mut out = vec![StereoSample::silence(); 4];
            session.mix(&mut out);
            heard.extend(out.iter().map(|f| f.left));
        }

        let expected: Vec<f32> = (1..=16).map(|i| i as f32).collect();
        assert_eq!(heard, expected);
        assert_eq!(session.stats().underrun_segments(), 0);
    }

    #[test]
    fn test_reset_position_forces_reload() {
        let session = Session::default();
        let id = session.create_buffer(2, 8, BufferUsage::Streaming).unwrap();
        let mut source = MemorySource::new(vec![0.25; 64], 2, 44100);
        let mut scratch = RefillScratch::new();
        refill_stream(&session, id, &mut source, &mut scratch).unwrap();

        reset_stream_position(&session, id, 22050).unwrap();

        session
            .with_buffer(id, |b| {
                assert!(b.is_sub_buffer_processed(0));
                assert!(b.is_sub_buffer_processed(1));
                assert_eq!(b.frame_cursor_pos(), 0);
                assert_eq!(b.frames_processed(), 22050);
            })
            .unwrap();
    }

    #[test]
    fn test_push_pcm_targets_stale_half() {
        let session = Session::default();
        let id = session.create_buffer(1, 8, BufferUsage::Streaming).unwrap();
        let mut scratch = Vec::new();

        assert!(push_pcm(&session, id, &[1.0, 2.0, 3.0, 4.0], 1, &mut scratch).unwrap());
        assert!(push_pcm(&session, id, &[5.0, 6.0], 1, &mut scratch).unwrap());
        assert!(!push_pcm(&session, id, &[7.0], 1, &mut scratch).unwrap());

        session
            .with_buffer(id, |b| {
                assert_eq!(b.frames()[3], StereoSample::mono(4.0));
                assert_eq!(b.frames()[5], StereoSample::mono(6.0));
                assert_eq!(b.frames()[6], StereoSample::silence());
            })
            .unwrap();
    }

    #[test]
    fn test_refill_stale_handle() {
        let session = Session::default();
        let id = session.create_buffer(1, 8, BufferUsage::Streaming).unwrap();
        session.destroy_buffer(id);
        let mut source = MemorySource::new(ramp(8), 1, 44100);
        let mut scratch = RefillScratch::new();
        assert!(refill_stream(&session, id, &mut source, &mut scratch).is_err());
    }
}

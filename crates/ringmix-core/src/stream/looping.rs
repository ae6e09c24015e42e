//! Endless playback of a finite source
//!
//! [`LoopingSource`] rewinds the wrapped source in the middle of a read, so a
//! refill that crosses the end of the file is filled from the top instead of
//! being zero-padded.

use super::error::SourceResult;
use super::source::PcmSource;

/// Borrowed view of a source that wraps back to frame 0 at end of file
pub struct LoopingSource<'a> {
    inner: &'a mut dyn PcmSource,
}

impl<'a> LoopingSource<'a> {
    pub fn new(inner: &'a mut dyn PcmSource) -> Self {
        Self { inner }
    }
}

impl PcmSource for LoopingSource<'_> {
    fn channels(&self) -> usize {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_frames(&self) -> Option<u64> {
        None
    }

    /// Fills `out` completely unless the source yields nothing right after a rewind
    fn read_frames(&mut self, out: &mut [f32]) -> SourceResult<usize> {
        let channels = self.inner.channels().max(1);
        let wanted = out.len() / channels;
        let mut filled = 0;
        let mut rewound = false;

        while filled < wanted {
            let read = self
                .inner
                .read_frames(&mut out[filled * channels..wanted * channels])?;
            if read > 0 {
                filled += read;
                rewound = false;
                continue;
            }
            // Empty source
            if rewound {
                break;
            }
            self.inner.seek(0)?;
            rewound = true;
        }

        Ok(filled)
    }

    fn seek(&mut self, frame: u64) -> SourceResult<()> {
        self.inner.seek(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemorySource;

    #[test]
    fn test_read_wraps_at_end() {
        let mut source = MemorySource::new(vec![1.0, 2.0, 3.0, 4.0], 1, 44100);
        let mut looping = LoopingSource::new(&mut source);

        let mut out = vec![0.0; 10];
        assert_eq!(looping.read_frames(&mut out).unwrap(), 10);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0, 1.0, 2.0]);

        let mut out = vec![0.0; 3];
        looping.read_frames(&mut out).unwrap();
        assert_eq!(out, vec![3.0, 4.0, 1.0]);
    }

    #[test]
    fn test_wraps_whole_stereo_frames() {
        let mut source = MemorySource::new(vec![0.1, 0.2, 0.3, 0.4], 2, 44100);
        let mut looping = LoopingSource::new(&mut source);

        let mut out = vec![0.0; 6];
        assert_eq!(looping.read_frames(&mut out).unwrap(), 3);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4, 0.1, 0.2]);
    }

    #[test]
    fn test_empty_source_returns_short() {
        let mut source = MemorySource::new(Vec::new(), 1, 44100);
        let mut looping = LoopingSource::new(&mut source);

        let mut out = vec![0.0; 8];
        assert_eq!(looping.read_frames(&mut out).unwrap(), 0);
        assert_eq!(looping.total_frames(), None);
    }
}

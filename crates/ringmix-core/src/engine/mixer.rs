//! Mixing engine - sums every registered buffer into one output block
//!
//! Called once per device period with the registry already locked. Buffers are
//! visited in registry order and their contributions are summed, not averaged;
//! headroom is managed with master volume.

use std::sync::TryLockError;

use crate::types::StereoSample;

use super::registry::Registry;

/// What happened during one mix pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixReport {
    /// Buffers that were playing and got mixed
    pub mixed: usize,
    /// Buffers skipped because a control thread held their lock
    pub contended: usize,
    /// Sub-buffer segments replaced by silence
    pub underruns: usize,
}

/// Add every playing buffer into `out`
///
/// Never blocks: a buffer whose lock is held elsewhere sits out this cycle so
/// one busy buffer cannot stall the whole device callback.
pub fn mix_buffers(registry: &Registry, out: &mut [StereoSample]) -> MixReport {
    let mut report = MixReport::default();

    for (_, shared) in registry.iter() {
        let mut buffer = match shared.try_lock() {
            Ok(buffer) => buffer,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                report.contended += 1;
                continue;
            }
        };

        if !buffer.is_playing() {
            continue;
        }

        report.underruns += buffer.mix_into(out);
        report.mixed += 1;
    }

    report
}

/// Scale the finished block by the session master volume
#[inline]
pub fn apply_master_volume(out: &mut [StereoSample], master_volume: f32) {
    if master_volume == 1.0 {
        return;
    }
    for frame in out.iter_mut() {
        *frame *= master_volume;
    }
}

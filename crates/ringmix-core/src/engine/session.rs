//! Session - master volume, device format and the buffer registry
//!
//! A session is a cheap cloneable handle; every clone drives the same mix.
//! Any number of sessions can exist side by side.
//!
//! # Locking
//!
//! - One registry `RwLock`. Insert and remove take it for writing; lookups
//!   and the mix traversal only read, so control calls never cost the device
//!   a block.
//! - One mutex per buffer guards its fields and PCM.
//! - Order is always registry then buffer. Control calls release the registry
//!   before touching a buffer, so no control thread ever holds both.
//! - The device callback only uses `try_read`/`try_lock` and never frees
//!   buffer memory: removed buffers are dropped on the calling thread after
//!   the registry lock is released.
//! - Master volume is an atomic and needs no lock.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use crate::types::{StereoSample, DEFAULT_SAMPLE_RATE};

use super::buffer::{AudioBuffer, BufferUsage, PlaybackState};
use super::error::{EngineError, EngineResult};
use super::mixer::{apply_master_volume, mix_buffers};
use super::registry::{BufferId, Registry};

/// Lock-free mix counters for monitoring
///
/// Written by the device callback, read by anyone. All operations use
/// `Ordering::Relaxed` since only visibility matters.
#[derive(Debug, Default)]
pub struct MixStats {
    /// Mix cycles run
    pub cycles: AtomicU64,
    /// Cycles emitted as silence because a buffer was being added or removed
    pub skipped_cycles: AtomicU64,
    /// Sub-buffer segments replaced by silence (refill fell behind)
    pub underrun_segments: AtomicU64,
    /// Buffer visits skipped because a control thread held the buffer
    pub contended_buffers: AtomicU64,
}

impl MixStats {
    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn skipped_cycles(&self) -> u64 {
        self.skipped_cycles.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn underrun_segments(&self) -> u64 {
        self.underrun_segments.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn contended_buffers(&self) -> u64 {
        self.contended_buffers.load(Ordering::Relaxed)
    }
}

struct SessionInner {
    registry: RwLock<Registry>,
    /// f32 bits
    master_volume: AtomicU32,
    sample_rate: u32,
    stats: MixStats,
}

/// Shared mixing context
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("sample_rate", &self.inner.sample_rate)
            .field("master_volume", &self.master_volume())
            .field("buffers", &self.buffer_count())
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl Session {
    /// Create a session mixing at `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        log::info!("Session created at {}Hz", sample_rate);
        Self {
            inner: Arc::new(SessionInner {
                registry: RwLock::new(Registry::new()),
                master_volume: AtomicU32::new(1.0f32.to_bits()),
                sample_rate,
                stats: MixStats::default(),
            }),
        }
    }

    /// Device sample rate every buffer is mixed at
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    #[inline]
    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.inner.master_volume.load(Ordering::Relaxed))
    }

    /// Set the master volume, clamped to [0, 1]
    pub fn set_master_volume(&self, volume: f32) {
        if volume.is_nan() {
            log::warn!("Ignoring NaN master volume");
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.inner
            .master_volume
            .store(volume.to_bits(), Ordering::Relaxed);
    }

    pub fn stats(&self) -> &MixStats {
        &self.inner.stats
    }

    fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live buffers
    pub fn buffer_count(&self) -> usize {
        self.registry().len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Buffer lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Allocate a zeroed buffer and register it
    ///
    /// Allocation happens before the registry lock is taken; a failed
    /// allocation leaves the registry untouched.
    pub fn create_buffer(
        &self,
        source_channels: u16,
        size_in_frames: usize,
        usage: BufferUsage,
    ) -> EngineResult<BufferId> {
        let buffer = AudioBuffer::new(source_channels, size_in_frames, usage)?;
        Ok(self.register(buffer))
    }

    /// Register a static buffer holding `frames`
    pub fn create_static_buffer(
        &self,
        source_channels: u16,
        frames: &[StereoSample],
    ) -> EngineResult<BufferId> {
        let buffer = AudioBuffer::from_frames(source_channels, frames)?;
        Ok(self.register(buffer))
    }

    fn register(&self, buffer: AudioBuffer) -> BufferId {
        let usage = buffer.usage();
        let frames = buffer.size_in_frames();
        let id = self.registry_mut().register(Arc::new(Mutex::new(buffer)));
        log::debug!(
            "Registered {:?} buffer {} ({} frames)",
            usage,
            id.index(),
            frames
        );
        id
    }

    /// Deregister a buffer and release its memory
    ///
    /// Returns false for stale ids. The memory is freed here, after the
    /// registry lock is released, never on the device thread.
    pub fn destroy_buffer(&self, id: BufferId) -> bool {
        let removed = self.registry_mut().deregister(id);
        match removed {
            Some(buffer) => {
                drop(buffer);
                log::debug!("Destroyed buffer {}", id.index());
                true
            }
            None => false,
        }
    }

    /// Destroy every buffer (session teardown)
    pub fn clear(&self) {
        let drained = self.registry_mut().drain();
        if !drained.is_empty() {
            log::info!("Released {} buffers", drained.len());
        }
    }

    /// Run `f` with exclusive access to one buffer
    pub fn with_buffer<R>(
        &self,
        id: BufferId,
        f: impl FnOnce(&mut AudioBuffer) -> R,
    ) -> EngineResult<R> {
        let shared = self
            .registry()
            .get(id)
            .cloned()
            .ok_or(EngineError::InvalidHandle)?;
        let mut buffer = shared.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut *buffer))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Control surface
    // ─────────────────────────────────────────────────────────────────────────

    pub fn play(&self, id: BufferId) -> EngineResult<()> {
        self.with_buffer(id, AudioBuffer::play)
    }

    pub fn stop(&self, id: BufferId) -> EngineResult<()> {
        self.with_buffer(id, AudioBuffer::stop)
    }

    pub fn pause(&self, id: BufferId) -> EngineResult<()> {
        self.with_buffer(id, AudioBuffer::pause)
    }

    pub fn resume(&self, id: BufferId) -> EngineResult<()> {
        self.with_buffer(id, AudioBuffer::resume)
    }

    pub fn is_playing(&self, id: BufferId) -> bool {
        self.with_buffer(id, |b| b.is_playing()).unwrap_or(false)
    }

    pub fn state(&self, id: BufferId) -> EngineResult<PlaybackState> {
        self.with_buffer(id, |b| b.state())
    }

    pub fn set_volume(&self, id: BufferId, volume: f32) -> EngineResult<()> {
        self.with_buffer(id, |b| b.set_volume(volume))
    }

    /// Returns whether the pitch was accepted
    pub fn set_pitch(&self, id: BufferId, pitch: f32) -> EngineResult<bool> {
        self.with_buffer(id, |b| b.set_pitch(pitch))
    }

    pub fn set_pan(&self, id: BufferId, pan: f32) -> EngineResult<()> {
        self.with_buffer(id, |b| b.set_pan(pan))
    }

    pub fn frames_processed(&self, id: BufferId) -> EngineResult<u64> {
        self.with_buffer(id, |b| b.frames_processed())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Device side
    // ─────────────────────────────────────────────────────────────────────────

    /// Produce one output block (called from the device callback)
    ///
    /// The block is zeroed, every playing buffer is summed in, then master
    /// volume is applied. Lookups never block the mix; only while a buffer is
    /// being created or destroyed does the whole block stay silent instead of
    /// waiting.
    pub fn mix(&self, out: &mut [StereoSample]) {
        out.fill(StereoSample::silence());
        let stats = &self.inner.stats;
        stats.cycles.fetch_add(1, Ordering::Relaxed);

        let registry = match self.inner.registry.try_read() {
            Ok(registry) => registry,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                stats.skipped_cycles.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let report = mix_buffers(&registry, out);
        apply_master_volume(out, self.master_volume());
        drop(registry);

        if report.underruns > 0 {
            stats
                .underrun_segments
                .fetch_add(report.underruns as u64, Ordering::Relaxed);
        }
        if report.contended > 0 {
            stats
                .contended_buffers
                .fetch_add(report.contended as u64, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn test_master_volume_scales_mix() {
        let session = Session::new(44100);
        let id = session
            .create_static_buffer(2, &vec![StereoSample::mono(1.0); 64])
            .unwrap();
        session.set_pan(id, 0.0).unwrap();
        session.play(id).unwrap();
        session.set_master_volume(0.5);

        let mut out = vec![StereoSample::silence(); 16];
        session.mix(&mut out);

        for frame in &out {
            assert!((frame.left - 0.5).abs() < EPS);
            assert_eq!(frame.right, 0.0);
        }
        assert_eq!(session.stats().cycles(), 1);
    }

    #[test]
    fn test_master_volume_clamped() {
        let session = Session::default();
        session.set_master_volume(3.0);
        assert_eq!(session.master_volume(), 1.0);
        session.set_master_volume(-1.0);
        assert_eq!(session.master_volume(), 0.0);
        session.set_master_volume(f32::NAN);
        assert_eq!(session.master_volume(), 0.0);
    }

    #[test]
    fn test_mix_clears_previous_block() {
        let session = Session::default();
        let mut out = vec![StereoSample::mono(3.0); 8];
        session.mix(&mut out);
        assert!(out.iter().all(|f| *f == StereoSample::silence()));
    }

    #[test]
    fn test_busy_registry_skips_cycle() {
        let session = Session::default();
        let id = session
            .create_static_buffer(2, &vec![StereoSample::mono(1.0); 64])
            .unwrap();
        session.play(id).unwrap();

        let guard = session.inner.registry.write().unwrap();
        let mut out = vec![StereoSample::mono(1.0); 8];
        session.mix(&mut out);
        drop(guard);

        assert!(out.iter().all(|f| *f == StereoSample::silence()));
        assert_eq!(session.stats().skipped_cycles(), 1);
        // Position untouched by the skipped cycle
        assert_eq!(session.frames_processed(id).unwrap(), 0);
    }

    #[test]
    fn test_registry_lookup_does_not_skip_cycle() {
        let session = Session::default();
        let id = session
            .create_static_buffer(2, &vec![StereoSample::mono(1.0); 64])
            .unwrap();
        session.set_pan(id, 0.0).unwrap();
        session.play(id).unwrap();

        // A control thread mid-lookup holds the registry for reading
        let lookup = session.inner.registry.read().unwrap();
        let mut out = vec![StereoSample::silence(); 8];
        session.mix(&mut out);
        drop(lookup);

        assert!(out.iter().all(|f| (f.left - 1.0).abs() < EPS));
        assert_eq!(session.stats().skipped_cycles(), 0);
        assert_eq!(session.frames_processed(id).unwrap(), 8);
    }

    #[test]
    fn test_destroyed_handle_is_invalid() {
        let session = Session::default();
        let id = session.create_buffer(2, 128, BufferUsage::Streaming).unwrap();
        assert_eq!(session.buffer_count(), 1);

        assert!(session.destroy_buffer(id));
        assert!(!session.destroy_buffer(id));
        assert_eq!(session.buffer_count(), 0);
        assert_eq!(session.play(id), Err(EngineError::InvalidHandle));
        assert!(!session.is_playing(id));
    }

    #[test]
    fn test_failed_allocation_registers_nothing() {
        let session = Session::default();
        let err = session
            .create_buffer(2, usize::MAX / 4, BufferUsage::Static)
            .unwrap_err();
        assert!(matches!(err, EngineError::AllocationFailure { .. }));
        assert_eq!(session.buffer_count(), 0);
    }

    #[test]
    fn test_sessions_are_independent() {
        let a = Session::new(44100);
        let b = Session::new(48000);
        a.create_buffer(2, 16, BufferUsage::Streaming).unwrap();
        a.set_master_volume(0.25);

        assert_eq!(b.buffer_count(), 0);
        assert_eq!(b.master_volume(), 1.0);
        assert_eq!(b.sample_rate(), 48000);
    }

    #[test]
    fn test_mix_from_another_thread() {
        let session = Session::default();
        let id = session
            .create_static_buffer(2, &vec![StereoSample::mono(0.5); 4096])
            .unwrap();
        session.play(id).unwrap();

        let device = session.clone();
        let worker = std::thread::spawn(move || {
            let mut out = vec![StereoSample::silence(); 256];
            for _ in 0..8 {
                device.mix(&mut out);
            }
        });
        for _ in 0..100 {
            let _ = session.set_volume(id, 0.8);
            let _ = session.frames_processed(id);
        }
        worker.join().unwrap();

        let stats = session.stats();
        assert_eq!(stats.cycles(), 8);
        let processed = session.frames_processed(id).unwrap();
        assert!(processed <= 8 * 256);
    }

    #[test]
    fn test_clear_releases_all() {
        let session = Session::default();
        for _ in 0..3 {
            session.create_buffer(2, 32, BufferUsage::Streaming).unwrap();
        }
        session.clear();
        assert_eq!(session.buffer_count(), 0);
    }
}

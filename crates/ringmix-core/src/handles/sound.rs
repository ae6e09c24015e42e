//! Sound - a fully resident one-shot clip

use std::path::Path;

use crate::engine::{BufferId, PlaybackState, Session};
use crate::wave::Wave;

use super::{log_stale, LoadError};

/// A static buffer holding a whole clip at the device rate
pub struct Sound {
    session: Session,
    id: BufferId,
    /// Channel count of the decoded file
    channels: u16,
    /// Frames at the device rate
    frame_count: u64,
}

impl Sound {
    /// Decode a file into a new sound
    pub fn load(session: &Session, path: &Path) -> Result<Self, LoadError> {
        let wave = Wave::load(path)?;
        Self::from_wave(session, &wave)
    }

    /// Build a sound from decoded PCM, resampling to the device rate if needed
    pub fn from_wave(session: &Session, wave: &Wave) -> Result<Self, LoadError> {
        if !wave.is_valid() {
            return Err(LoadError::InvalidWave);
        }

        let device_rate = session.sample_rate();
        let frames = if wave.sample_rate == device_rate {
            wave.to_stereo_frames()
        } else {
            log::debug!("Resampling sound {}Hz -> {}Hz", wave.sample_rate, device_rate);
            wave.resampled(device_rate)?.to_stereo_frames()
        };
        if frames.is_empty() {
            return Err(LoadError::InvalidWave);
        }

        let id = session.create_static_buffer(wave.channels, &frames)?;
        Ok(Self {
            session: session.clone(),
            id,
            channels: wave.channels,
            frame_count: frames.len() as u64,
        })
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.session.sample_rate()
    }

    /// Length in seconds
    pub fn time_length(&self) -> f32 {
        self.frame_count as f32 / self.session.sample_rate() as f32
    }

    /// Start from the top (restarts if already playing)
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
}

impl Drop for Sound {
    fn drop(&mut self) {
        self.session.destroy_buffer(self.id);
    }
}

impl std::fmt::Debug for Sound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sound")
            .field("id", &self.id)
            .field("channels", &self.channels)
            .field("frame_count", &self.frame_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::write_ramp_wav;
    use crate::types::StereoSample;

    #[test]
    fn test_sound_plays_once() {
        let session = Session::new(44100);
        let wave = Wave::from_samples(vec![0.5; 6], 1, 44100);
        let sound = Sound::from_wave(&session, &wave).unwrap();
        assert_eq!(sound.frame_count(), 6);

        sound.play();
        let mut out = vec![StereoSample::silence(); 8];
        session.mix(&mut out);

        assert!(out[..6].iter().all(|f| f.left > 0.0));
        assert_eq!(out[6], StereoSample::silence());
        assert!(!sound.is_playing());
    }

    #[test]
    fn test_sound_resampled_to_device_rate() {
        let session = Session::new(44100);
        let wave = Wave::from_samples(vec![0.25; 2205], 1, 22050);
        let sound = Sound::from_wave(&session, &wave).unwrap();
        assert_eq!(sound.frame_count(), 4410);
        assert!((sound.time_length() - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_sound_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("click.wav");
        write_ramp_wav(&path, 441, 2, 44100);

        let session = Session::new(44100);
        let sound = Sound::load(&session, &path).unwrap();
        assert_eq!(sound.channels(), 2);
        assert_eq!(sound.frame_count(), 441);
        assert_eq!(session.buffer_count(), 1);
    }

    #[test]
    fn test_invalid_wave_rejected() {
        let session = Session::new(44100);
        let result = Sound::from_wave(&session, &Wave::default());
        assert!(matches!(result, Err(LoadError::InvalidWave)));
        assert_eq!(session.buffer_count(), 0);
    }

    #[test]
    fn test_drop_destroys_buffer() {
        let session = Session::new(44100);
        let wave = Wave::from_samples(vec![0.5; 4], 1, 44100);
        let sound = Sound::from_wave(&session, &wave).unwrap();
        assert_eq!(session.buffer_count(), 1);
        drop(sound);
        assert_eq!(session.buffer_count(), 0);
    }

    #[test]
    fn test_controls_after_clear_are_ignored() {
        let session = Session::new(44100);
        let wave = Wave::from_samples(vec![0.5; 4], 1, 44100);
        let sound = Sound::from_wave(&session, &wave).unwrap();
        session.clear();

        sound.play();
        assert!(!sound.is_playing());
        assert_eq!(sound.state(), PlaybackState::Stopped);
    }
}

//! Audio library - name-keyed sounds and music for the host application
//!
//! Wraps the handles behind string names so game code can say
//! `library.play_sound("don", Some("hitsound"))`. Unknown names are logged and
//! ignored rather than treated as errors.
//!
//! # Directory layout
//!
//! [`AudioLibrary::load_sound_dir`] loads every file in a directory under its
//! file stem, and every file one level down as `<dir>_<stem>`:
//!
//! ```text
//! sounds/title/
//! ├── bgm.ogg          -> "bgm"
//! └── voice/
//!     └── welcome.wav  -> "voice_welcome"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::config::AudioSettings;
use crate::engine::Session;
use crate::handles::{LoadError, Music, Sound};

/// Directory shared by every screen in [`AudioLibrary::load_screen_sounds`]
pub const GLOBAL_SOUND_DIR: &str = "global";

/// Named sounds and music streams on one session
pub struct AudioLibrary {
    session: Session,
    sounds: HashMap<String, Sound>,
    music: HashMap<String, Music>,
    volume_presets: BTreeMap<String, f32>,
    /// Ring size for newly loaded music
    stream_ring_frames: usize,
}

impl AudioLibrary {
    /// Empty library with default presets
    pub fn new(session: &Session) -> Self {
        let defaults = AudioSettings::default();
        Self {
            session: session.clone(),
            sounds: HashMap::new(),
            music: HashMap::new(),
            volume_presets: defaults.volume_presets,
            stream_ring_frames: session.sample_rate() as usize,
        }
    }

    /// Library configured from a settings file; also applies master volume
    pub fn from_settings(session: &Session, settings: &AudioSettings) -> Self {
        session.set_master_volume(settings.master_volume());
        Self {
            session: session.clone(),
            sounds: HashMap::new(),
            music: HashMap::new(),
            volume_presets: settings.volume_presets.clone(),
            stream_ring_frames: settings.stream_ring_frames(session.sample_rate()),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn master_volume(&self) -> f32 {
        self.session.master_volume()
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.session.set_master_volume(volume);
    }

    pub fn volume_preset(&self, preset: &str) -> Option<f32> {
        self.volume_presets.get(preset).copied()
    }

    pub fn set_volume_preset(&mut self, preset: &str, volume: f32) {
        self.volume_presets.insert(preset.to_string(), volume);
    }

    fn preset_volume(&self, preset: Option<&str>) -> Option<f32> {
        let preset = preset?;
        let volume = self.volume_preset(preset);
        if volume.is_none() {
            log::warn!("Volume preset {} not found", preset);
        }
        volume
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sounds
    // ─────────────────────────────────────────────────────────────────────────

    /// Load a file as `name`, replacing any sound already under that name
    pub fn load_sound(&mut self, path: &Path, name: &str) -> Result<(), LoadError> {
        match Sound::load(&self.session, path) {
            Ok(sound) => {
                log::debug!("Loaded sound {:?} as {}", path, name);
                self.sounds.insert(name.to_string(), sound);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load sound {:?}: {}", path, e);
                Err(e)
            }
        }
    }

    pub fn unload_sound(&mut self, name: &str) -> bool {
        if self.sounds.remove(name).is_some() {
            true
        } else {
            log::warn!("Sound {} not found", name);
            false
        }
    }

    /// Load a directory of sounds (see the module docs for naming)
    ///
    /// Files that fail to decode are logged and skipped. Returns the number
    /// of sounds loaded.
    pub fn load_sound_dir(&mut self, dir: &Path) -> usize {
        let entries = match sorted_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Sounds in {:?} not found: {}", dir, e);
                return 0;
            }
        };

        let mut loaded = 0;
        for entry in entries {
            let stem = file_stem(&entry);
            if entry.is_dir() {
                let Ok(files) = sorted_entries(&entry) else { continue };
                for file in files.iter().filter(|f| f.is_file()) {
                    let name = format!("{}_{}", stem, file_stem(file));
                    loaded += usize::from(self.load_sound(file, &name).is_ok());
                }
            } else if entry.is_file() {
                loaded += usize::from(self.load_sound(&entry, &stem).is_ok());
            }
        }

        log::info!("Loaded {} sounds from {:?}", loaded, dir);
        loaded
    }

    /// Load `<root>/<screen>` followed by `<root>/global`
    pub fn load_screen_sounds(&mut self, root: &Path, screen: &str) -> usize {
        let screen_dir = root.join(screen);
        if !screen_dir.is_dir() {
            log::warn!("Sounds for {} not found", screen);
            return 0;
        }
        self.load_sound_dir(&screen_dir) + self.load_sound_dir(&root.join(GLOBAL_SOUND_DIR))
    }

    pub fn unload_all_sounds(&mut self) {
        let count = self.sounds.len();
        self.sounds.clear();
        log::debug!("Unloaded {} sounds", count);
    }

    pub fn sound(&self, name: &str) -> Option<&Sound> {
        self.sounds.get(name)
    }

    pub fn sound_count(&self) -> usize {
        self.sounds.len()
    }

    fn named_sound(&self, name: &str) -> Option<&Sound> {
        let sound = self.sounds.get(name);
        if sound.is_none() {
            log::warn!("Sound {} not found", name);
        }
        sound
    }

    /// Play from the top, applying a volume preset first if given
    pub fn play_sound(&self, name: &str, preset: Option<&str>) {
        let Some(sound) = self.named_sound(name) else { return };
        if let Some(volume) = self.preset_volume(preset) {
            sound.set_volume(volume);
        }
        sound.play();
    }

    pub fn stop_sound(&self, name: &str) {
        if let Some(sound) = self.named_sound(name) {
            sound.stop();
        }
    }

    pub fn is_sound_playing(&self, name: &str) -> bool {
        self.named_sound(name).map(Sound::is_playing).unwrap_or(false)
    }

    pub fn set_sound_volume(&self, name: &str, volume: f32) {
        if let Some(sound) = self.named_sound(name) {
            sound.set_volume(volume);
        }
    }

    pub fn set_sound_pan(&self, name: &str, pan: f32) {
        if let Some(sound) = self.named_sound(name) {
            sound.set_pan(pan);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Music
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a music file as `name`, replacing any stream already under that name
    pub fn load_music(&mut self, path: &Path, name: &str) -> Result<(), LoadError> {
        match Music::load_with_ring(&self.session, path, self.stream_ring_frames) {
            Ok(music) => {
                log::info!("Loaded music stream from {:?} as {}", path, name);
                self.music.insert(name.to_string(), music);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load music {:?}: {}", path, e);
                Err(e)
            }
        }
    }

    pub fn music(&self, name: &str) -> Option<&Music> {
        self.music.get(name)
    }

    pub fn music_mut(&mut self, name: &str) -> Option<&mut Music> {
        self.music.get_mut(name)
    }

    pub fn music_count(&self) -> usize {
        self.music.len()
    }

    fn named_music(&mut self, name: &str) -> Option<&mut Music> {
        let music = self.music.get_mut(name);
        if music.is_none() {
            log::warn!("Music stream {} not found", name);
        }
        music
    }

    /// Rewind, apply a volume preset if given, prime the ring and play
    pub fn play_music(&mut self, name: &str, preset: Option<&str>) {
        let volume = self.preset_volume(preset);
        let Some(music) = self.named_music(name) else { return };

        if let Err(e) = music.seek(0.0) {
            log::warn!("Failed to rewind music {}: {}", name, e);
        }
        if let Some(volume) = volume {
            music.set_volume(volume);
        }
        music.update();
        music.play();
    }

    /// Refill one stream
    pub fn update_music(&mut self, name: &str) {
        if let Some(music) = self.named_music(name) {
            music.update();
        }
    }

    /// Refill every loaded stream
    pub fn update_all_music(&mut self) {
        for music in self.music.values_mut() {
            music.update();
        }
    }

    pub fn music_time_length(&mut self, name: &str) -> f32 {
        self.named_music(name).map(|m| m.time_length()).unwrap_or(0.0)
    }

    pub fn music_time_played(&mut self, name: &str) -> f32 {
        self.named_music(name).map(|m| m.time_played()).unwrap_or(0.0)
    }

    pub fn set_music_volume(&mut self, name: &str, volume: f32) {
        if let Some(music) = self.named_music(name) {
            music.set_volume(volume);
        }
    }

    pub fn set_music_pan(&mut self, name: &str, pan: f32) {
        if let Some(music) = self.named_music(name) {
            music.set_pan(pan);
        }
    }

    pub fn is_music_playing(&mut self, name: &str) -> bool {
        self.named_music(name).map(|m| m.is_playing()).unwrap_or(false)
    }

    pub fn stop_music(&mut self, name: &str) {
        if let Some(music) = self.named_music(name) {
            music.stop();
        }
    }

    pub fn seek_music(&mut self, name: &str, seconds: f32) {
        if let Some(music) = self.named_music(name) {
            if let Err(e) = music.seek(seconds) {
                log::warn!("Failed to seek music {}: {}", name, e);
            }
        }
    }

    pub fn unload_music(&mut self, name: &str) -> bool {
        if self.music.remove(name).is_some() {
            true
        } else {
            log::warn!("Music stream {} not found", name);
            false
        }
    }

    pub fn unload_all_music(&mut self) {
        let count = self.music.len();
        self.music.clear();
        log::debug!("Unloaded {} music streams", count);
    }
}

impl std::fmt::Debug for AudioLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioLibrary")
            .field("sounds", &self.sounds.len())
            .field("music", &self.music.len())
            .field("volume_presets", &self.volume_presets)
            .finish()
    }
}

/// Directory entries in name order
fn sorted_entries(dir: &Path) -> std::io::Result<Vec<std::path::PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::write_ramp_wav;

    fn sound_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_ramp_wav(&dir.path().join("title").join("don.wav"), 100, 1, 44100);
        write_ramp_wav(&dir.path().join("title").join("voice").join("welcome.wav"), 100, 2, 44100);
        std::fs::write(dir.path().join("title").join("notes.txt"), "not audio").unwrap();
        write_ramp_wav(&dir.path().join("global").join("cancel.wav"), 50, 1, 22050);
        dir
    }

    #[test]
    fn test_load_sound_dir_names() {
        let dir = sound_dir();
        let session = Session::new(44100);
        let mut library = AudioLibrary::new(&session);

        let loaded = library.load_sound_dir(&dir.path().join("title"));
        assert_eq!(loaded, 2);
        assert!(library.sound("don").is_some());
        assert!(library.sound("voice_welcome").is_some());
        assert!(library.sound("notes").is_none());
    }

    #[test]
    fn test_load_screen_sounds_includes_global() {
        let dir = sound_dir();
        let session = Session::new(44100);
        let mut library = AudioLibrary::new(&session);

        assert_eq!(library.load_screen_sounds(dir.path(), "title"), 3);
        assert!(library.sound("cancel").is_some());
        assert_eq!(library.load_screen_sounds(dir.path(), "missing"), 0);
    }

    #[test]
    fn test_play_sound_applies_preset() {
        let dir = sound_dir();
        let session = Session::new(44100);
        let mut library = AudioLibrary::new(&session);
        library.set_volume_preset("hitsound", 0.4);
        library
            .load_sound(&dir.path().join("title").join("don.wav"), "don")
            .unwrap();

        library.play_sound("don", Some("hitsound"));
        assert!(library.is_sound_playing("don"));
        let id = library.sound("don").unwrap().id();
        let volume = session.with_buffer(id, |b| b.volume()).unwrap();
        assert!((volume - 0.4).abs() < 1e-6);

        library.stop_sound("don");
        assert!(!library.is_sound_playing("don"));
    }

    #[test]
    fn test_unknown_names_are_ignored() {
        let session = Session::new(44100);
        let mut library = AudioLibrary::new(&session);
        library.play_sound("missing", Some("sound"));
        library.play_music("missing", None);
        assert!(!library.is_sound_playing("missing"));
        assert_eq!(library.music_time_length("missing"), 0.0);
        assert!(!library.unload_sound("missing"));
        assert!(!library.unload_music("missing"));
    }

    #[test]
    fn test_unload_releases_buffers() {
        let dir = sound_dir();
        let session = Session::new(44100);
        let mut library = AudioLibrary::new(&session);
        library.load_screen_sounds(dir.path(), "title");
        assert_eq!(session.buffer_count(), 3);

        assert!(library.unload_sound("don"));
        assert_eq!(session.buffer_count(), 2);
        library.unload_all_sounds();
        assert_eq!(session.buffer_count(), 0);
    }

    #[test]
    fn test_music_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.wav");
        write_ramp_wav(&path, 4410, 2, 44100);

        let session = Session::new(44100);
        let mut settings = AudioSettings::default();
        settings.stream_buffer_frames = Some(1024);
        settings.volume_presets.insert("music".to_string(), 0.5);
        let mut library = AudioLibrary::from_settings(&session, &settings);
        assert_eq!(library.master_volume(), 0.75);

        library.load_music(&path, "song").unwrap();
        assert!((library.music_time_length("song") - 0.1).abs() < 1e-6);

        library.play_music("song", Some("music"));
        assert!(library.is_music_playing("song"));

        let mut out = vec![crate::types::StereoSample::silence(); 441];
        session.mix(&mut out);
        library.update_all_music();
        assert!((library.music_time_played("song") - 0.01).abs() < 1e-6);

        library.seek_music("song", 0.05);
        assert!((library.music_time_played("song") - 0.05).abs() < 1e-6);

        library.stop_music("song");
        assert!(!library.is_music_playing("song"));
        library.unload_all_music();
        assert_eq!(session.buffer_count(), 0);
    }

    #[test]
    fn test_missing_music_file() {
        let session = Session::new(44100);
        let mut library = AudioLibrary::new(&session);
        assert!(library
            .load_music(Path::new("/nonexistent/song.ogg"), "song")
            .is_err());
        assert_eq!(library.music_count(), 0);
    }
}

//! Standard locations for ringmix configuration

use std::path::PathBuf;

/// Name of the audio settings file
pub const AUDIO_CONFIG_FILE: &str = "audio.yaml";

/// Per-user config directory
///
/// Returns: `<platform config dir>/ringmix` (e.g. `~/.config/ringmix`),
/// or `./ringmix` when the platform has none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ringmix")
}

/// Path of a config file inside [`default_config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_app_name() {
        assert!(default_config_dir().ends_with("ringmix"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path(AUDIO_CONFIG_FILE);
        assert!(path.ends_with("ringmix/audio.yaml"));
    }
}

//! Configuration for ringmix
//!
//! - Generic YAML config loading/saving
//! - Standard config paths
//! - The audio settings file
//!
//! # Usage
//!
//! ```ignore
//! use ringmix_core::config::{load_config, save_config, AudioSettings};
//!
//! let path = AudioSettings::default_path();
//! let settings: AudioSettings = load_config(&path);
//! save_config(&settings, &path)?;
//! ```

mod io;
mod paths;
mod settings;

pub use io::{load_config, read_config, save_config};
pub use paths::{default_config_dir, default_config_path, AUDIO_CONFIG_FILE};
pub use settings::{AudioSettings, DEFAULT_MASTER_VOLUME, DEFAULT_VOLUME_PRESETS};

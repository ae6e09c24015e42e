//! ringmix-play - play a music file through the default output
//!
//! Opens the configured device, streams the music file and fires any extra
//! sound files once at startup. Runs until the music ends.
//!
//! ## Command line
//!
//! ```text
//! ringmix-play <music> [sound ...] [--config <path>] [--volume <0..1>] [--loop] [--list-devices]
//! ```
//!
//! Set RUST_LOG=debug for refill detail.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use ringmix_core::audio::{list_output_devices, start_output};
use ringmix_core::config::{load_config, AudioSettings};
use ringmix_core::AudioLibrary;

/// Refill cadence (well inside one sub-buffer at any sane ring size)
const UPDATE_INTERVAL: Duration = Duration::from_millis(10);

const MUSIC_NAME: &str = "music";

#[derive(Debug, Default)]
struct Args {
    music: Option<PathBuf>,
    sounds: Vec<PathBuf>,
    config: Option<PathBuf>,
    volume: Option<f32>,
    looping: bool,
    list_devices: bool,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.peekable();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--volume" => {
                let value = args.next().context("--volume needs a value")?;
                let volume: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid volume: {}", value))?;
                parsed.volume = Some(volume);
            }
            "--loop" => parsed.looping = true,
            "--list-devices" => parsed.list_devices = true,
            flag if flag.starts_with("--") => bail!("Unknown flag: {}", flag),
            path if parsed.music.is_none() => parsed.music = Some(PathBuf::from(path)),
            path => parsed.sounds.push(PathBuf::from(path)),
        }
    }

    Ok(parsed)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    if args.list_devices {
        for device in list_output_devices()? {
            println!("{}  {:?}Hz  {}ch", device, device.sample_rates, device.max_channels);
        }
        return Ok(());
    }

    let Some(music_path) = args.music.clone() else {
        bail!("Usage: ringmix-play <music> [sound ...] [--config <path>] [--volume <0..1>] [--loop]");
    };

    let config_path = args.config.clone().unwrap_or_else(AudioSettings::default_path);
    let mut settings: AudioSettings = load_config(&config_path);
    if let Some(volume) = args.volume {
        settings.master_volume = volume;
    }

    let output = start_output(&settings.audio_config()).context("Failed to open audio output")?;
    log::info!(
        "Playing on {} ({}Hz, {} frames, ~{:.1}ms)",
        output.device_name(),
        output.sample_rate(),
        output.buffer_size(),
        output.latency_ms()
    );

    let mut library = AudioLibrary::from_settings(output.session(), &settings);
    library
        .load_music(&music_path, MUSIC_NAME)
        .with_context(|| format!("Failed to load {:?}", music_path))?;
    if let Some(music) = library.music_mut(MUSIC_NAME) {
        music.set_looping(args.looping);
    }

    for (i, path) in args.sounds.iter().enumerate() {
        let name = format!("sound_{}", i);
        if library.load_sound(path, &name).is_ok() {
            library.play_sound(&name, Some("sound"));
        }
    }

    library.play_music(MUSIC_NAME, Some("music"));
    let length = library.music_time_length(MUSIC_NAME);
    println!("Playing {:?} ({:.1}s)", music_path, length);

    let mut last_second = 0;
    loop {
        library.update_all_music();

        let finished = library.music(MUSIC_NAME).map(|m| m.is_finished()).unwrap_or(true);
        if finished || !library.is_music_playing(MUSIC_NAME) {
            break;
        }

        let played = library.music_time_played(MUSIC_NAME);
        if played as u32 > last_second {
            last_second = played as u32;
            let stats = output.session().stats();
            log::debug!(
                "{:.1}s / {:.1}s (cycles {}, skipped {}, underruns {})",
                played,
                length,
                stats.cycles(),
                stats.skipped_cycles(),
                stats.underrun_segments()
            );
        }

        thread::sleep(UPDATE_INTERVAL);
    }

    library.unload_all_music();
    library.unload_all_sounds();
    println!("Done");
    Ok(())
}

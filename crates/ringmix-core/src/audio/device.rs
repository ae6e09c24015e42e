//! Output device discovery
//!
//! Devices are gathered from every host cpal can open, so a config can name a
//! device on a non-default host (e.g. an ALSA card while PulseAudio is the
//! default).

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::HostId;

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Rates probed when describing a device
const PROBE_SAMPLE_RATES: [u32; 6] = [22050, 32000, 44100, 48000, 88200, 96000];

/// Display name for a host
fn host_label(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

/// One output device and what it can do
#[derive(Debug, Clone)]
pub struct OutputDevice {
    pub id: DeviceId,
    pub is_default: bool,
    /// Probed rates the device accepts
    pub sample_rates: Vec<u32>,
    pub max_channels: u16,
}

impl std::fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id.display_label())?;
        if self.is_default {
            write!(f, " (default)")?;
        }
        Ok(())
    }
}

/// Every output device on every host, defaults first
pub fn list_output_devices() -> AudioResult<Vec<OutputDevice>> {
    let mut devices = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(host) => host,
            Err(e) => {
                log::debug!("Skipping host {:?}: {}", host_id, e);
                continue;
            }
        };
        let label = host_label(host_id);
        let default_name = host.default_output_device().and_then(|d| d.name().ok());

        let outputs = match host.output_devices() {
            Ok(outputs) => outputs,
            Err(e) => {
                log::debug!("Could not enumerate {} devices: {}", label, e);
                continue;
            }
        };

        for device in outputs {
            let Ok(name) = device.name() else { continue };
            let Ok(configs) = device.supported_output_configs() else { continue };

            let mut sample_rates = Vec::new();
            let mut max_channels = 0u16;
            for range in configs {
                max_channels = max_channels.max(range.channels());
                for rate in PROBE_SAMPLE_RATES {
                    if (range.min_sample_rate().0..=range.max_sample_rate().0).contains(&rate)
                        && !sample_rates.contains(&rate)
                    {
                        sample_rates.push(rate);
                    }
                }
            }
            if max_channels == 0 {
                continue;
            }
            sample_rates.sort_unstable();

            devices.push(OutputDevice {
                is_default: default_name.as_deref() == Some(name.as_str()),
                id: DeviceId::with_host(&name, &label),
                sample_rates,
                max_channels,
            });
        }
    }

    if devices.is_empty() {
        return Err(AudioError::NoDevices);
    }

    devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.id.host.cmp(&b.id.host))
            .then_with(|| a.id.name.cmp(&b.id.name))
    });
    log::info!("Found {} audio output devices", devices.len());
    Ok(devices)
}

/// Open the configured device, or the default one
pub fn open_output_device(id: Option<&DeviceId>) -> AudioResult<cpal::Device> {
    match id {
        Some(id) => find_device(id),
        None => cpal::default_host()
            .default_output_device()
            .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string())),
    }
}

/// Look a device up by name, on its host when one is given
fn find_device(id: &DeviceId) -> AudioResult<cpal::Device> {
    let hosts: Vec<HostId> = match &id.host {
        Some(wanted) => cpal::available_hosts()
            .into_iter()
            .filter(|h| &host_label(*h) == wanted)
            .collect(),
        None => cpal::available_hosts(),
    };

    for host_id in hosts {
        let Ok(host) = cpal::host_from_id(host_id) else { continue };
        let Ok(mut outputs) = host.output_devices() else { continue };
        if let Some(device) = outputs.find(|d| d.name().ok().as_deref() == Some(id.name.as_str())) {
            return Ok(device);
        }
    }

    Err(AudioError::DeviceNotFound(id.display_label()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_host_label() {
        assert_eq!(host_label(HostId::Alsa), "ALSA");
    }

    #[test]
    fn test_device_enumeration() {
        // Machines without audio hardware report NoDevices
        match list_output_devices() {
            Ok(devices) => {
                for device in &devices {
                    println!("  - {} {:?}", device, device.sample_rates);
                }
                assert!(devices.iter().all(|d| d.max_channels > 0));
            }
            Err(e) => println!("No devices: {}", e),
        }
    }

    #[test]
    fn test_unknown_device_not_found() {
        let id = DeviceId::new("ringmix-test-device-that-does-not-exist");
        assert!(matches!(
            find_device(&id),
            Err(AudioError::DeviceNotFound(_))
        ));
    }
}

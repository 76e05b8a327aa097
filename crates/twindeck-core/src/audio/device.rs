//! Audio device enumeration
//!
//! Lists output devices from every available cpal host so a device can be
//! picked by name (and optionally host) in the config file.

use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Host, HostId};

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Sample rates reported for each device when they fall in a supported range
const COMMON_RATES: [u32; 6] = [44_100, 48_000, 88_200, 96_000, 176_400, 192_000];

/// Get a human-readable name for a host ID
fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

/// Get a host by its display name
fn host_by_name(name: &str) -> Option<Host> {
    cpal::available_hosts()
        .into_iter()
        .find(|&id| host_name(id) == name)
        .and_then(|id| cpal::host_from_id(id).ok())
}

/// Information about an audio output device
#[derive(Debug, Clone)]
pub struct OutputDevice {
    /// Identifier to put in the config file
    pub id: DeviceId,
    /// Whether this is the default device of its host
    pub is_default: bool,
    /// Common sample rates the device supports
    pub sample_rates: Vec<u32>,
    /// Maximum output channels
    pub max_channels: u16,
}

impl fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} ({} ch, {:?} Hz)",
            self.id.display_label(),
            if self.is_default { " *" } else { "" },
            self.max_channels,
            self.sample_rates
        )
    }
}

/// Enumerate output devices from all hosts
///
/// Default devices come first, then devices sorted by host and name.
pub fn get_output_devices() -> AudioResult<Vec<OutputDevice>> {
    let mut devices = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("Could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };
        let host_label = host_name(host_id);
        let default_name = host.default_output_device().and_then(|d| d.name().ok());

        let iter = match host.output_devices() {
            Ok(d) => d,
            Err(e) => {
                log::debug!("Could not enumerate devices for {:?}: {}", host_id, e);
                continue;
            }
        };

        for device in iter {
            let Ok(name) = device.name() else { continue };
            let Ok(configs) = device.supported_output_configs() else {
                continue;
            };
            let configs: Vec<_> = configs.collect();
            if configs.is_empty() {
                continue;
            }

            let max_channels = configs.iter().map(|c| c.channels()).max().unwrap_or(0);
            let sample_rates = COMMON_RATES
                .into_iter()
                .filter(|&rate| {
                    configs.iter().any(|c| {
                        rate >= c.min_sample_rate().0 && rate <= c.max_sample_rate().0
                    })
                })
                .collect();

            devices.push(OutputDevice {
                is_default: default_name.as_deref() == Some(name.as_str()),
                id: DeviceId::with_host(&name, &host_label),
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

    log::info!("Enumerated {} audio output devices", devices.len());
    Ok(devices)
}

/// Find a device by its ID
///
/// Uses the host named in the ID if there is one, otherwise searches every
/// available host.
pub fn find_device_by_id(id: &DeviceId) -> AudioResult<cpal::Device> {
    let matches = |d: &cpal::Device| d.name().ok().as_deref() == Some(id.name.as_str());

    if let Some(host) = id.host.as_deref().and_then(host_by_name) {
        return host
            .output_devices()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .find(matches)
            .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()));
    }

    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else {
            continue;
        };
        if let Some(device) = host.output_devices().ok().and_then(|mut d| d.find(matches)) {
            return Ok(device);
        }
    }

    Err(AudioError::DeviceNotFound(id.display_label()))
}

/// The default output device of the default host
pub fn default_output_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_enumeration() {
        // No audio hardware is expected in CI; this only checks nothing panics
        match get_output_devices() {
            Ok(devices) => {
                for device in &devices {
                    println!("  - {}", device);
                }
            }
            Err(AudioError::NoDevices) => println!("No audio devices available"),
            Err(e) => println!("Error enumerating devices: {}", e),
        }
    }

    #[test]
    fn test_unknown_device_is_not_found() {
        let id = DeviceId::new("twindeck-no-such-device");
        assert!(find_device_by_id(&id).is_err());
    }
}

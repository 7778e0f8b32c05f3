//! Output device enumeration
//!
//! Devices are listed from every available cpal host, so a system running
//! both JACK and ALSA shows both.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Host, HostId};

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

fn host_by_name(name: &str) -> Option<Host> {
    cpal::available_hosts()
        .into_iter()
        .find(|id| host_name(*id) == name)
        .and_then(|id| cpal::host_from_id(id).ok())
}

/// An output device and what it can do
#[derive(Debug, Clone)]
pub struct AudioDevice {
    pub id: DeviceId,
    pub name: String,
    /// Host backend name (e.g. "ALSA", "CoreAudio")
    pub host: String,
    /// Default device of its host
    pub is_default: bool,
    pub max_channels: u16,
    /// Rate the device opens at when not told otherwise
    pub default_sample_rate: Option<u32>,
    /// Rate ranges of the f32 configs with two or more channels
    pub supported_rates: Vec<(u32, u32)>,
}

impl AudioDevice {
    pub fn supports_rate(&self, rate: u32) -> bool {
        self.supported_rates
            .iter()
            .any(|&(min, max)| rate >= min && rate <= max)
    }
}

impl std::fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.host, self.name)?;
        if self.is_default {
            write!(f, " (default)")?;
        }
        write!(f, " - {} ch", self.max_channels)?;
        if let Some(rate) = self.default_sample_rate {
            write!(f, ", {}Hz", rate)?;
        }
        Ok(())
    }
}

/// Every output device on every host, defaults first
pub fn output_devices() -> AudioResult<Vec<AudioDevice>> {
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
            let Ok(name) = device.name() else {
                continue;
            };
            let Ok(configs) = device.supported_output_configs() else {
                continue;
            };
            let configs: Vec<_> = configs.collect();
            if configs.is_empty() {
                continue;
            }

            let max_channels = configs.iter().map(|c| c.channels()).max().unwrap_or(0);
            let supported_rates = configs
                .iter()
                .filter(|c| c.sample_format() == cpal::SampleFormat::F32 && c.channels() >= 2)
                .map(|c| (c.min_sample_rate().0, c.max_sample_rate().0))
                .collect();
            let default_sample_rate = device
                .default_output_config()
                .ok()
                .map(|c| c.sample_rate().0);

            devices.push(AudioDevice {
                id: DeviceId::with_host(&name, &host_label),
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                host: host_label.clone(),
                max_channels,
                default_sample_rate,
                supported_rates,
            });
        }
    }

    if devices.is_empty() {
        return Err(AudioError::NoDevices);
    }

    devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.host.cmp(&b.host))
            .then_with(|| a.name.cmp(&b.name))
    });

    log::info!("Enumerated {} audio output devices", devices.len());
    Ok(devices)
}

/// Resolve a configured device id to a cpal device
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
        if let Ok(mut devices) = host.output_devices() {
            if let Some(device) = devices.find(matches) {
                return Ok(device);
            }
        }
    }

    Err(AudioError::DeviceNotFound(id.display_label()))
}

/// Default output device of the default host
pub fn default_output_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string()))
}

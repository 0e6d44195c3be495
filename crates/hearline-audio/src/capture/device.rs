use std::fmt;

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

/// A capture (input) device. The name "default" resolves to the host's
/// default input device at open time.
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Debug)]
pub struct AudioDevice {
    pub name: String,
}

impl AudioDevice {
    pub fn new(name: String) -> Self {
        AudioDevice { name }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("device name cannot be empty"));
        }
        Ok(AudioDevice::new(trimmed.to_string()))
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

pub fn list_audio_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let mut devices = vec![AudioDevice::new("default".to_string())];

    for device in host.input_devices()? {
        if let Ok(name) = device.name() {
            if !devices.iter().any(|d| d.name == name) {
                devices.push(AudioDevice::new(name));
            }
        }
    }

    Ok(devices)
}

pub fn default_input_device() -> Result<AudioDevice> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no default input device detected"))?;
    Ok(AudioDevice::new(device.name()?))
}

pub(crate) fn get_cpal_device_and_config(
    audio_device: &AudioDevice,
) -> Result<(cpal::Device, cpal::SupportedStreamConfig)> {
    let host = cpal::default_host();

    let cpal_device = if audio_device.name == "default" {
        host.default_input_device()
    } else {
        host.input_devices()?
            .find(|d| d.name().map(|n| n == audio_device.name).unwrap_or(false))
    }
    .ok_or_else(|| anyhow!("audio device not found: {}", audio_device.name))?;

    let config = cpal_device
        .supported_input_configs()?
        .max_by(|a, b| {
            a.max_sample_rate()
                .0
                .cmp(&b.max_sample_rate().0)
                .then(a.channels().cmp(&b.channels()))
        })
        .ok_or_else(|| anyhow!("no supported input configurations found"))?;

    let config = config.with_sample_rate(config.max_sample_rate());
    Ok((cpal_device, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_rejects_empty_names() {
        assert!(AudioDevice::from_name("   ").is_err());
        assert_eq!(AudioDevice::from_name(" mic ").unwrap().name, "mic");
    }
}

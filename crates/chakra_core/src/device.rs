//! Output Device Enumeration

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// An audio output device the engine could play through
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDevice {
    /// Human-readable device name (cpal has no separate id)
    pub name: String,

    /// Whether this is the system default output
    pub is_default: bool,

    /// Supported sample rates (may be empty if querying failed)
    pub sample_rates: Vec<u32>,

    /// Maximum supported channels
    pub max_channels: u16,
}

impl OutputDevice {
    /// Whether the device can carry a binaural (two channel) signal
    pub fn supports_stereo(&self) -> bool {
        self.max_channels >= 2
    }

    /// Enumerate all output devices on the default host
    pub fn enumerate() -> EngineResult<Vec<OutputDevice>> {
        let host = cpal::default_host();
        let default_name = host.default_output_device().and_then(|d| d.name().ok());

        let devices: Vec<OutputDevice> = host
            .output_devices()
            .map_err(|e| EngineError::AudioUnavailable(e.to_string()))?
            .filter_map(|device| Self::from_cpal_device(&device, default_name.as_deref()).ok())
            .collect();

        if devices.is_empty() {
            return Err(EngineError::NoDevicesFound);
        }
        Ok(devices)
    }

    fn from_cpal_device(device: &cpal::Device, default_name: Option<&str>) -> EngineResult<Self> {
        let name = device
            .name()
            .map_err(|e| EngineError::AudioUnavailable(e.to_string()))?;
        let is_default = default_name == Some(name.as_str());

        let (sample_rates, max_channels) = match device.supported_output_configs() {
            Ok(configs) => extract_config_info(configs),
            Err(_) => (vec![], 2),
        };

        Ok(OutputDevice {
            name,
            is_default,
            sample_rates,
            max_channels,
        })
    }
}

fn extract_config_info(
    configs: impl Iterator<Item = cpal::SupportedStreamConfigRange>,
) -> (Vec<u32>, u16) {
    const COMMON_RATES: [u32; 4] = [44100, 48000, 88200, 96000];

    let mut sample_rates = Vec::new();
    let mut max_channels = 0u16;

    for config in configs {
        max_channels = max_channels.max(config.channels());

        let min = config.min_sample_rate().0;
        let max = config.max_sample_rate().0;
        for &rate in &COMMON_RATES {
            if rate >= min && rate <= max && !sample_rates.contains(&rate) {
                sample_rates.push(rate);
            }
        }
    }

    sample_rates.sort_unstable();
    (sample_rates, max_channels)
}

//! Engine and Stream Configuration
//!
//! Defaults:
//!
//! | setting            | value          |
//! |--------------------|----------------|
//! | audible floor      | 20 Hz          |
//! | base ceiling       | 2000 Hz        |
//! | offset range       | 0.1 - 50 Hz    |
//! | default gain       | 0.3            |
//! | sample rate        | 48000 Hz       |
//! | buffer size        | 512 frames     |
//! | spectrum rate      | 60 fps         |

use serde::{Deserialize, Serialize};

use chakra_dsp::{BinauralParameters, Convention, FrequencyLimits, FrequencyPolicy};

/// Per-channel gain applied on start
pub const DEFAULT_GAIN: f32 = 0.3;

/// Audio stream configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample rate in Hz (e.g., 44100, 48000, 96000)
    pub sample_rate: u32,

    /// Number of output channels; binaural playback needs at least 2
    pub channels: u16,

    /// Buffer size in frames (lower = less retune latency, higher = more stability)
    pub buffer_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            buffer_size: 512,
        }
    }
}

impl StreamConfig {
    /// Latency in milliseconds, also the worst-case delay before a retune is heard
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 192000 {
            return Err(format!("Invalid sample rate: {}", self.sample_rate));
        }
        if self.channels < 2 || self.channels > 8 {
            return Err(format!(
                "Invalid channel count: {} (binaural output needs 2-8)",
                self.channels
            ));
        }
        if self.buffer_size < 32 || self.buffer_size > 8192 {
            return Err(format!("Invalid buffer size: {}", self.buffer_size));
        }
        Ok(())
    }
}

/// Overall engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Stream configuration
    #[serde(default)]
    pub stream: StreamConfig,

    /// Clamping bounds for frequencies and offsets
    #[serde(default)]
    pub limits: FrequencyLimits,

    /// Frequency convention, fixed for the engine's lifetime
    #[serde(default)]
    pub convention: Convention,

    /// Parameters used until the first retune or preset
    #[serde(default)]
    pub initial: BinauralParameters,

    /// Per-channel gain (0.0 - 1.0)
    #[serde(default = "default_gain")]
    pub default_gain: f32,

    /// Spectrum tap update rate
    #[serde(default = "default_spectrum_fps")]
    pub spectrum_fps: u32,

    /// Capacity of the control command queue
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,

    /// Capacity of the event queue; events are dropped when it is full
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_gain() -> f32 {
    DEFAULT_GAIN
}

fn default_spectrum_fps() -> u32 {
    60
}

fn default_command_capacity() -> usize {
    64
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            limits: FrequencyLimits::default(),
            convention: Convention::default(),
            initial: BinauralParameters::default(),
            default_gain: DEFAULT_GAIN,
            spectrum_fps: default_spectrum_fps(),
            command_capacity: default_command_capacity(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl EngineConfig {
    /// Configuration for the carrier ± beat/2 convention
    pub fn carrier_half() -> Self {
        Self {
            convention: Convention::CarrierHalf,
            initial: BinauralParameters::new(200.0, 7.83),
            ..Default::default()
        }
    }

    /// Smaller buffers so slider drags are heard sooner
    pub fn low_latency() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                buffer_size: 128, // ~2.6ms latency
            },
            ..Default::default()
        }
    }

    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| format!("Invalid config JSON: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn policy(&self) -> FrequencyPolicy {
        FrequencyPolicy::new(self.convention, self.limits)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.stream.validate()?;
        self.limits.validate().map_err(|e| e.to_string())?;
        if !(0.0..=1.0).contains(&self.default_gain) {
            return Err(format!("Invalid default gain: {}", self.default_gain));
        }
        if self.spectrum_fps == 0 || self.spectrum_fps > 240 {
            return Err(format!("Invalid spectrum rate: {}", self.spectrum_fps));
        }
        if self.command_capacity == 0 || self.event_capacity == 0 {
            return Err("Queue capacities must be non-zero".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.stream.sample_rate, 48000);
        assert_eq!(config.stream.channels, 2);
        assert_eq!(config.stream.buffer_size, 512);
        assert_eq!(config.default_gain, 0.3);
        assert_eq!(config.convention, Convention::BaseOffset);
        assert_eq!(config.initial, BinauralParameters::new(440.0, 4.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_latency_calculation() {
        let config = StreamConfig {
            sample_rate: 48000,
            channels: 2,
            buffer_size: 480, // Exactly 10ms at 48kHz
        };
        assert!((config.latency_ms() - 10.0).abs() < 0.01);
        assert!(EngineConfig::low_latency().stream.latency_ms() < config.latency_ms());
    }

    #[test]
    fn test_validation() {
        let invalid_rate = StreamConfig {
            sample_rate: 100,
            ..Default::default()
        };
        assert!(invalid_rate.validate().is_err());

        let mono = StreamConfig {
            channels: 1,
            ..Default::default()
        };
        assert!(mono.validate().is_err());

        let invalid_buffer = StreamConfig {
            buffer_size: 10,
            ..Default::default()
        };
        assert!(invalid_buffer.validate().is_err());

        let loud = EngineConfig {
            default_gain: 1.5,
            ..Default::default()
        };
        assert!(loud.validate().is_err());
    }

    #[test]
    fn test_carrier_half_preset() {
        let config = EngineConfig::carrier_half();
        let (l, r) = config.policy().frequencies(config.initial);
        assert!(l < 200.0 && r > 200.0);
        assert!(((r - l) - 7.83).abs() < 1e-3);
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::carrier_half();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized = EngineConfig::from_json(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{ "convention": "carrier_half" }"#).unwrap();
        assert_eq!(config.convention, Convention::CarrierHalf);
        assert_eq!(config.stream, StreamConfig::default());
        assert_eq!(config.default_gain, DEFAULT_GAIN);

        assert!(EngineConfig::from_json(r#"{ "default_gain": 2.0 }"#).is_err());
        assert!(EngineConfig::from_json("not json").is_err());
    }
}

//! Command-line argument parsing.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};

use chakra_core::{Convention, EngineConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "chakrabeats")]
#[command(about = "Binaural beat player tuned to chakra frequencies", long_about = None)]
pub struct Args {
    /// Chakra preset id (root, sacral, solar-plexus, heart, throat, third-eye, crown)
    #[arg(long, value_name = "ID")]
    pub chakra: Option<String>,

    /// Offset preset id (focus, relax, meditate, alert, custom)
    #[arg(long, value_name = "ID")]
    pub offset: Option<String>,

    /// Custom offset in Hz; selects the custom preset
    #[arg(long, value_name = "HZ")]
    pub custom_offset: Option<f32>,

    /// Base (or carrier) frequency in Hz, applied after any preset
    #[arg(long, value_name = "HZ")]
    pub base: Option<f32>,

    /// Beat frequency in Hz, applied after any preset
    #[arg(long, value_name = "HZ")]
    pub beat: Option<f32>,

    /// How base and beat map onto the two channels
    #[arg(long, value_enum)]
    pub convention: Option<ConventionArg>,

    /// Per-channel gain (0.0 - 1.0)
    #[arg(long)]
    pub gain: Option<f32>,

    /// How long to play
    #[arg(long, value_name = "SECONDS", default_value = "30")]
    pub seconds: f32,

    /// Number of spectrum bars per channel
    #[arg(long, default_value = "16")]
    pub bars: usize,

    /// Engine configuration file (JSON)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use small audio buffers so retunes are heard sooner
    #[arg(long)]
    pub low_latency: bool,

    /// Render into memory instead of a sound device
    #[arg(long)]
    pub offline: bool,

    /// Print presets and exit
    #[arg(long)]
    pub list_presets: bool,

    /// Print output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConventionArg {
    /// Left = base, right = base + beat
    BaseOffset,
    /// Left/right = carrier -/+ beat / 2
    CarrierHalf,
}

impl From<ConventionArg> for Convention {
    fn from(arg: ConventionArg) -> Self {
        match arg {
            ConventionArg::BaseOffset => Convention::BaseOffset,
            ConventionArg::CarrierHalf => Convention::CarrierHalf,
        }
    }
}

impl Args {
    /// Build the engine configuration from the config file and flags
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                EngineConfig::from_json(&json).map_err(anyhow::Error::msg)?
            }
            None => match self.convention {
                Some(ConventionArg::CarrierHalf) => EngineConfig::carrier_half(),
                _ => EngineConfig::default(),
            },
        };

        if let Some(convention) = self.convention {
            config.convention = convention.into();
        }
        if self.low_latency {
            config.stream = EngineConfig::low_latency().stream;
        }
        if let Some(gain) = self.gain {
            config.default_gain = gain;
        }

        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Reject flag values that can never be played
    pub fn check(&self) -> anyhow::Result<()> {
        if self.seconds.is_nan() || self.seconds <= 0.0 {
            bail!("--seconds must be positive, got {}", self.seconds);
        }
        if self.bars == 0 {
            bail!("--bars must be at least 1");
        }
        Ok(())
    }

    /// Whether any preset flag was given
    pub fn wants_preset(&self) -> bool {
        self.chakra.is_some() || self.offset.is_some() || self.custom_offset.is_some()
    }
}

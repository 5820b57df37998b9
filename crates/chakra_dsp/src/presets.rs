//! Built-in Chakra and Beat Presets
//!
//! Chakra presets pick the base frequency, offset presets pick the beat.
//! The two lists are independent: choosing one never touches the other.
//!
//! Carrier±Half engines use a second chakra table in which every chakra is
//! a full (carrier, beat) pair, so selecting one sets both values.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DspError;
use crate::policy::{Convention, FrequencyLimits};

/// Which preset list an identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetKind {
    Chakra,
    Offset,
}

impl fmt::Display for PresetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetKind::Chakra => f.write_str("chakra"),
            PresetKind::Offset => f.write_str("offset"),
        }
    }
}

/// Named chakra: a base (or carrier) frequency and optionally its own beat
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChakraPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub sanskrit: &'static str,
    pub frequency: f32,
    /// Beat that comes with this chakra; `None` keeps the current offset
    pub beat: Option<f32>,
    /// Display color as `#RRGGBB`
    pub color: &'static str,
}

/// Brainwave band a beat frequency falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrainwaveBand {
    Delta,
    Theta,
    Alpha,
    Beta,
}

impl BrainwaveBand {
    /// Classify a beat frequency
    pub fn for_beat(beat_hz: f32) -> Self {
        match beat_hz {
            b if b < 4.0 => BrainwaveBand::Delta,
            b if b < 8.0 => BrainwaveBand::Theta,
            b if b < 13.0 => BrainwaveBand::Alpha,
            _ => BrainwaveBand::Beta,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BrainwaveBand::Delta => "Delta",
            BrainwaveBand::Theta => "Theta",
            BrainwaveBand::Alpha => "Alpha",
            BrainwaveBand::Beta => "Beta",
        }
    }
}

/// Named beat offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OffsetPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub band: BrainwaveBand,
    pub value: f32,
}

/// Identifier of the user-editable offset slot
pub const CUSTOM_OFFSET_ID: &str = "custom";

/// Initial value of the custom offset slot
pub const DEFAULT_CUSTOM_OFFSET_HZ: f32 = 4.0;

/// The seven chakras, root to crown
pub const CHAKRA_PRESETS: &[ChakraPreset] = &[
    ChakraPreset { id: "root", name: "Root", sanskrit: "Muladhara", frequency: 396.0, beat: None, color: "#FF0000" },
    ChakraPreset { id: "sacral", name: "Sacral", sanskrit: "Svadhisthana", frequency: 417.0, beat: None, color: "#FF8C00" },
    ChakraPreset { id: "solar-plexus", name: "Solar Plexus", sanskrit: "Manipura", frequency: 528.0, beat: None, color: "#FFD700" },
    ChakraPreset { id: "heart", name: "Heart", sanskrit: "Anahata", frequency: 639.0, beat: None, color: "#00FF00" },
    ChakraPreset { id: "throat", name: "Throat", sanskrit: "Vishuddha", frequency: 741.0, beat: None, color: "#0080FF" },
    ChakraPreset { id: "third-eye", name: "Third Eye", sanskrit: "Ajna", frequency: 852.0, beat: None, color: "#4B0082" },
    ChakraPreset { id: "crown", name: "Crown", sanskrit: "Sahasrara", frequency: 963.0, beat: None, color: "#8A2BE2" },
];

/// The seven chakras as (carrier, beat) pairs, for Carrier±Half engines
pub const CARRIER_PRESETS: &[ChakraPreset] = &[
    ChakraPreset { id: "root", name: "Root", sanskrit: "Muladhara", frequency: 228.0, beat: Some(7.83), color: "#FF0000" },
    ChakraPreset { id: "sacral", name: "Sacral", sanskrit: "Svadhisthana", frequency: 303.0, beat: Some(6.0), color: "#FF8C00" },
    ChakraPreset { id: "solar-plexus", name: "Solar Plexus", sanskrit: "Manipura", frequency: 364.0, beat: Some(10.0), color: "#FFD700" },
    ChakraPreset { id: "heart", name: "Heart", sanskrit: "Anahata", frequency: 341.0, beat: Some(8.0), color: "#00FF00" },
    ChakraPreset { id: "throat", name: "Throat", sanskrit: "Vishuddha", frequency: 384.0, beat: Some(5.0), color: "#0080FF" },
    ChakraPreset { id: "third-eye", name: "Third Eye", sanskrit: "Ajna", frequency: 445.0, beat: Some(8.5), color: "#4B0082" },
    ChakraPreset { id: "crown", name: "Crown", sanskrit: "Sahasrara", frequency: 480.0, beat: Some(12.0), color: "#8A2BE2" },
];

/// Fixed beat presets (the custom slot lives in [`PresetCatalog`])
pub const OFFSET_PRESETS: &[OffsetPreset] = &[
    OffsetPreset { id: "focus", name: "Focus (Alpha)", band: BrainwaveBand::Alpha, value: 10.0 },
    OffsetPreset { id: "relax", name: "Relaxation (Theta)", band: BrainwaveBand::Theta, value: 6.0 },
    OffsetPreset { id: "meditate", name: "Meditation (Delta)", band: BrainwaveBand::Delta, value: 2.0 },
    OffsetPreset { id: "alert", name: "Alert (Beta)", band: BrainwaveBand::Beta, value: 20.0 },
];

/// Preset registry with the mutable custom offset slot
#[derive(Debug, Clone)]
pub struct PresetCatalog {
    chakras: &'static [ChakraPreset],
    custom_offset: f32,
    limits: FrequencyLimits,
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::new(FrequencyLimits::default())
    }
}

impl PresetCatalog {
    /// Catalog with the solfeggio chakra table
    pub fn new(limits: FrequencyLimits) -> Self {
        Self {
            chakras: CHAKRA_PRESETS,
            custom_offset: limits.clamp_offset(DEFAULT_CUSTOM_OFFSET_HZ),
            limits,
        }
    }

    /// Catalog whose chakra table matches how the engine maps frequencies
    pub fn for_convention(convention: Convention, limits: FrequencyLimits) -> Self {
        let mut catalog = Self::new(limits);
        if convention == Convention::CarrierHalf {
            catalog.chakras = CARRIER_PRESETS;
        }
        catalog
    }

    pub fn chakras(&self) -> &'static [ChakraPreset] {
        self.chakras
    }

    /// All offset presets in display order, custom slot last
    pub fn offsets(&self) -> Vec<OffsetPreset> {
        let mut all = OFFSET_PRESETS.to_vec();
        all.push(self.custom_preset());
        all
    }

    /// Look up a chakra by id
    pub fn chakra(&self, id: &str) -> Result<&'static ChakraPreset, DspError> {
        self.chakras
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| DspError::PresetNotFound {
                kind: PresetKind::Chakra,
                id: id.to_string(),
            })
    }

    /// Look up an offset preset by id, including the custom slot
    pub fn offset(&self, id: &str) -> Result<OffsetPreset, DspError> {
        if id == CUSTOM_OFFSET_ID {
            return Ok(self.custom_preset());
        }
        OFFSET_PRESETS
            .iter()
            .find(|o| o.id == id)
            .copied()
            .ok_or_else(|| DspError::PresetNotFound {
                kind: PresetKind::Offset,
                id: id.to_string(),
            })
    }

    pub fn custom_offset(&self) -> f32 {
        self.custom_offset
    }

    /// Set the custom slot, clamped into the offset range. Returns the stored value.
    pub fn set_custom_offset(&mut self, hz: f32) -> f32 {
        self.custom_offset = self.limits.clamp_offset(hz);
        self.custom_offset
    }

    fn custom_preset(&self) -> OffsetPreset {
        OffsetPreset {
            id: CUSTOM_OFFSET_ID,
            name: "Custom",
            band: BrainwaveBand::for_beat(self.custom_offset),
            value: self.custom_offset,
        }
    }
}

//! DSP Error Types

use thiserror::Error;

use crate::presets::PresetKind;

/// Errors that can occur in the DSP layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Unknown {kind} preset: '{id}'")]
    PresetNotFound { kind: PresetKind, id: String },

    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("Invalid frequency limits: {0}")]
    InvalidLimits(String),
}

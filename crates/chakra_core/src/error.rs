//! Engine Error Types

use thiserror::Error;

use chakra_dsp::{DspError, PresetKind};

/// Errors that can occur in the binaural engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Output device or context could not be created or resumed.
    /// The engine stays idle and `start()` may be retried.
    #[error("Audio unavailable: {0}")]
    AudioUnavailable(String),

    /// Unknown preset id passed to `apply_preset`; nothing was changed
    #[error("Preset not found: {kind} '{id}'")]
    PresetNotFound { kind: PresetKind, id: String },

    #[error("No audio output device found")]
    NoDevicesFound,

    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to play audio stream: {0}")]
    StreamPlayError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("DSP error: {0}")]
    DspError(DspError),

    #[error("Channel send error - engine thread stopped")]
    ChannelSendError,

    #[error("Channel receive error - engine thread stopped")]
    ChannelRecvError,
}

impl From<DspError> for EngineError {
    fn from(err: DspError) -> Self {
        match err {
            DspError::PresetNotFound { kind, id } => EngineError::PresetNotFound { kind, id },
            other => EngineError::DspError(other),
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

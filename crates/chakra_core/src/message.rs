//! Message Types for Thread Communication
//!
//! Commands flow from callers -> engine control thread
//! Events flow from engine -> callers

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use chakra_dsp::{BinauralParameters, Channel};

use crate::error::EngineResult;

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Idle,
    Running,
}

/// Which presets the current parameters came from.
/// Cleared by any manual frequency edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetSelection {
    pub chakra: Option<String>,
    pub offset: Option<String>,
}

impl PresetSelection {
    pub fn is_empty(&self) -> bool {
        self.chakra.is_none() && self.offset.is_none()
    }
}

/// Snapshot returned by `get_state()`
///
/// While idle, `left_hz`/`right_hz` are the frequencies the next start will use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub lifecycle: Lifecycle,
    pub left_hz: f32,
    pub right_hz: f32,
    /// `|right_hz - left_hz|`
    pub beat_hz: f32,
    pub gain: f32,
    /// Last applied parameters, after clamping
    pub parameters: BinauralParameters,
    pub selection: PresetSelection,
}

impl EngineState {
    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }
}

/// Preset request resolved on the control thread
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetRequest {
    pub chakra: Option<String>,
    pub offset: Option<String>,
    /// New value for the custom offset slot
    pub custom_offset: Option<f32>,
}

/// Commands sent to the engine control thread
#[derive(Debug)]
pub enum Command {
    /// Allocate the channel pair and start generating
    Start { reply: Sender<EngineResult<()>> },

    /// Release the channel pair
    Stop,

    /// Set parameters directly (manual edit, clears preset selection)
    Retune(BinauralParameters),

    /// Set one channel's frequency directly (manual edit)
    SetChannelFrequency { channel: Channel, hz: f32 },

    /// Per-channel gain, applied to both channels (0.0 - 1.0)
    SetGain(f32),

    /// Resolve and apply presets
    ApplyPreset {
        request: PresetRequest,
        reply: Sender<EngineResult<()>>,
    },

    /// Back to the configured initial parameters
    Reset,

    /// Current state, answered after every earlier command
    GetState { reply: Sender<EngineState> },

    /// Request current state (triggers StateUpdate event)
    RequestState,

    /// Shutdown the control thread
    Shutdown,
}

/// Events sent from the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// Generation started
    Started { left_hz: f32, right_hz: f32 },

    /// Generation stopped
    Stopped,

    /// Live or pending frequencies changed
    Retuned { left_hz: f32, right_hz: f32 },

    /// Preset selection applied
    PresetApplied(PresetSelection),

    /// Error occurred
    Error { message: String },

    /// Current state snapshot
    StateUpdate(EngineState),
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }
}

//! ChakraBeats Core - Binaural Engine
//!
//! This crate provides the engine behind ChakraBeats, including:
//! - The start/stop lifecycle and live retuning of a stereo sine pair
//! - Preset application (chakra base frequencies, beat offsets)
//! - Output transport (via CPAL, or offline rendering)
//! - A read-only spectrum tap for visualizers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Caller threads                        │
//! │  (CLI/UI) ──commands──▶ BinauralEngine ◀──events── (CLI/UI) │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ crossbeam-channel
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Control thread (chakra-control)            │
//! │   owns the output context and the channel pair              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ atomics (ToneGraph)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio callback                         │
//! │   StereoRenderer: L sine ─▶ ch 0, R sine ─▶ ch 1            │
//! │        │ rtrb                                               │
//! │        └─────────▶ SpectrumTap (polled by visualizers)      │
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod device;
mod engine;
mod error;
mod graph;
mod message;
mod output;
mod stream;
mod tap;

pub use config::{EngineConfig, StreamConfig, DEFAULT_GAIN};
pub use device::OutputDevice;
pub use engine::BinauralEngine;
pub use error::{EngineError, EngineResult};
pub use graph::{ChannelPair, ChannelState, StereoRenderer, ToneGraph};
pub use message::{Command, EngineState, Event, Lifecycle, PresetRequest, PresetSelection};
pub use output::{ContextState, OfflineBackend, OfflineHandle, OutputBackend, OutputContext};
pub use stream::CpalBackend;
pub use tap::{SpectrumSnapshot, SpectrumTap};

// Re-export DSP types for convenience
pub use chakra_dsp::{
    BinauralParameters, BrainwaveBand, Channel, ChakraPreset, Convention, FrequencyLimits,
    FrequencyPolicy, OffsetPreset, PresetCatalog, PresetKind, CARRIER_PRESETS, CHAKRA_PRESETS,
    CUSTOM_OFFSET_ID, OFFSET_PRESETS,
};

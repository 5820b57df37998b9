//! ChakraBeats DSP - Signal and Parameter Module
//!
//! This crate provides the pure, engine-independent parts of ChakraBeats:
//! - Frequency policy mapping base/offset parameters to a left/right tone pair
//! - Chakra and brainwave preset catalog with a user-editable custom slot
//! - Phase-continuous sine oscillator
//! - FFT spectrum analyzer for real-time visualization
//!
//! Nothing here owns threads or audio devices; the engine in `chakra_core`
//! drives these types from its control and audio threads.

mod error;
mod fft;
mod oscillator;
mod policy;
mod presets;

pub use error::DspError;
pub use fft::{downsample_bars, peak_bin, SpectrumAnalyzer, FFT_SIZE, NUM_BINS};
pub use oscillator::SineOscillator;
pub use policy::{
    BinauralParameters, Channel, Convention, FrequencyLimits, FrequencyPolicy,
    AUDIBLE_FLOOR_HZ, FREQUENCY_CEILING_HZ, MAX_OFFSET_HZ, MIN_OFFSET_HZ,
};
pub use presets::{
    BrainwaveBand, ChakraPreset, OffsetPreset, PresetCatalog, PresetKind, CARRIER_PRESETS,
    CHAKRA_PRESETS, CUSTOM_OFFSET_ID, DEFAULT_CUSTOM_OFFSET_HZ, OFFSET_PRESETS,
};

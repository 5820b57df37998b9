//! Phase-accumulating sine oscillator
//!
//! Changing the frequency only changes the phase increment, so retuning a
//! running oscillator never produces a discontinuity in the waveform.

use std::f64::consts::TAU;

use crate::error::DspError;

#[derive(Debug, Clone)]
pub struct SineOscillator {
    frequency: f32,
    sample_rate: f64,
    /// Normalized phase in [0, 1)
    phase: f64,
    increment: f64,
}

impl SineOscillator {
    pub fn new(frequency: f32, sample_rate: f32) -> Result<Self, DspError> {
        if !(sample_rate > 0.0 && sample_rate.is_finite()) {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        let mut osc = Self {
            frequency: 0.0,
            sample_rate: sample_rate as f64,
            phase: 0.0,
            increment: 0.0,
        };
        osc.set_frequency(frequency);
        Ok(osc)
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Retune without touching the phase
    #[inline]
    pub fn set_frequency(&mut self, frequency: f32) {
        // Skip the division on the hot path when nothing changed
        if frequency == self.frequency {
            return;
        }
        self.frequency = frequency;
        self.increment = frequency as f64 / self.sample_rate;
    }

    /// Restart the waveform at phase zero
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let sample = (TAU * self.phase).sin() as f32;
        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
        sample
    }
}

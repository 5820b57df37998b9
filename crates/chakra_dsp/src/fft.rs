//! FFT Spectrum Analyzer
//!
//! Computes a smoothed magnitude spectrum of one channel for visualization.
//! Samples are accumulated in a circular window and a new FFT is computed
//! once enough fresh samples have arrived for the target frame rate.
//!
//! # Layout
//!
//! A 256-point window yields 128 linearly spaced bins from DC up to just
//! below Nyquist, the same shape a browser analyser node reports.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::DspError;

/// FFT size (must be power of 2)
/// 256 samples at 48kHz = ~5.3ms window, 187.5Hz resolution
pub const FFT_SIZE: usize = 256;

/// Number of frequency bins in a snapshot (positive half of the FFT)
pub const NUM_BINS: usize = FFT_SIZE / 2;

/// Smoothing factor for spectrum decay (0.0 = instant, 1.0 = no decay)
const SPECTRUM_DECAY: f32 = 0.8;

/// Attack factor for spectrum rise (higher = faster response to new peaks)
const SPECTRUM_ATTACK: f32 = 0.5;

/// Dynamic range mapped onto 0.0 - 1.0
const FLOOR_DB: f32 = -60.0;

fn hann_window(n: usize, size: usize) -> f32 {
    0.5 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / (size - 1) as f32).cos())
}

/// Pre-computed Hann window lookup table
struct HannWindow {
    coeffs: [f32; FFT_SIZE],
}

impl HannWindow {
    fn new() -> Self {
        let coeffs = core::array::from_fn(|i| hann_window(i, FFT_SIZE));
        Self { coeffs }
    }

    #[inline]
    fn apply(&self, sample: f32, index: usize) -> f32 {
        sample * self.coeffs[index]
    }
}

/// Single-channel spectrum analyzer
///
/// Not shared between threads by itself; callers that read it from a UI
/// thread wrap it in their own lock.
pub struct SpectrumAnalyzer {
    /// Circular sample window
    samples: [f32; FFT_SIZE],
    write_pos: usize,
    samples_since_fft: usize,
    samples_per_fft: usize,
    spectrum: [f32; NUM_BINS],
    smoothed: [f32; NUM_BINS],
    window: HannWindow,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    /// Create a new spectrum analyzer
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `fps` - Target update rate for spectrum snapshots
    pub fn new(sample_rate: f32, fps: u32) -> Result<Self, DspError> {
        if !(sample_rate > 0.0 && sample_rate.is_finite()) {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        let samples_per_fft = ((sample_rate / fps.max(1) as f32) as usize).max(1);

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);

        Ok(Self {
            samples: [0.0; FFT_SIZE],
            write_pos: 0,
            samples_since_fft: 0,
            samples_per_fft,
            spectrum: [0.0; NUM_BINS],
            smoothed: [0.0; NUM_BINS],
            window: HannWindow::new(),
            fft,
            buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
        })
    }

    #[inline]
    pub fn push_sample(&mut self, sample: f32) {
        self.samples[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % FFT_SIZE;
        self.samples_since_fft += 1;
    }

    /// Recompute the spectrum if enough new samples have arrived.
    /// Returns true if the spectrum was updated.
    pub fn update(&mut self) -> bool {
        if self.samples_since_fft < self.samples_per_fft {
            return false;
        }
        self.samples_since_fft = 0;

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            // Oldest sample first
            let sample = self.samples[(self.write_pos + i) % FFT_SIZE];
            *slot = Complex::new(self.window.apply(sample, i), 0.0);
        }
        self.fft.process(&mut self.buffer);

        compute_linear_spectrum(&self.buffer, &mut self.spectrum);

        // Asymmetric attack/decay: snappy rise, smooth falloff
        for (smoothed, &raw) in self.smoothed.iter_mut().zip(self.spectrum.iter()) {
            if raw > *smoothed {
                *smoothed += (raw - *smoothed) * SPECTRUM_ATTACK;
            } else {
                *smoothed = *smoothed * SPECTRUM_DECAY + raw * (1.0 - SPECTRUM_DECAY);
            }
        }

        true
    }

    /// Smoothed spectrum for display, each bin in 0.0 - 1.0
    pub fn spectrum(&self) -> [f32; NUM_BINS] {
        self.smoothed
    }

    pub fn reset(&mut self) {
        self.samples = [0.0; FFT_SIZE];
        self.write_pos = 0;
        self.samples_since_fft = 0;
        self.spectrum = [0.0; NUM_BINS];
        self.smoothed = [0.0; NUM_BINS];
    }
}

/// Convert FFT output to normalized magnitude bins
fn compute_linear_spectrum(fft_output: &[Complex<f32>], spectrum: &mut [f32; NUM_BINS]) {
    // A full-scale sine through a Hann window peaks at about FFT_SIZE / 4
    let reference_magnitude = FFT_SIZE as f32 / 4.0;

    for (bin, value) in spectrum.iter_mut().zip(fft_output.iter()) {
        let normalized_mag = value.norm() / reference_magnitude;
        let db = 20.0 * normalized_mag.max(1e-10).log10();
        *bin = ((db - FLOOR_DB) / -FLOOR_DB).clamp(0.0, 1.0);
    }
}

/// Average a spectrum down to `count` display bars
pub fn downsample_bars(spectrum: &[f32], count: usize) -> Vec<f32> {
    if count == 0 || spectrum.is_empty() {
        return Vec::new();
    }
    let bin_size = (spectrum.len() / count).max(1);
    (0..count)
        .map(|i| {
            let start = (i * bin_size).min(spectrum.len());
            let end = (start + bin_size).min(spectrum.len());
            let slice = &spectrum[start..end];
            if slice.is_empty() {
                0.0
            } else {
                slice.iter().sum::<f32>() / slice.len() as f32
            }
        })
        .collect()
}

/// Index of the loudest bin, ignoring DC
pub fn peak_bin(spectrum: &[f32]) -> Option<usize> {
    spectrum
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

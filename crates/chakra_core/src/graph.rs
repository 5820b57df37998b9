//! Binaural Audio Graph
//!
//! ```text
//!  left osc ──▶ left gain ──▶ hard left  ──┐
//!                                         ├──▶ spectrum tap ──▶ output
//! right osc ──▶ right gain ──▶ hard right ─┘
//! ```
//!
//! The control thread owns the [`ChannelPair`] and publishes its values into
//! a [`ToneGraph`], which the audio callback reads through atomics only.
//! Both frequencies live in one `AtomicU64` so the callback can never see a
//! left tone from one retune and a right tone from another.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::Producer;
use serde::{Deserialize, Serialize};

use chakra_dsp::{Channel, DspError, SineOscillator};

/// State of one running tone generator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    pub frequency: f32,
    /// Linear gain, 0.0 - 1.0
    pub gain: f32,
    pub pan: Channel,
}

/// The two generators of a running engine. Built and dropped as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelPair {
    pub left: ChannelState,
    pub right: ChannelState,
}

impl ChannelPair {
    pub fn new(left_hz: f32, right_hz: f32, gain: f32) -> Self {
        let gain = gain.clamp(0.0, 1.0);
        Self {
            left: ChannelState {
                frequency: left_hz,
                gain,
                pan: Channel::Left,
            },
            right: ChannelState {
                frequency: right_hz,
                gain,
                pan: Channel::Right,
            },
        }
    }

    pub fn frequencies(&self) -> (f32, f32) {
        (self.left.frequency, self.right.frequency)
    }

    /// Beat heard by the listener
    pub fn beat(&self) -> f32 {
        (self.right.frequency - self.left.frequency).abs()
    }

    pub fn retune(&mut self, left_hz: f32, right_hz: f32) {
        self.left.frequency = left_hz;
        self.right.frequency = right_hz;
    }

    pub fn set_gain(&mut self, gain: f32) {
        let gain = gain.clamp(0.0, 1.0);
        self.left.gain = gain;
        self.right.gain = gain;
    }
}

#[inline]
fn pack_pair(left: f32, right: f32) -> u64 {
    ((left.to_bits() as u64) << 32) | right.to_bits() as u64
}

#[inline]
fn unpack_pair(bits: u64) -> (f32, f32) {
    (f32::from_bits((bits >> 32) as u32), f32::from_bits(bits as u32))
}

/// Parameters shared between the control thread and the audio callback
pub struct ToneGraph {
    /// Whether the generator pair currently exists
    active: AtomicBool,
    /// Bumped each time a new pair is allocated so the callback restarts phases
    generation: AtomicU32,
    /// Left frequency in the high word, right in the low word (f32 bits)
    frequency_bits: AtomicU64,
    left_gain_bits: AtomicU32,
    right_gain_bits: AtomicU32,
}

impl ToneGraph {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            generation: AtomicU32::new(0),
            frequency_bits: AtomicU64::new(pack_pair(0.0, 0.0)),
            left_gain_bits: AtomicU32::new(0.0_f32.to_bits()),
            right_gain_bits: AtomicU32::new(0.0_f32.to_bits()),
        }
    }

    /// Publish a freshly allocated pair and start generating
    pub fn activate(&self, pair: &ChannelPair) {
        self.set_frequencies(pair.left.frequency, pair.right.frequency);
        self.set_gains(pair.left.gain, pair.right.gain);
        self.generation.fetch_add(1, Ordering::Relaxed);
        // Release: the callback sees the values above once it sees `active`
        self.active.store(true, Ordering::Release);
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_frequencies(&self, left: f32, right: f32) {
        self.frequency_bits
            .store(pack_pair(left, right), Ordering::Release);
    }

    pub fn frequencies(&self) -> (f32, f32) {
        unpack_pair(self.frequency_bits.load(Ordering::Acquire))
    }

    pub fn set_gains(&self, left: f32, right: f32) {
        self.left_gain_bits.store(left.to_bits(), Ordering::Relaxed);
        self.right_gain_bits.store(right.to_bits(), Ordering::Relaxed);
    }

    pub fn gains(&self) -> (f32, f32) {
        (
            f32::from_bits(self.left_gain_bits.load(Ordering::Relaxed)),
            f32::from_bits(self.right_gain_bits.load(Ordering::Relaxed)),
        )
    }

    fn generation(&self) -> u32 {
        self.generation.load(Ordering::Relaxed)
    }
}

impl Default for ToneGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-free producers feeding the spectrum tap, one per channel
pub struct TapProducers {
    pub left: Producer<f32>,
    pub right: Producer<f32>,
}

/// Renders the tone graph into interleaved output buffers
///
/// # Real-time Safety
///
/// `render` runs inside the device callback: no allocation, no locks,
/// parameters are read once per buffer.
pub struct StereoRenderer {
    graph: Arc<ToneGraph>,
    left: SineOscillator,
    right: SineOscillator,
    channels: usize,
    seen_generation: u32,
    taps: Option<TapProducers>,
}

impl StereoRenderer {
    pub fn new(
        graph: Arc<ToneGraph>,
        sample_rate: f32,
        channels: usize,
        taps: Option<TapProducers>,
    ) -> Result<Self, DspError> {
        let (left_hz, right_hz) = graph.frequencies();
        Ok(Self {
            left: SineOscillator::new(left_hz, sample_rate)?,
            right: SineOscillator::new(right_hz, sample_rate)?,
            seen_generation: graph.generation(),
            graph,
            channels: channels.max(2),
            taps,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Fill an interleaved buffer. Channel 0 is left, channel 1 is right,
    /// any extra channels stay silent.
    pub fn render(&mut self, data: &mut [f32]) {
        if !self.graph.is_active() {
            data.fill(0.0);
            // Let the spectrum decay to silence while the device still pulls
            if let Some(taps) = self.taps.as_mut() {
                for _ in data.chunks(self.channels) {
                    let _ = taps.left.push(0.0);
                    let _ = taps.right.push(0.0);
                }
            }
            return;
        }

        let generation = self.graph.generation();
        if generation != self.seen_generation {
            self.seen_generation = generation;
            self.left.reset();
            self.right.reset();
        }

        let (left_hz, right_hz) = self.graph.frequencies();
        self.left.set_frequency(left_hz);
        self.right.set_frequency(right_hz);
        let (left_gain, right_gain) = self.graph.gains();

        for frame in data.chunks_mut(self.channels) {
            let l = self.left.next_sample() * left_gain;
            let r = self.right.next_sample() * right_gain;

            frame.fill(0.0);
            frame[0] = l;
            if let Some(slot) = frame.get_mut(1) {
                *slot = r;
            }

            if let Some(taps) = self.taps.as_mut() {
                // Visualization only: drop samples if the reader falls behind
                let _ = taps.left.push(l);
                let _ = taps.right.push(r);
            }
        }
    }
}

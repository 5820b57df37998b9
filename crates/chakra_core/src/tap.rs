//! Spectrum Tap
//!
//! Read-only view of what each channel is playing, for visualizers.
//!
//! The audio callback pushes samples into one SPSC ring per channel and
//! never waits. A visualizer calls [`SpectrumTap::poll`] at its own frame
//! rate (~60 Hz), which drains the rings and recomputes the spectra, then
//! reads the result with [`SpectrumTap::snapshot`]. None of this goes
//! through the engine's control thread.

use parking_lot::Mutex;
use rtrb::{Consumer, RingBuffer};
use serde::{Deserialize, Serialize};

use chakra_dsp::{downsample_bars, Channel, DspError, SpectrumAnalyzer, NUM_BINS};

use crate::graph::TapProducers;

/// Spectra of both channels at one instant, bins normalized to 0.0 - 1.0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumSnapshot {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl SpectrumSnapshot {
    fn silent() -> Self {
        Self {
            left: vec![0.0; NUM_BINS],
            right: vec![0.0; NUM_BINS],
        }
    }

    pub fn channel(&self, channel: Channel) -> &[f32] {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }

    /// Average each channel down to `count` bars
    pub fn bars(&self, count: usize) -> (Vec<f32>, Vec<f32>) {
        (
            downsample_bars(&self.left, count),
            downsample_bars(&self.right, count),
        )
    }
}

struct ChannelTap {
    consumer: Option<Consumer<f32>>,
    analyzer: SpectrumAnalyzer,
}

impl ChannelTap {
    /// Returns true if the spectrum changed
    fn drain(&mut self) -> bool {
        let Some(consumer) = self.consumer.as_mut() else {
            return false;
        };
        let available = consumer.slots();
        if available == 0 {
            return false;
        }
        if let Ok(chunk) = consumer.read_chunk(available) {
            let (first, second) = chunk.as_slices();
            for &sample in first.iter().chain(second.iter()) {
                self.analyzer.push_sample(sample);
            }
            chunk.commit_all();
        }
        self.analyzer.update()
    }

    fn discard_pending(&mut self) {
        if let Some(consumer) = self.consumer.as_mut() {
            let available = consumer.slots();
            if let Ok(chunk) = consumer.read_chunk(available) {
                chunk.commit_all();
            }
        }
    }
}

struct TapState {
    left: ChannelTap,
    right: ChannelTap,
    latest: SpectrumSnapshot,
}

/// Per-channel spectrum output of the engine
pub struct SpectrumTap {
    state: Mutex<TapState>,
    ring_capacity: usize,
}

impl SpectrumTap {
    /// `sample_rate` and `fps` set how many samples make up one snapshot
    pub fn new(sample_rate: f32, fps: u32) -> Result<Self, DspError> {
        let ring_capacity = ((sample_rate / fps.max(1) as f32) as usize * 4).max(1024);
        Ok(Self {
            state: Mutex::new(TapState {
                left: ChannelTap {
                    consumer: None,
                    analyzer: SpectrumAnalyzer::new(sample_rate, fps)?,
                },
                right: ChannelTap {
                    consumer: None,
                    analyzer: SpectrumAnalyzer::new(sample_rate, fps)?,
                },
                latest: SpectrumSnapshot::silent(),
            }),
            ring_capacity,
        })
    }

    /// Create fresh rings for a new output context and hand back the
    /// producer ends for its renderer
    pub(crate) fn connect(&self) -> TapProducers {
        let (left_tx, left_rx) = RingBuffer::new(self.ring_capacity);
        let (right_tx, right_rx) = RingBuffer::new(self.ring_capacity);

        let mut state = self.state.lock();
        state.left.consumer = Some(left_rx);
        state.right.consumer = Some(right_rx);

        TapProducers {
            left: left_tx,
            right: right_tx,
        }
    }

    /// Drain pending audio and recompute spectra.
    /// Returns true if a new snapshot is available.
    pub fn poll(&self) -> bool {
        let mut state = self.state.lock();
        let left_updated = state.left.drain();
        let right_updated = state.right.drain();

        if left_updated || right_updated {
            let left = state.left.analyzer.spectrum().to_vec();
            let right = state.right.analyzer.spectrum().to_vec();
            state.latest = SpectrumSnapshot { left, right };
        }
        left_updated || right_updated
    }

    /// Most recent spectra
    pub fn snapshot(&self) -> SpectrumSnapshot {
        self.state.lock().latest.clone()
    }

    /// Clear both spectra and drop queued samples, e.g. after playback stops
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.left.discard_pending();
        state.right.discard_pending();
        state.left.analyzer.reset();
        state.right.analyzer.reset();
        state.latest = SpectrumSnapshot::silent();
    }
}

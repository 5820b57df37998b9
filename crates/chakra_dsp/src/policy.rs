//! Frequency Policy
//!
//! Maps binaural parameters (a base or carrier frequency plus a beat offset)
//! to the pair of tone frequencies played on the left and right channels.
//!
//! Every input is clamped, never rejected, so any value coming from a slider
//! or a text box yields a valid pair:
//!
//! ```text
//! offset  -> [min_offset, max_offset]        (0.1 .. 50 Hz)
//! base    -> [floor, ceiling]                (20 .. 2000 Hz)
//! channel -> [floor, ceiling + max_offset]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::DspError;

/// Lowest frequency either channel may play
pub const AUDIBLE_FLOOR_HZ: f32 = 20.0;

/// Upper bound for the base/carrier frequency.
///
/// This bounds the base, not the channels: a channel may sit up to
/// [`MAX_OFFSET_HZ`] above it so the beat is kept at the top of the range.
pub const FREQUENCY_CEILING_HZ: f32 = 2000.0;

/// Smallest beat offset
pub const MIN_OFFSET_HZ: f32 = 0.1;

/// Largest beat offset
pub const MAX_OFFSET_HZ: f32 = 50.0;

/// How the two channel frequencies are placed around the base frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Convention {
    /// `left = base`, `right = base + offset`
    #[default]
    BaseOffset,
    /// `left = carrier - offset / 2`, `right = carrier + offset / 2`
    CarrierHalf,
}

/// Left/right stereo channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Left,
    Right,
}

/// Domain parameters for one binaural tone pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinauralParameters {
    /// Base (Base+Offset) or carrier (Carrier±Half) frequency in Hz
    pub base: f32,
    /// Beat frequency in Hz
    pub offset: f32,
}

impl BinauralParameters {
    pub const fn new(base: f32, offset: f32) -> Self {
        Self { base, offset }
    }
}

impl Default for BinauralParameters {
    fn default() -> Self {
        Self {
            base: 440.0,
            offset: 4.0,
        }
    }
}

/// Clamping bounds used by [`FrequencyPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyLimits {
    pub floor_hz: f32,
    pub ceiling_hz: f32,
    pub min_offset_hz: f32,
    pub max_offset_hz: f32,
}

impl Default for FrequencyLimits {
    fn default() -> Self {
        Self {
            floor_hz: AUDIBLE_FLOOR_HZ,
            ceiling_hz: FREQUENCY_CEILING_HZ,
            min_offset_hz: MIN_OFFSET_HZ,
            max_offset_hz: MAX_OFFSET_HZ,
        }
    }
}

impl FrequencyLimits {
    /// Validate limits
    pub fn validate(&self) -> Result<(), DspError> {
        let all_finite = [
            self.floor_hz,
            self.ceiling_hz,
            self.min_offset_hz,
            self.max_offset_hz,
        ]
        .iter()
        .all(|v| v.is_finite());

        if !all_finite {
            return Err(DspError::InvalidLimits("limits must be finite".into()));
        }
        if self.floor_hz <= 0.0 || self.ceiling_hz <= self.floor_hz {
            return Err(DspError::InvalidLimits(format!(
                "need 0 < floor < ceiling, got {} / {}",
                self.floor_hz, self.ceiling_hz
            )));
        }
        if self.min_offset_hz <= 0.0 || self.max_offset_hz < self.min_offset_hz {
            return Err(DspError::InvalidLimits(format!(
                "need 0 < min_offset <= max_offset, got {} / {}",
                self.min_offset_hz, self.max_offset_hz
            )));
        }
        Ok(())
    }

    /// Highest frequency a single channel may reach
    pub fn channel_ceiling_hz(&self) -> f32 {
        self.ceiling_hz + self.max_offset_hz
    }

    /// Clamp a beat offset into range. Non-finite values map to the minimum.
    pub fn clamp_offset(&self, offset: f32) -> f32 {
        clamp_finite(offset, self.min_offset_hz, self.max_offset_hz)
    }

    /// Clamp a base/carrier frequency into range. Non-finite values map to the floor.
    pub fn clamp_base(&self, base: f32) -> f32 {
        clamp_finite(base, self.floor_hz, self.ceiling_hz)
    }

    fn clamp_channel(&self, hz: f32) -> f32 {
        clamp_finite(hz, self.floor_hz, self.channel_ceiling_hz())
    }
}

fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    }
}

/// Stateless mapping from [`BinauralParameters`] to a channel pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrequencyPolicy {
    pub convention: Convention,
    pub limits: FrequencyLimits,
}

impl FrequencyPolicy {
    pub fn new(convention: Convention, limits: FrequencyLimits) -> Self {
        Self { convention, limits }
    }

    /// Clamp both parameters into their configured ranges
    pub fn normalize(&self, params: BinauralParameters) -> BinauralParameters {
        BinauralParameters {
            base: self.limits.clamp_base(params.base),
            offset: self.limits.clamp_offset(params.offset),
        }
    }

    /// Compute `(left_hz, right_hz)` for the given parameters
    pub fn frequencies(&self, params: BinauralParameters) -> (f32, f32) {
        let BinauralParameters { base, offset } = self.normalize(params);

        let (left, right) = match self.convention {
            Convention::BaseOffset => (base, base + offset),
            Convention::CarrierHalf => (base - offset / 2.0, base + offset / 2.0),
        };

        (self.limits.clamp_channel(left), self.limits.clamp_channel(right))
    }

    /// Beat actually produced by `params` after clamping
    pub fn realized_beat(&self, params: BinauralParameters) -> f32 {
        let (left, right) = self.frequencies(params);
        (right - left).abs()
    }

    /// Derive parameters that reproduce a desired channel pair as closely
    /// as the limits allow
    pub fn parameters_for_pair(&self, left_hz: f32, right_hz: f32) -> BinauralParameters {
        let raw = match self.convention {
            Convention::BaseOffset => BinauralParameters::new(left_hz, right_hz - left_hz),
            Convention::CarrierHalf => {
                BinauralParameters::new((left_hz + right_hz) / 2.0, right_hz - left_hz)
            }
        };
        self.normalize(raw)
    }
}

//! Detection thresholds for stacked correlation traces.

use crate::util::math::median_abs;

/// How a detection threshold is derived from a trace.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Threshold {
    /// A fixed value.
    Absolute(f32),
    /// A multiple of the median absolute value of the trace.
    Mad(f32),
    /// A mean per-channel correlation, scaled by the channel count.
    AvChanCorr(f32),
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::Mad(8.0)
    }
}

impl Threshold {
    /// Resolves the threshold for a trace stacked over `n_channels` channels.
    pub fn resolve(&self, trace: &[f32], n_channels: usize) -> f32 {
        match *self {
            Threshold::Absolute(value) => value,
            Threshold::Mad(factor) => factor * median_abs(trace),
            Threshold::AvChanCorr(per_channel) => per_channel * n_channels as f32,
        }
    }
}

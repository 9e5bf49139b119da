//! Peak extraction and pruning for correlation traces.
//!
//! Includes local-maximum detection, transitive declustering and detection
//! thresholds.

use std::cmp::Ordering;

pub mod decluster;
pub mod peaks;
pub mod threshold;

pub use decluster::{decluster, decluster_with, DeclusterConfig};
pub use peaks::{find_peaks, find_peaks_with, multi_find_peaks, MultiPeaks, PeakConfig};
pub use threshold::Threshold;

/// A local maximum of a correlation trace.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    /// Position in the trace.
    pub index: usize,
    /// Correlation value at `index`; NaN marks an invalid value.
    pub value: f32,
}

impl Peak {
    /// Creates a peak.
    pub fn new(index: usize, value: f32) -> Self {
        Self { index, value }
    }

    /// False if the value is NaN or infinite.
    pub fn is_valid(&self) -> bool {
        self.value.is_finite()
    }
}

/// Which sign of correlation counts as a match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Polarity {
    /// Only positive correlation.
    #[default]
    Positive,
    /// Positive or negative correlation, ranked by magnitude.
    Absolute,
}

impl Polarity {
    /// Value used for thresholding and ranking.
    #[inline]
    pub fn key(self, value: f32) -> f32 {
        match self {
            Polarity::Positive => value,
            Polarity::Absolute => value.abs(),
        }
    }

    /// Orders two values by strength; NaN is weaker than everything.
    pub(crate) fn cmp_strength(self, a: f32, b: f32) -> Ordering {
        let (a, b) = (self.key(a), self.key(b));
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => a.total_cmp(&b),
        }
    }
}

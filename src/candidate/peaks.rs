//! Local-maximum detection on correlation traces.

use crate::candidate::{Peak, Polarity};
use crate::dispatch::{self, Parallelism};
use crate::signal::SignalBlock;
use crate::trace::{trace_event, trace_span};
use crate::util::{SeisCorrError, SeisCorrResult};

/// Peak finder options.
#[derive(Clone, Copy, Debug, Default)]
pub struct PeakConfig {
    /// Sign convention for thresholding and the neighbour comparison.
    pub polarity: Polarity,
}

/// Peaks of several traces, concatenated in trace order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiPeaks {
    /// Peaks of every trace, trace by trace, each in index order.
    pub peaks: Vec<Peak>,
    /// Number of peaks found in each trace.
    pub counts: Vec<usize>,
}

impl MultiPeaks {
    /// Peaks of trace `idx`.
    pub fn trace(&self, idx: usize) -> Option<&[Peak]> {
        let count = *self.counts.get(idx)?;
        let start: usize = self.counts[..idx].iter().sum();
        self.peaks.get(start..start + count)
    }

    /// Total number of peaks.
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    /// True if no trace had a peak.
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}

/// Finds positive local maxima above `threshold`.
pub fn find_peaks(trace: &[f32], threshold: f32) -> Vec<Peak> {
    find_peaks_with(trace, threshold, &PeakConfig::default())
}

/// Finds local maxima above `threshold` using `config`.
///
/// A sample is a peak when its key exceeds `threshold` and is strictly
/// greater than both neighbours. The first and last samples are compared
/// only with the neighbour they have. NaN samples are never peaks and never
/// suppress a neighbour.
pub fn find_peaks_with(trace: &[f32], threshold: f32, config: &PeakConfig) -> Vec<Peak> {
    let key = |v: f32| config.polarity.key(v);
    let below = |neighbour: f32, k: f32| {
        let n = key(neighbour);
        n.is_nan() || n < k
    };
    let mut peaks = Vec::new();
    for (i, &value) in trace.iter().enumerate() {
        let k = key(value);
        if k.is_nan() || k <= threshold {
            continue;
        }
        let left_ok = i == 0 || below(trace[i - 1], k);
        let right_ok = i + 1 == trace.len() || below(trace[i + 1], k);
        if left_ok && right_ok {
            peaks.push(Peak::new(i, value));
        }
    }
    peaks
}

/// Finds peaks in every trace of `traces`, one threshold per trace.
///
/// Traces are scanned in parallel; results come back in trace order with the
/// per-trace counts in [`MultiPeaks::counts`].
pub fn multi_find_peaks(
    traces: SignalBlock<'_>,
    thresholds: &[f32],
    config: &PeakConfig,
    parallelism: &Parallelism,
) -> SeisCorrResult<MultiPeaks> {
    let _guard = trace_span!("multi_find_peaks", traces = traces.count()).entered();
    if thresholds.len() != traces.count() {
        return Err(SeisCorrError::ShapeMismatch {
            expected: traces.count(),
            got: thresholds.len(),
        });
    }

    let per_trace = dispatch::run(
        parallelism,
        (0..traces.count()).collect(),
        || Ok(()),
        |_, idx: usize| {
            let trace = traces
                .signal(idx)
                .ok_or(SeisCorrError::InvalidInput("trace index out of range"))?;
            Ok(find_peaks_with(trace, thresholds[idx], config))
        },
    )?;

    let counts: Vec<usize> = per_trace.iter().map(Vec::len).collect();
    let peaks: Vec<Peak> = per_trace.into_iter().flatten().collect();
    trace_event!("peaks_found", peaks = peaks.len());
    Ok(MultiPeaks { peaks, counts })
}

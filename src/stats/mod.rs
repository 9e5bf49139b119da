//! Sliding-window statistics used to normalize correlation traces.
//!
//! [`WindowStats`] holds the mean and standard deviation of every window of a
//! fixed length, computed in O(n) with an incremental update.
//! [`Conditioning`] records how many windows fell below the variance floors.

use crate::trace::trace_warn;
use crate::util::{SeisCorrError, SeisCorrResult};

/// Variance below which a window (or template) is degenerate.
pub const ACCEPTED_DIFF: f64 = 1e-15;

/// Variance below which correlation values are numerically unreliable.
pub const WARN_DIFF: f64 = 1e-10;

/// Windows between exact recomputations of the running moments.
pub(crate) const RESYNC_INTERVAL: usize = 4096;

/// Overall quality of a correlation result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    /// Every window and the template were well conditioned.
    Clean,
    /// Some values come from low-variance windows or were clipped.
    Marginal,
    /// Some values were forced to zero because the variance vanished.
    Degenerate,
}

/// Conditioning counts accumulated while normalizing a trace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Conditioning {
    /// Number of correlation values produced.
    pub windows: usize,
    /// Windows whose variance was below [`ACCEPTED_DIFF`] (value forced to 0).
    pub degenerate_windows: usize,
    /// Windows whose variance was below [`WARN_DIFF`] but not degenerate.
    pub marginal_windows: usize,
    /// Values that exceeded `[-1, 1]` by more than rounding and were clamped.
    pub clipped: usize,
    /// The template itself had degenerate variance.
    pub degenerate_template: bool,
    /// The template itself had marginal variance.
    pub marginal_template: bool,
}

impl Conditioning {
    /// Summarizes the counts into a single status.
    pub fn status(&self) -> Status {
        if self.degenerate_template || self.degenerate_windows > 0 {
            Status::Degenerate
        } else if self.marginal_template || self.marginal_windows > 0 || self.clipped > 0 {
            Status::Marginal
        } else {
            Status::Clean
        }
    }

    /// Folds another set of counts into this one.
    pub fn merge(&mut self, other: &Conditioning) {
        self.windows += other.windows;
        self.degenerate_windows += other.degenerate_windows;
        self.marginal_windows += other.marginal_windows;
        self.clipped += other.clipped;
        self.degenerate_template |= other.degenerate_template;
        self.marginal_template |= other.marginal_template;
    }

    /// Returns the merge of two counts.
    pub fn merged(mut self, other: &Conditioning) -> Conditioning {
        self.merge(other);
        self
    }
}

/// Per-window mean and standard deviation of a signal.
#[derive(Clone, Debug)]
pub struct WindowStats {
    window: usize,
    mean: Vec<f32>,
    std: Vec<f32>,
    degenerate: usize,
    marginal: usize,
}

impl WindowStats {
    /// Computes statistics for every window of length `window` in `signal`.
    ///
    /// The result has `signal.len() - window + 1` entries. Degenerate windows
    /// have a standard deviation of exactly zero.
    pub fn compute(signal: &[f32], window: usize) -> SeisCorrResult<Self> {
        if window == 0 || signal.is_empty() {
            return Err(SeisCorrError::InvalidDimensions {
                len: window.min(signal.len()),
                count: 1,
            });
        }
        if window > signal.len() {
            return Err(SeisCorrError::TemplateTooLong {
                template_len: window,
                channel_len: signal.len(),
            });
        }

        let count = signal.len() - window + 1;
        let alloc_failed = |what| SeisCorrError::AllocationFailed { what, len: count };
        let mut mean = Vec::new();
        let mut std = Vec::new();
        mean.try_reserve_exact(count)
            .map_err(|_| alloc_failed("window means"))?;
        std.try_reserve_exact(count)
            .map_err(|_| alloc_failed("window deviations"))?;

        let n = window as f64;
        let mut degenerate = 0usize;
        let mut marginal = 0usize;
        let (mut m, mut var) = exact_moments(&signal[..window]);
        // Length of the run of identical samples ending at the window end.
        let mut run = 1usize;
        for pair in signal[..window].windows(2) {
            run = if pair[1] == pair[0] { run + 1 } else { 1 };
        }
        for start in 0..count {
            let end = start + window - 1;
            if start > 0 {
                run = if signal[end] == signal[end - 1] { run + 1 } else { 1 };
                if start % RESYNC_INTERVAL == 0 {
                    (m, var) = exact_moments(&signal[start..=end]);
                } else {
                    let old = signal[start - 1] as f64;
                    let new = signal[end] as f64;
                    let new_mean = m + (new - old) / n;
                    var += (new - old) * (new - new_mean + old - m) / n;
                    m = new_mean;
                }
            }
            if run >= window {
                // Flat window (data gap): snap to exact moments.
                m = signal[end] as f64;
                var = 0.0;
            }
            let v = var.max(0.0);
            mean.push(m as f32);
            if v < ACCEPTED_DIFF {
                degenerate += 1;
                std.push(0.0);
            } else {
                if v < WARN_DIFF {
                    marginal += 1;
                }
                std.push(v.sqrt() as f32);
            }
        }

        if marginal > 0 {
            trace_warn!(
                "marginal_windows",
                window = window,
                marginal = marginal,
                degenerate = degenerate
            );
        }

        Ok(Self {
            window,
            mean,
            std,
            degenerate,
            marginal,
        })
    }

    /// Returns the window length.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Returns the number of windows.
    pub fn len(&self) -> usize {
        self.std.len()
    }

    /// Returns true if there are no windows.
    pub fn is_empty(&self) -> bool {
        self.std.is_empty()
    }

    /// Per-window means.
    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    /// Per-window population standard deviations (0 for degenerate windows).
    pub fn std(&self) -> &[f32] {
        &self.std
    }

    /// True if the window starting at `idx` is degenerate.
    pub fn is_degenerate(&self, idx: usize) -> bool {
        self.std.get(idx).is_some_and(|&s| s == 0.0)
    }

    /// True if the window starting at `idx` is marginal (but not degenerate).
    pub fn is_marginal(&self, idx: usize) -> bool {
        self.std
            .get(idx)
            .is_some_and(|&s| s > 0.0 && ((s as f64) * (s as f64)) < WARN_DIFF)
    }

    /// Number of degenerate windows.
    pub fn degenerate_count(&self) -> usize {
        self.degenerate
    }

    /// Number of marginal windows.
    pub fn marginal_count(&self) -> usize {
        self.marginal
    }
}

/// Two-pass mean and population variance in f64.
pub(crate) fn exact_moments(samples: &[f32]) -> (f64, f64) {
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var)
}

#[cfg(test)]
mod tests {
    use super::{Conditioning, Status, WindowStats, RESYNC_INTERVAL};
    use crate::util::SeisCorrError;

    fn brute(signal: &[f32], window: usize, start: usize) -> (f64, f64) {
        super::exact_moments(&signal[start..start + window])
    }

    #[test]
    fn running_stats_match_bruteforce() {
        let signal: Vec<f32> = (0..300)
            .map(|i| ((i * 37 % 101) as f32 - 50.0) * 0.1 + (i as f32 * 0.05).sin())
            .collect();
        let window = 17;
        let stats = WindowStats::compute(&signal, window).unwrap();
        assert_eq!(stats.len(), signal.len() - window + 1);
        for i in 0..stats.len() {
            let (mean, var) = brute(&signal, window, i);
            assert!((stats.mean()[i] as f64 - mean).abs() < 1e-5);
            assert!((stats.std()[i] as f64 - var.sqrt()).abs() < 1e-5);
        }
    }

    #[test]
    fn running_stats_survive_resync() {
        let signal: Vec<f32> = (0..RESYNC_INTERVAL + 200)
            .map(|i| ((i * 13 % 29) as f32) - 14.0)
            .collect();
        let stats = WindowStats::compute(&signal, 8).unwrap();
        for i in [RESYNC_INTERVAL - 1, RESYNC_INTERVAL, RESYNC_INTERVAL + 1] {
            let (_, var) = brute(&signal, 8, i);
            assert!((stats.std()[i] as f64 - var.sqrt()).abs() < 1e-4);
        }
    }

    #[test]
    fn constant_window_is_degenerate() {
        let mut signal: Vec<f32> = (0..40).map(|i| (i as f32 * 0.7).sin()).collect();
        for v in &mut signal[10..30] {
            *v = 2.5;
        }
        let stats = WindowStats::compute(&signal, 5).unwrap();
        assert!(stats.is_degenerate(12));
        assert!(!stats.is_degenerate(0));
        assert!(stats.degenerate_count() >= 16);
    }

    #[test]
    fn tiny_variance_is_marginal() {
        let signal: Vec<f32> = (0..16)
            .map(|i| if i % 2 == 0 { 0.0 } else { 1e-5 })
            .collect();
        let stats = WindowStats::compute(&signal, 4).unwrap();
        assert_eq!(stats.marginal_count(), stats.len());
        assert!(stats.is_marginal(0));
        assert!(!stats.is_degenerate(0));
    }

    #[test]
    fn rejects_invalid_windows() {
        let signal = [1.0f32, 2.0, 3.0];
        assert_eq!(
            WindowStats::compute(&signal, 4).err().unwrap(),
            SeisCorrError::TemplateTooLong {
                template_len: 4,
                channel_len: 3,
            }
        );
        assert!(WindowStats::compute(&signal, 0).is_err());
        assert!(WindowStats::compute(&[], 1).is_err());
    }

    #[test]
    fn conditioning_status_orders_severity() {
        let mut cond = Conditioning::default();
        assert_eq!(cond.status(), Status::Clean);
        cond.clipped = 1;
        assert_eq!(cond.status(), Status::Marginal);
        let merged = cond.merged(&Conditioning {
            degenerate_windows: 2,
            ..Conditioning::default()
        });
        assert_eq!(merged.status(), Status::Degenerate);
        assert_eq!(merged.clipped, 1);
    }
}

//! Template plan precomputation for normalized cross-correlation.

use crate::stats::{exact_moments, ACCEPTED_DIFF, WARN_DIFF};
use crate::util::{ensure_finite, SeisCorrError, SeisCorrResult};

/// Precomputed statistics and normalized buffer for one template.
///
/// The normalized buffer is `(t - mean) / (n * std)`, so the correlation
/// coefficient against a window `w` is `dot(normalized, w) / std(w)`.
#[derive(Clone, Debug)]
pub struct TemplatePlan {
    mean: f32,
    std: f32,
    degenerate: bool,
    marginal: bool,
    normalized: Vec<f32>,
}

impl TemplatePlan {
    /// Builds a plan from template samples.
    ///
    /// A template with variance below `ACCEPTED_DIFF` is accepted but marked
    /// degenerate: its normalized buffer is all zeros and every correlation
    /// value it produces is 0.
    pub fn new(samples: &[f32]) -> SeisCorrResult<Self> {
        if samples.is_empty() {
            return Err(SeisCorrError::InvalidDimensions { len: 0, count: 1 });
        }
        ensure_finite(samples)?;

        let n = samples.len() as f64;
        let (mean, variance) = exact_moments(samples);
        let degenerate = variance < ACCEPTED_DIFF;
        let marginal = !degenerate && variance < WARN_DIFF;

        let mut normalized = Vec::new();
        normalized
            .try_reserve_exact(samples.len())
            .map_err(|_| SeisCorrError::AllocationFailed {
                what: "normalized template",
                len: samples.len(),
            })?;
        if degenerate {
            normalized.resize(samples.len(), 0.0);
        } else {
            let scale = 1.0 / (n * variance.sqrt());
            normalized.extend(samples.iter().map(|&v| ((v as f64 - mean) * scale) as f32));
        }

        Ok(Self {
            mean: mean as f32,
            std: variance.max(0.0).sqrt() as f32,
            degenerate,
            marginal,
            normalized,
        })
    }

    /// Returns the template length in samples.
    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    /// Always false; empty templates are rejected.
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// Returns the template mean.
    pub fn mean(&self) -> f32 {
        self.mean
    }

    /// Returns the population standard deviation of the template.
    pub fn std(&self) -> f32 {
        self.std
    }

    /// True if the template variance is below `ACCEPTED_DIFF`.
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// True if the template variance is below `WARN_DIFF` but usable.
    pub fn is_marginal(&self) -> bool {
        self.marginal
    }

    /// Returns the zero-mean, unit-energy template buffer.
    pub fn normalized(&self) -> &[f32] {
        &self.normalized
    }
}

#[cfg(test)]
mod tests {
    use super::TemplatePlan;
    use crate::util::SeisCorrError;

    #[test]
    fn template_plan_matches_known_stats() {
        let plan = TemplatePlan::new(&[0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(plan.len(), 4);
        assert!((plan.mean() - 1.5).abs() < 1e-6);
        assert!((plan.std() - 1.25f32.sqrt()).abs() < 1e-6);

        let scale = 1.0 / (4.0 * 1.25f32.sqrt());
        let expected = [-1.5 * scale, -0.5 * scale, 0.5 * scale, 1.5 * scale];
        for (value, expected) in plan.normalized().iter().zip(expected.iter()) {
            assert!((value - expected).abs() < 1e-6);
        }
        let sum: f32 = plan.normalized().iter().sum();
        assert!(sum.abs() < 1e-6);
    }

    #[test]
    fn flat_template_is_degenerate_not_error() {
        let plan = TemplatePlan::new(&[5.0; 6]).unwrap();
        assert!(plan.is_degenerate());
        assert!(plan.normalized().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn template_plan_rejects_bad_input() {
        assert_eq!(
            TemplatePlan::new(&[]).err().unwrap(),
            SeisCorrError::InvalidDimensions { len: 0, count: 1 }
        );
        assert_eq!(
            TemplatePlan::new(&[1.0, f32::INFINITY]).err().unwrap(),
            SeisCorrError::NonFinite { index: 1 }
        );
    }
}

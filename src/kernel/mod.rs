//! Correlation kernel implementations.
//!
//! A kernel turns one template plan, one channel and that channel's window
//! statistics into a range of normalized correlation values. Kernels are
//! driven by the dispatcher, which hands each worker its own workspace and a
//! disjoint output slice.

use crate::stats::{Conditioning, WindowStats, WARN_DIFF};
use crate::template::TemplatePlan;
use crate::util::{SeisCorrError, SeisCorrResult};

pub mod fft;
pub mod time;

#[cfg(feature = "simd")]
pub mod simd;

pub use fft::{FftConfig, FrequencyDomain};
pub use time::TimeDomain;

/// Template length up to which [`Method::Auto`] stays in the time domain.
pub const AUTO_TIME_MAX_LEN: usize = 64;

/// Slack past `|r| = 1` attributed to rounding rather than conditioning.
const CLIP_TOLERANCE: f32 = 1e-3;

/// Correlation method selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Method {
    /// Direct sliding dot products.
    Time,
    /// Overlap-save FFT correlation.
    Frequency,
    /// Time domain for short templates, frequency domain otherwise.
    #[default]
    Auto,
}

impl Method {
    /// Resolves `Auto` for a given longest template length.
    pub fn resolve(self, max_template_len: usize) -> Method {
        match self {
            Method::Auto if max_template_len <= AUTO_TIME_MAX_LEN => Method::Time,
            Method::Auto => Method::Frequency,
            other => other,
        }
    }
}

/// Kernel trait for range correlation.
pub trait Correlator: Sync {
    /// Per-worker scratch state.
    type Workspace: Send;

    /// Creates the scratch state for one worker.
    fn workspace(&self) -> SeisCorrResult<Self::Workspace>;

    /// Output positions that must stay together when a single trace is split
    /// across workers, so the result does not depend on the split.
    fn segment_len(&self, template_len: usize) -> usize;

    /// Correlates `tpl` with `channel` for window starts
    /// `start..start + out.len()`.
    fn correlate_range(
        &self,
        ws: &mut Self::Workspace,
        tpl: &TemplatePlan,
        channel: &[f32],
        stats: &WindowStats,
        start: usize,
        out: &mut [f32],
    ) -> SeisCorrResult<Conditioning>;

    /// Correlates several templates of one length with the same channel over
    /// the same window starts, one output slice per template.
    fn correlate_many(
        &self,
        ws: &mut Self::Workspace,
        tpls: &[&TemplatePlan],
        channel: &[f32],
        stats: &WindowStats,
        start: usize,
        outs: &mut [&mut [f32]],
    ) -> SeisCorrResult<Vec<Conditioning>> {
        check_batch(tpls, outs)?;
        tpls.iter()
            .zip(outs.iter_mut())
            .map(|(tpl, out)| self.correlate_range(ws, tpl, channel, stats, start, out))
            .collect()
    }
}

/// Checks that a batch pairs every template with an output of one length.
pub(crate) fn check_batch(tpls: &[&TemplatePlan], outs: &[&mut [f32]]) -> SeisCorrResult<()> {
    if tpls.len() != outs.len() {
        return Err(SeisCorrError::ShapeMismatch {
            expected: tpls.len(),
            got: outs.len(),
        });
    }
    if let Some(first) = tpls.first() {
        if let Some(tpl) = tpls.iter().find(|t| t.len() != first.len()) {
            return Err(SeisCorrError::ShapeMismatch {
                expected: first.len(),
                got: tpl.len(),
            });
        }
    }
    if let Some(first) = outs.first() {
        if let Some(out) = outs.iter().find(|o| o.len() != first.len()) {
            return Err(SeisCorrError::ShapeMismatch {
                expected: first.len(),
                got: out.len(),
            });
        }
    }
    Ok(())
}

/// Checks that `stats`, `channel` and the output range agree with `tpl`.
pub(crate) fn check_range(
    tpl: &TemplatePlan,
    channel: &[f32],
    stats: &WindowStats,
    start: usize,
    out_len: usize,
) -> SeisCorrResult<()> {
    let m = tpl.len();
    if m > channel.len() {
        return Err(SeisCorrError::TemplateTooLong {
            template_len: m,
            channel_len: channel.len(),
        });
    }
    if stats.window() != m {
        return Err(SeisCorrError::ShapeMismatch {
            expected: m,
            got: stats.window(),
        });
    }
    let windows = channel.len() - m + 1;
    if stats.len() != windows {
        return Err(SeisCorrError::ShapeMismatch {
            expected: windows,
            got: stats.len(),
        });
    }
    let end = start.saturating_add(out_len);
    if end > windows {
        return Err(SeisCorrError::ShapeMismatch {
            expected: windows,
            got: end,
        });
    }
    Ok(())
}

/// Initial conditioning for a template.
pub(crate) fn template_conditioning(tpl: &TemplatePlan) -> Conditioning {
    Conditioning {
        degenerate_template: tpl.is_degenerate(),
        marginal_template: tpl.is_marginal(),
        ..Conditioning::default()
    }
}

/// Turns a raw dot product with the normalized template into a coefficient.
///
/// Degenerate windows give 0; values past `[-1, 1]` are clamped and counted
/// when they exceed rounding slack.
#[inline]
pub(crate) fn normalize(raw: f32, std: f32, cond: &mut Conditioning) -> f32 {
    cond.windows += 1;
    if std == 0.0 {
        cond.degenerate_windows += 1;
        return 0.0;
    }
    if (std as f64) * (std as f64) < WARN_DIFF {
        cond.marginal_windows += 1;
    }
    let r = raw / std;
    if !r.is_finite() {
        cond.degenerate_windows += 1;
        return 0.0;
    }
    if r.abs() > 1.0 {
        if r.abs() > 1.0 + CLIP_TOLERANCE {
            cond.clipped += 1;
        }
        return r.signum();
    }
    r
}

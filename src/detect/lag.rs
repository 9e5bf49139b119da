//! Per-channel lag estimation by maximum correlation.

use crate::dispatch::{self, Parallelism};
use crate::kernel::time::correlate_time_range;
use crate::refine::refine_peak;
use crate::signal::SignalBlock;
use crate::stats::WindowStats;
use crate::template::{TemplateBank, TemplatePlan};
use crate::util::{ensure_finite, try_zeroed, SeisCorrError, SeisCorrResult};

/// Best alignment of a template inside a window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lag {
    /// Window start with the highest correlation.
    pub shift: usize,
    /// Correlation at `shift`.
    pub value: f32,
    /// `shift` refined to sub-sample precision.
    pub refined_shift: f32,
}

fn best_lag(plan: &TemplatePlan, window: &[f32], min_cc: f32) -> SeisCorrResult<Option<Lag>> {
    ensure_finite(window)?;
    let stats = WindowStats::compute(window, plan.len())?;
    let mut trace = try_zeroed(stats.len(), "lag trace")?;
    correlate_time_range(plan, window, &stats, 0, &mut trace)?;

    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in trace.iter().enumerate() {
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    Ok(best
        .filter(|&(_, value)| value >= min_cc)
        .map(|(shift, value)| Lag {
            shift,
            value,
            refined_shift: refine_peak(&trace, shift),
        }))
}

/// Finds where `template` best matches inside `window`.
///
/// Returns `None` when the best correlation is below `min_cc`.
pub fn lag_calc(template: &[f32], window: &[f32], min_cc: f32) -> SeisCorrResult<Option<Lag>> {
    let plan = TemplatePlan::new(template)?;
    if plan.len() > window.len() {
        return Err(SeisCorrError::TemplateTooLong {
            template_len: plan.len(),
            channel_len: window.len(),
        });
    }
    best_lag(&plan, window, min_cc)
}

/// Runs [`lag_calc`] for template `template` of `bank` on every channel
/// window in `windows`.
pub fn lag_calc_bank(
    bank: &TemplateBank,
    template: usize,
    windows: SignalBlock<'_>,
    min_cc: f32,
    parallelism: &Parallelism,
) -> SeisCorrResult<Vec<Option<Lag>>> {
    if windows.count() != bank.n_channels() {
        return Err(SeisCorrError::ShapeMismatch {
            expected: bank.n_channels(),
            got: windows.count(),
        });
    }
    if template >= bank.n_templates() {
        return Err(SeisCorrError::InvalidInput("template index out of range"));
    }
    if bank.max_len() > windows.len() {
        return Err(SeisCorrError::TemplateTooLong {
            template_len: bank.max_len(),
            channel_len: windows.len(),
        });
    }
    dispatch::run(
        parallelism,
        (0..windows.count()).collect(),
        || Ok(()),
        |_, c: usize| {
            let plan = bank
                .plan(template, c)
                .ok_or(SeisCorrError::InvalidInput("template index out of range"))?;
            let window = windows
                .signal(c)
                .ok_or(SeisCorrError::InvalidInput("channel index out of range"))?;
            best_lag(plan, window, min_cc)
        },
    )
}

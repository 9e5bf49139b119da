//! Channel stacking of correlation traces.
//!
//! A template's detection statistic is the sum of its per-channel traces,
//! each shifted so that the template's channel offsets line up. Channels
//! whose trace is identically zero (no data, or a degenerate template) are
//! not counted as contributing.

use crate::correlate::CorrelationBlock;
use crate::dispatch::{self, Parallelism};
use crate::trace::{trace_span, trace_warn};
use crate::util::math::mean_f64;
use crate::util::{try_zeroed, SeisCorrError, SeisCorrResult};

/// Stacked mean magnitude above which the stack is reported as suspicious.
pub const MEAN_WARN: f64 = 0.05;

/// One summed trace per template.
#[derive(Clone, Debug)]
pub struct StackedTraces {
    sums: Vec<f32>,
    len: usize,
    n_templates: usize,
    used_channels: Vec<usize>,
}

impl StackedTraces {
    /// Length of every stacked trace.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if there are no stacked values.
    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Number of templates.
    pub fn n_templates(&self) -> usize {
        self.n_templates
    }

    /// Stacked trace of `template`.
    pub fn trace(&self, template: usize) -> Option<&[f32]> {
        if template >= self.n_templates {
            return None;
        }
        self.sums.get(template * self.len..(template + 1) * self.len)
    }

    /// Channels that contributed to the stack of `template`.
    pub fn used_channels(&self, template: usize) -> usize {
        self.used_channels.get(template).copied().unwrap_or(0)
    }

    /// Mean of the stacked trace of `template`.
    pub fn mean(&self, template: usize) -> Option<f64> {
        self.trace(template).map(mean_f64)
    }
}

/// Sums the channel traces of every template.
///
/// `offsets`, when given, holds one shift per (template, channel) pair in
/// template-major order: channel `c` of template `t` is read `offsets[t *
/// n_channels + c]` samples ahead, and positions past its end contribute 0.
pub fn stack_channels(
    block: &CorrelationBlock,
    offsets: Option<&[usize]>,
    parallelism: &Parallelism,
) -> SeisCorrResult<StackedTraces> {
    let n_templates = block.n_templates();
    let n_channels = block.n_channels();
    let len = block.len();
    let _guard = trace_span!("stack_channels", n_templates = n_templates).entered();
    if let Some(offsets) = offsets {
        if offsets.len() != n_templates * n_channels {
            return Err(SeisCorrError::ShapeMismatch {
                expected: n_templates * n_channels,
                got: offsets.len(),
            });
        }
    }

    let mut sums = try_zeroed(n_templates * len, "stacked traces")?;
    let units: Vec<(usize, &mut [f32])> = sums.chunks_mut(len.max(1)).enumerate().collect();
    let used_channels = dispatch::run(
        parallelism,
        units,
        || Ok(()),
        |_, (t, sum)| {
            let mut used = 0usize;
            for c in 0..n_channels {
                let trace = block
                    .trace(t, c)
                    .ok_or(SeisCorrError::InvalidInput("trace index out of range"))?;
                if trace.iter().all(|&v| v == 0.0) {
                    continue;
                }
                used += 1;
                let shift = offsets.map_or(0, |o| o[t * n_channels + c]);
                if shift >= len {
                    continue;
                }
                for (acc, &v) in sum.iter_mut().zip(&trace[shift..]) {
                    *acc += v;
                }
            }
            let mean = mean_f64(sum);
            if mean.abs() > MEAN_WARN {
                trace_warn!("stack_mean_offset", template = t, mean = mean);
            }
            Ok(used)
        },
    )?;

    Ok(StackedTraces {
        sums,
        len,
        n_templates,
        used_channels,
    })
}

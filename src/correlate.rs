//! Public correlation entry points.
//!
//! Every entry point validates shapes, computes the window statistics once per
//! channel and template length, then dispatches a kernel over disjoint output
//! slices. Single-pair calls split the trace along time; multi-template calls
//! split along the larger of the template and channel dimensions.

use crate::dispatch::{self, choose_axis, chunk_len, Axis, Parallelism};
use crate::fft::{PlanCache, SpectralTransform, TransformBackend, Workspace};
use crate::kernel::fft::correlate_fft_range;
use crate::kernel::{Correlator, FftConfig, FrequencyDomain, Method, TimeDomain};
use crate::signal::SignalBlock;
use crate::stats::{Conditioning, Status, WindowStats};
use crate::template::{TemplateBank, TemplatePlan};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{ensure_finite, try_zeroed, SeisCorrError, SeisCorrResult};

/// Configuration for [`correlate`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CorrelateConfig {
    /// Correlation method.
    pub method: Method,
    /// Transform sizing for the frequency-domain method.
    pub fft: FftConfig,
    /// Worker count.
    pub parallelism: Parallelism,
}

/// One correlation trace and its conditioning.
#[derive(Clone, Debug)]
pub struct Correlation {
    /// Coefficient per window start, `channel_len - template_len + 1` values.
    pub trace: Vec<f32>,
    /// Variance conditioning of the windows that produced `trace`.
    pub conditioning: Conditioning,
}

impl Correlation {
    /// Summarized quality of the trace.
    pub fn status(&self) -> Status {
        self.conditioning.status()
    }
}

/// Correlation traces for every (template, channel) pair.
///
/// Trace `(t, c)` is row `t * n_channels + c` of the flat buffer.
#[derive(Clone, Debug)]
pub struct CorrelationBlock {
    data: Vec<f32>,
    n_templates: usize,
    n_channels: usize,
    len: usize,
    conditioning: Vec<Conditioning>,
}

impl CorrelationBlock {
    /// Length of every trace.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the block holds no values.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of templates.
    pub fn n_templates(&self) -> usize {
        self.n_templates
    }

    /// Number of channels.
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Trace for template `template` on channel `channel`.
    pub fn trace(&self, template: usize, channel: usize) -> Option<&[f32]> {
        if template >= self.n_templates || channel >= self.n_channels {
            return None;
        }
        let row = template * self.n_channels + channel;
        self.data.get(row * self.len..(row + 1) * self.len)
    }

    /// Conditioning for template `template` on channel `channel`.
    pub fn conditioning(&self, template: usize, channel: usize) -> Option<&Conditioning> {
        if template >= self.n_templates || channel >= self.n_channels {
            return None;
        }
        self.conditioning.get(template * self.n_channels + channel)
    }

    /// Worst status over all pairs.
    pub fn status(&self) -> Status {
        self.conditioning
            .iter()
            .map(Conditioning::status)
            .max()
            .unwrap_or(Status::Clean)
    }

    /// Flat trace buffer, template-major.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Views the traces as a signal block of `n_templates * n_channels` rows.
    pub fn as_block(&self) -> SeisCorrResult<SignalBlock<'_>> {
        SignalBlock::from_slice(&self.data, self.n_templates * self.n_channels, self.len)
    }

    /// Consumes the block, returning the flat buffer.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        data: Vec<f32>,
        n_templates: usize,
        n_channels: usize,
        len: usize,
    ) -> Self {
        Self {
            data,
            n_templates,
            n_channels,
            len,
            conditioning: vec![Conditioning::default(); n_templates * n_channels],
        }
    }

    fn into_single(self) -> Correlation {
        let conditioning = self.conditioning.first().copied().unwrap_or_default();
        Correlation {
            trace: self.data,
            conditioning,
        }
    }
}

/// Window statistics of one channel for each template length used on it.
struct ChannelStats {
    by_len: Vec<WindowStats>,
}

impl ChannelStats {
    fn compute(channel: &[f32], lens: &[usize]) -> SeisCorrResult<Self> {
        let by_len = lens
            .iter()
            .map(|&m| WindowStats::compute(channel, m))
            .collect::<SeisCorrResult<Vec<_>>>()?;
        Ok(Self { by_len })
    }

    fn get(&self, len: usize) -> SeisCorrResult<&WindowStats> {
        self.by_len
            .iter()
            .find(|s| s.window() == len)
            .ok_or(SeisCorrError::InvalidInput("missing window statistics"))
    }
}

/// One output range of one (template, channel) pair.
struct Pair<'a> {
    row: usize,
    template: usize,
    channel: usize,
    start: usize,
    out: &'a mut [f32],
}

fn validate(bank: &TemplateBank, channels: SignalBlock<'_>) -> SeisCorrResult<usize> {
    if channels.count() != bank.n_channels() {
        return Err(SeisCorrError::ShapeMismatch {
            expected: bank.n_channels(),
            got: channels.count(),
        });
    }
    let max_len = bank.max_len();
    if max_len > channels.len() {
        return Err(SeisCorrError::TemplateTooLong {
            template_len: max_len,
            channel_len: channels.len(),
        });
    }
    channels.ensure_finite()?;
    Ok(channels.len() - max_len + 1)
}

/// Runs `kernel` for every pair of `bank` against `channels`.
fn run_bank<K: Correlator>(
    kernel: &K,
    bank: &TemplateBank,
    channels: SignalBlock<'_>,
    out_len: usize,
    parallelism: &Parallelism,
) -> SeisCorrResult<CorrelationBlock> {
    let n_templates = bank.n_templates();
    let n_channels = bank.n_channels();
    let threads = parallelism.threads();

    let stats = dispatch::run(
        parallelism,
        (0..n_channels).collect(),
        || Ok(()),
        |_, c: usize| {
            let channel = channels
                .signal(c)
                .ok_or(SeisCorrError::InvalidInput("channel index out of range"))?;
            ChannelStats::compute(channel, &bank.lens_for_channel(c))
        },
    )?;

    let rows = n_templates * n_channels;
    let mut data = try_zeroed(rows * out_len, "correlation block")?;
    let axis = choose_axis(n_templates, n_channels);
    trace_event!(
        "dispatch",
        axis = axis.as_str(),
        threads = threads,
        rows = rows,
        out_len = out_len
    );

    let mut units: Vec<Vec<Pair<'_>>> = Vec::new();
    match axis {
        Axis::Templates | Axis::Channels => {
            let groups = if axis == Axis::Templates {
                n_templates
            } else {
                n_channels
            };
            units.resize_with(groups, Vec::new);
            for (row, out) in data.chunks_mut(out_len).enumerate() {
                let template = row / n_channels;
                let channel = row % n_channels;
                let group = if axis == Axis::Templates {
                    template
                } else {
                    channel
                };
                units[group].push(Pair {
                    row,
                    template,
                    channel,
                    start: 0,
                    out,
                });
            }
        }
        Axis::Segments => {
            let m = bank.max_len();
            let chunk = chunk_len(out_len, threads, kernel.segment_len(m));
            for (idx, out) in data.chunks_mut(chunk).enumerate() {
                units.push(vec![Pair {
                    row: 0,
                    template: 0,
                    channel: 0,
                    start: idx * chunk,
                    out,
                }]);
            }
        }
    }

    let results = dispatch::run(
        parallelism,
        units,
        || kernel.workspace(),
        |ws, unit| {
            let template_of = |pair: &Pair<'_>| {
                bank.plan(pair.template, pair.channel)
                    .ok_or(SeisCorrError::InvalidInput("template index out of range"))
            };
            let mut done = Vec::with_capacity(unit.len());
            let mut pending = unit;
            // Pairs sharing a channel, a range and a template length run as
            // one batch so the kernel can reuse the channel transforms.
            while let Some(lead) = pending.first() {
                let key = (lead.channel, lead.start, lead.out.len());
                let m = template_of(lead)?.len();
                let (group, rest): (Vec<Pair<'_>>, Vec<Pair<'_>>) =
                    pending.into_iter().partition(|pair| {
                        (pair.channel, pair.start, pair.out.len()) == key
                            && template_of(pair).is_ok_and(|tpl| tpl.len() == m)
                    });
                pending = rest;

                let (channel_idx, start, _) = key;
                let channel = channels
                    .signal(channel_idx)
                    .ok_or(SeisCorrError::InvalidInput("channel index out of range"))?;
                let stats = stats[channel_idx].get(m)?;
                let tpls = group
                    .iter()
                    .map(template_of)
                    .collect::<SeisCorrResult<Vec<_>>>()?;
                let mut rows = Vec::with_capacity(group.len());
                let mut outs = Vec::with_capacity(group.len());
                for pair in group {
                    rows.push(pair.row);
                    outs.push(pair.out);
                }
                let conds = kernel.correlate_many(ws, &tpls, channel, stats, start, &mut outs)?;
                done.extend(rows.into_iter().zip(conds));
            }
            Ok(done)
        },
    )?;

    let mut conditioning = vec![Conditioning::default(); rows];
    for (row, cond) in results.into_iter().flatten() {
        conditioning[row].merge(&cond);
    }
    let marginal = conditioning
        .iter()
        .filter(|c| c.status() != Status::Clean)
        .count();
    if marginal > 0 {
        trace_warn!("conditioned_traces", traces = marginal, total = rows);
    }

    Ok(CorrelationBlock {
        data,
        n_templates,
        n_channels,
        len: out_len,
        conditioning,
    })
}

fn single_pair<'a>(
    template: &[f32],
    channel: &'a [f32],
) -> SeisCorrResult<(TemplateBank, SignalBlock<'a>)> {
    if template.is_empty() || channel.is_empty() {
        return Err(SeisCorrError::InvalidDimensions {
            len: template.len().min(channel.len()),
            count: 1,
        });
    }
    if template.len() > channel.len() {
        return Err(SeisCorrError::TemplateTooLong {
            template_len: template.len(),
            channel_len: channel.len(),
        });
    }
    Ok((TemplateBank::single(template)?, SignalBlock::single(channel)?))
}

/// Time-domain normalized cross-correlation of one template with one channel.
pub fn normxcorr_time(template: &[f32], channel: &[f32]) -> SeisCorrResult<Correlation> {
    normxcorr_time_threaded(template, channel, &Parallelism::sequential())
}

/// Time-domain correlation of one pair, splitting window positions across
/// workers.
pub fn normxcorr_time_threaded(
    template: &[f32],
    channel: &[f32],
    parallelism: &Parallelism,
) -> SeisCorrResult<Correlation> {
    let _guard = trace_span!("normxcorr_time", template_len = template.len()).entered();
    let (bank, channels) = single_pair(template, channel)?;
    let out_len = validate(&bank, channels)?;
    run_bank(&TimeDomain, &bank, channels, out_len, parallelism)
        .map(CorrelationBlock::into_single)
}

/// Time-domain correlation of every template in `bank` with its channels.
pub fn multi_normxcorr_time(
    bank: &TemplateBank,
    channels: SignalBlock<'_>,
) -> SeisCorrResult<CorrelationBlock> {
    multi_normxcorr_time_threaded(bank, channels, &Parallelism::sequential())
}

/// Threaded time-domain correlation of a template bank.
pub fn multi_normxcorr_time_threaded(
    bank: &TemplateBank,
    channels: SignalBlock<'_>,
    parallelism: &Parallelism,
) -> SeisCorrResult<CorrelationBlock> {
    let _guard = trace_span!(
        "multi_normxcorr_time",
        n_templates = bank.n_templates(),
        n_channels = bank.n_channels()
    )
    .entered();
    let out_len = validate(bank, channels)?;
    run_bank(&TimeDomain, bank, channels, out_len, parallelism)
}

/// Frequency-domain correlation of one pair; plans and scratch are created
/// and released inside the call.
pub fn normxcorr_fft(
    template: &[f32],
    channel: &[f32],
    config: &FftConfig,
) -> SeisCorrResult<Correlation> {
    normxcorr_fft_threaded(template, channel, config, &Parallelism::sequential())
}

/// Frequency-domain correlation of one pair with caller-supplied plan,
/// workspace and window statistics.
///
/// `out` must hold `channel.len() - template.len() + 1` values. The plan must
/// be at least `2 * template.len() - 1` long; the workspace must be sized for
/// it. Use this to reuse one plan and one workspace across many calls.
pub fn normxcorr_fft_main(
    plan: &dyn SpectralTransform,
    workspace: &mut Workspace,
    template: &TemplatePlan,
    channel: &[f32],
    stats: &WindowStats,
    out: &mut [f32],
) -> SeisCorrResult<Conditioning> {
    ensure_finite(channel)?;
    if template.len() > channel.len() {
        return Err(SeisCorrError::TemplateTooLong {
            template_len: template.len(),
            channel_len: channel.len(),
        });
    }
    let expected = channel.len() - template.len() + 1;
    if out.len() != expected {
        return Err(SeisCorrError::ShapeMismatch {
            expected,
            got: out.len(),
        });
    }
    correlate_fft_range(plan, workspace, template, channel, stats, 0, out)
}

/// Frequency-domain correlation of one pair, splitting transform segments
/// across workers.
pub fn normxcorr_fft_threaded(
    template: &[f32],
    channel: &[f32],
    config: &FftConfig,
    parallelism: &Parallelism,
) -> SeisCorrResult<Correlation> {
    let _guard = trace_span!("normxcorr_fft", template_len = template.len()).entered();
    let (bank, channels) = single_pair(template, channel)?;
    let mut plans = PlanCache::new();
    multi_normxcorr_fft_with(&mut plans, &bank, channels, config, parallelism)
        .map(CorrelationBlock::into_single)
}

/// Frequency-domain correlation of a template bank.
pub fn multi_normxcorr_fft(
    bank: &TemplateBank,
    channels: SignalBlock<'_>,
    config: &FftConfig,
    parallelism: &Parallelism,
) -> SeisCorrResult<CorrelationBlock> {
    let mut plans = PlanCache::new();
    multi_normxcorr_fft_with(&mut plans, bank, channels, config, parallelism)
}

/// Frequency-domain correlation of a template bank reusing `plans`.
///
/// Plans are built before workers start and shared read-only; each worker
/// job owns its workspace.
pub fn multi_normxcorr_fft_with<B: TransformBackend>(
    plans: &mut PlanCache<B>,
    bank: &TemplateBank,
    channels: SignalBlock<'_>,
    config: &FftConfig,
    parallelism: &Parallelism,
) -> SeisCorrResult<CorrelationBlock> {
    let _guard = trace_span!(
        "multi_normxcorr_fft",
        n_templates = bank.n_templates(),
        n_channels = bank.n_channels()
    )
    .entered();
    let out_len = validate(bank, channels)?;
    let kernel = FrequencyDomain::prepare(plans, &bank.distinct_lens(), out_len, config)?;
    trace_event!("fft_plans", max_fft_len = kernel.max_fft_len());
    run_bank(&kernel, bank, channels, out_len, parallelism)
}

/// Correlates a template bank with the configured method.
pub fn correlate(
    bank: &TemplateBank,
    channels: SignalBlock<'_>,
    config: &CorrelateConfig,
) -> SeisCorrResult<CorrelationBlock> {
    match config.method.resolve(bank.max_len()) {
        Method::Time => multi_normxcorr_time_threaded(bank, channels, &config.parallelism),
        _ => multi_normxcorr_fft(bank, channels, &config.fft, &config.parallelism),
    }
}

//! Frequency-domain normalized cross-correlation (overlap-save).
//!
//! The reversed normalized template is transformed once per call; the channel
//! is processed in segments whose transforms are multiplied with the template
//! spectrum and inverted. A segment producing `s` outputs reads
//! `s + m - 1` channel samples and uses a transform of at least
//! `s + 2 (m - 1)` samples, so circular wraparound never reaches a valid
//! output. Normalization reuses the window statistics of the accumulator.

use std::sync::Arc;

use crate::fft::{
    HeapAllocator, PlanCache, ScratchAllocator, SpectralTransform, TransformBackend, Workspace,
};
use crate::kernel::{check_batch, check_range, normalize, template_conditioning, Correlator};
use crate::stats::{Conditioning, WindowStats};
use crate::template::TemplatePlan;
use crate::util::math::next_fast_len;
use crate::util::{SeisCorrError, SeisCorrResult};

/// Transform sizing for the frequency-domain kernel.
#[derive(Clone, Copy, Debug)]
pub struct FftConfig {
    /// Soft cap on the transform length; longer channels are segmented.
    ///
    /// The cap is raised to `4 * template_len` when a template is long.
    pub max_fft_len: usize,
}

impl Default for FftConfig {
    fn default() -> Self {
        Self {
            max_fft_len: 1 << 16,
        }
    }
}

impl FftConfig {
    /// Transform length for `out_len` outputs of a template of length `m`.
    pub fn fft_len(&self, out_len: usize, template_len: usize) -> usize {
        let overlap = 2 * template_len.saturating_sub(1);
        let full = out_len + overlap;
        let cap = self.max_fft_len.max(4 * template_len);
        next_fast_len(full.min(cap))
    }
}

/// Outputs produced per segment by a transform of `fft_len` samples.
pub(crate) fn segment_outputs(fft_len: usize, template_len: usize) -> usize {
    fft_len.saturating_sub(2 * template_len.saturating_sub(1))
}

/// Loads the reversed normalized template into the workspace spectrum.
fn prepare_template(
    plan: &dyn SpectralTransform,
    ws: &mut Workspace,
    tpl: &TemplatePlan,
) -> SeisCorrResult<()> {
    let m = tpl.len();
    for (dst, &src) in ws.real.iter_mut().zip(tpl.normalized().iter().rev()) {
        *dst = src;
    }
    ws.real[m..].fill(0.0);
    plan.forward(&mut ws.real, &mut ws.template_spectrum, &mut ws.scratch)
}

/// Templates whose spectra are held at once by [`correlate_fft_many`].
const SHARED_SPECTRA: usize = 32;

/// Returns the outputs per segment for `plan`, checking the workspace fits.
fn segment_plan(
    plan: &dyn SpectralTransform,
    ws: &Workspace,
    template_len: usize,
) -> SeisCorrResult<usize> {
    let fft_len = plan.len();
    let seg_out = segment_outputs(fft_len, template_len);
    if seg_out == 0 {
        return Err(SeisCorrError::PlanFailed {
            len: fft_len,
            reason: format!("transform too short for template of {template_len} samples"),
        });
    }
    if ws.len() != fft_len || ws.scratch.len() < plan.scratch_len() {
        return Err(SeisCorrError::ShapeMismatch {
            expected: fft_len,
            got: ws.len(),
        });
    }
    Ok(seg_out)
}

/// Loads one demeaned, zero-padded channel segment into the workspace.
fn load_segment(ws: &mut Workspace, input: &[f32]) {
    // The template is zero-mean, so removing the segment mean leaves the
    // correlation unchanged and keeps large offsets out of the transform.
    let mean = input.iter().map(|&v| v as f64).sum::<f64>() / input.len() as f64;
    let mean = mean as f32;
    for (dst, &src) in ws.real.iter_mut().zip(input.iter()) {
        *dst = src - mean;
    }
    ws.real[input.len()..].fill(0.0);
}

fn fill_degenerate(out: &mut [f32], stds: &[f32], start: usize, cond: &mut Conditioning) {
    for (k, value) in out.iter_mut().enumerate() {
        *value = normalize(0.0, stds[start + k], cond);
    }
}

/// Correlates window starts `start..start + out.len()` with a caller-supplied
/// plan and workspace.
///
/// Segments are aligned to multiples of the per-segment output count, so
/// splitting a trace at such multiples gives bit-identical results.
pub fn correlate_fft_range(
    plan: &dyn SpectralTransform,
    ws: &mut Workspace,
    tpl: &TemplatePlan,
    channel: &[f32],
    stats: &WindowStats,
    start: usize,
    out: &mut [f32],
) -> SeisCorrResult<Conditioning> {
    check_range(tpl, channel, stats, start, out.len())?;
    let m = tpl.len();
    let seg_out = segment_plan(plan, ws, m)?;

    let stds = stats.std();
    let mut cond = template_conditioning(tpl);
    if tpl.is_degenerate() {
        fill_degenerate(out, stds, start, &mut cond);
        return Ok(cond);
    }

    prepare_template(plan, ws, tpl)?;
    let scale = 1.0 / plan.len() as f32;
    let end = start + out.len();
    let mut pos = start;
    while pos < end {
        let seg_end = ((pos / seg_out + 1) * seg_out).min(end);
        let seg_in = seg_end - pos + m - 1;
        load_segment(ws, &channel[pos..pos + seg_in]);

        plan.forward(&mut ws.real, &mut ws.spectrum, &mut ws.scratch)?;
        for (x, t) in ws.spectrum.iter_mut().zip(ws.template_spectrum.iter()) {
            *x *= *t;
        }
        plan.inverse(&mut ws.spectrum, &mut ws.real, &mut ws.scratch)?;

        for i in pos..seg_end {
            let raw = ws.real[i - pos + m - 1] * scale;
            out[i - start] = normalize(raw, stds[i], &mut cond);
        }
        pos = seg_end;
    }

    Ok(cond)
}

/// Correlates several templates of one length with the same channel range.
///
/// Each channel segment is transformed once and multiplied with every
/// template spectrum in turn. Every output is bit-identical to a
/// [`correlate_fft_range`] call for its template.
pub fn correlate_fft_many(
    plan: &dyn SpectralTransform,
    ws: &mut Workspace,
    tpls: &[&TemplatePlan],
    channel: &[f32],
    stats: &WindowStats,
    start: usize,
    outs: &mut [&mut [f32]],
) -> SeisCorrResult<Vec<Conditioning>> {
    check_batch(tpls, outs)?;
    let (Some(first), Some(out_len)) = (tpls.first(), outs.first().map(|o| o.len())) else {
        return Ok(Vec::new());
    };
    let m = first.len();
    for tpl in tpls {
        check_range(tpl, channel, stats, start, out_len)?;
    }
    let seg_out = segment_plan(plan, ws, m)?;

    let stds = stats.std();
    let mut conds: Vec<Conditioning> = tpls.iter().map(|t| template_conditioning(t)).collect();
    let mut active = Vec::with_capacity(tpls.len());
    for (k, tpl) in tpls.iter().enumerate() {
        if tpl.is_degenerate() {
            fill_degenerate(&mut *outs[k], stds, start, &mut conds[k]);
        } else {
            active.push(k);
        }
    }
    if active.is_empty() {
        return Ok(conds);
    }

    let bins = plan.spectrum_len();
    let held = active.len().min(SHARED_SPECTRA);
    let mut spectra = HeapAllocator.complex("template spectra", bins * held)?;
    let scale = 1.0 / plan.len() as f32;
    let end = start + out_len;

    for batch in active.chunks(SHARED_SPECTRA) {
        for (&k, dst) in batch.iter().zip(spectra.chunks_mut(bins)) {
            prepare_template(plan, ws, tpls[k])?;
            dst.copy_from_slice(&ws.template_spectrum);
        }

        let mut pos = start;
        while pos < end {
            let seg_end = ((pos / seg_out + 1) * seg_out).min(end);
            let seg_in = seg_end - pos + m - 1;
            load_segment(ws, &channel[pos..pos + seg_in]);
            plan.forward(&mut ws.real, &mut ws.spectrum, &mut ws.scratch)?;

            for (&k, tspec) in batch.iter().zip(spectra.chunks(bins)) {
                // The inverse consumes its input, so each product gets its own copy.
                let (product, spectrum) = (&mut ws.template_spectrum, &ws.spectrum);
                for ((p, x), t) in product.iter_mut().zip(spectrum).zip(tspec) {
                    *p = *x;
                    *p *= *t;
                }
                plan.inverse(&mut ws.template_spectrum, &mut ws.real, &mut ws.scratch)?;

                let out = &mut outs[k];
                let cond = &mut conds[k];
                for i in pos..seg_end {
                    let raw = ws.real[i - pos + m - 1] * scale;
                    out[i - start] = normalize(raw, stds[i], cond);
                }
            }
            pos = seg_end;
        }
    }

    Ok(conds)
}

/// Frequency-domain kernel holding one plan per template length.
pub struct FrequencyDomain {
    plans: Vec<(usize, Arc<dyn SpectralTransform>)>,
}

impl FrequencyDomain {
    /// Builds (or reuses) the plans needed for `template_lens` producing
    /// `out_len` outputs per trace.
    pub fn prepare<B: TransformBackend>(
        cache: &mut PlanCache<B>,
        template_lens: &[usize],
        out_len: usize,
        config: &FftConfig,
    ) -> SeisCorrResult<Self> {
        let mut plans = Vec::with_capacity(template_lens.len());
        for &m in template_lens {
            let plan = cache.get_or_build(config.fft_len(out_len, m))?;
            plans.push((m, plan));
        }
        Ok(Self { plans })
    }

    /// Returns the plan used for templates of length `template_len`.
    pub fn plan_for(&self, template_len: usize) -> SeisCorrResult<&Arc<dyn SpectralTransform>> {
        self.plans
            .iter()
            .find(|(m, _)| *m == template_len)
            .map(|(_, plan)| plan)
            .ok_or(SeisCorrError::InvalidInput("no transform plan for template length"))
    }

    /// Returns the largest transform length held.
    pub fn max_fft_len(&self) -> usize {
        self.plans.iter().map(|(_, p)| p.len()).max().unwrap_or(0)
    }
}

impl Correlator for FrequencyDomain {
    type Workspace = Workspace;

    fn workspace(&self) -> SeisCorrResult<Workspace> {
        let largest = self
            .plans
            .iter()
            .max_by_key(|(_, p)| p.len())
            .map(|(_, p)| p)
            .ok_or(SeisCorrError::InvalidInput("no transform plans prepared"))?;
        Workspace::new(largest.as_ref())
    }

    fn segment_len(&self, template_len: usize) -> usize {
        self.plan_for(template_len)
            .map(|plan| segment_outputs(plan.len(), template_len).max(1))
            .unwrap_or(1)
    }

    fn correlate_range(
        &self,
        ws: &mut Workspace,
        tpl: &TemplatePlan,
        channel: &[f32],
        stats: &WindowStats,
        start: usize,
        out: &mut [f32],
    ) -> SeisCorrResult<Conditioning> {
        let plan = self.plan_for(tpl.len())?;
        ws.ensure(plan.as_ref())?;
        correlate_fft_range(plan.as_ref(), ws, tpl, channel, stats, start, out)
    }

    fn correlate_many(
        &self,
        ws: &mut Workspace,
        tpls: &[&TemplatePlan],
        channel: &[f32],
        stats: &WindowStats,
        start: usize,
        outs: &mut [&mut [f32]],
    ) -> SeisCorrResult<Vec<Conditioning>> {
        check_batch(tpls, outs)?;
        let Some(first) = tpls.first() else {
            return Ok(Vec::new());
        };
        let plan = self.plan_for(first.len())?;
        ws.ensure(plan.as_ref())?;
        if tpls.len() == 1 {
            let cond = correlate_fft_range(
                plan.as_ref(),
                ws,
                first,
                channel,
                stats,
                start,
                &mut *outs[0],
            )?;
            return Ok(vec![cond]);
        }
        correlate_fft_many(plan.as_ref(), ws, tpls, channel, stats, start, outs)
    }
}

#[cfg(test)]
mod tests {
    use super::{correlate_fft_many, correlate_fft_range, segment_outputs, FftConfig};
    use crate::fft::{PlanCache, Workspace};
    use crate::kernel::time::correlate_time_range;
    use crate::stats::WindowStats;
    use crate::template::TemplatePlan;
    use crate::util::SeisCorrError;

    fn signal(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (i as f32 * 0.113).sin() + 0.5 * ((i * 31 % 17) as f32 / 17.0 - 0.5))
            .collect()
    }

    #[test]
    fn fft_len_covers_linear_correlation() {
        let cfg = FftConfig::default();
        let len = cfg.fft_len(1000, 50);
        assert!(len >= 1000 + 2 * 49);
        assert!(segment_outputs(len, 50) >= 1000);

        let capped = FftConfig { max_fft_len: 256 };
        let len = capped.fft_len(100_000, 50);
        assert!(len >= 256);
        assert!(segment_outputs(len, 50) > 0);
    }

    #[test]
    fn segmented_fft_matches_time_domain() {
        let channel = signal(3000);
        let m = 40;
        let tpl = TemplatePlan::new(&channel[500..500 + m]).unwrap();
        let stats = WindowStats::compute(&channel, m).unwrap();

        let mut expected = vec![0.0f32; stats.len()];
        correlate_time_range(&tpl, &channel, &stats, 0, &mut expected).unwrap();

        for cfg in [FftConfig::default(), FftConfig { max_fft_len: 200 }] {
            let mut cache = PlanCache::new();
            let plan = cache.get_or_build(cfg.fft_len(stats.len(), m)).unwrap();
            let mut ws = Workspace::new(plan.as_ref()).unwrap();
            let mut got = vec![0.0f32; stats.len()];
            correlate_fft_range(plan.as_ref(), &mut ws, &tpl, &channel, &stats, 0, &mut got)
                .unwrap();
            for (i, (a, b)) in got.iter().zip(expected.iter()).enumerate() {
                assert!((a - b).abs() < 1e-5, "i={i} fft={a} time={b}");
            }
        }
    }

    #[test]
    fn aligned_split_is_bit_identical() {
        let channel = signal(2000);
        let m = 25;
        let tpl = TemplatePlan::new(&channel[100..100 + m]).unwrap();
        let stats = WindowStats::compute(&channel, m).unwrap();
        let cfg = FftConfig { max_fft_len: 128 };
        let mut cache = PlanCache::new();
        let plan = cache.get_or_build(cfg.fft_len(stats.len(), m)).unwrap();
        let seg = segment_outputs(plan.len(), m);
        let mut ws = Workspace::new(plan.as_ref()).unwrap();

        let mut whole = vec![0.0f32; stats.len()];
        correlate_fft_range(plan.as_ref(), &mut ws, &tpl, &channel, &stats, 0, &mut whole).unwrap();

        let split = 3 * seg;
        let mut tail = vec![0.0f32; stats.len() - split];
        correlate_fft_range(plan.as_ref(), &mut ws, &tpl, &channel, &stats, split, &mut tail)
            .unwrap();
        assert_eq!(&whole[split..], tail.as_slice());
    }

    #[test]
    fn shared_channel_transforms_match_single_calls() {
        let channel = signal(2000);
        let m = 25;
        let stats = WindowStats::compute(&channel, m).unwrap();
        let cfg = FftConfig { max_fft_len: 128 };
        let mut cache = PlanCache::new();
        let plan = cache.get_or_build(cfg.fft_len(stats.len(), m)).unwrap();
        let mut ws = Workspace::new(plan.as_ref()).unwrap();

        // More templates than one batch of held spectra, one of them flat.
        let mut tpls: Vec<TemplatePlan> = (0..35)
            .map(|k| TemplatePlan::new(&channel[k * 40..k * 40 + m]).unwrap())
            .collect();
        tpls[7] = TemplatePlan::new(&[2.5; 25]).unwrap();
        let refs: Vec<&TemplatePlan> = tpls.iter().collect();

        let start = 40;
        let len = stats.len() - start - 3;
        let mut data = vec![0.0f32; refs.len() * len];
        let mut outs: Vec<&mut [f32]> = data.chunks_mut(len).collect();
        let conds =
            correlate_fft_many(plan.as_ref(), &mut ws, &refs, &channel, &stats, start, &mut outs)
                .unwrap();
        assert_eq!(conds.len(), refs.len());
        assert!(conds[7].degenerate_template);

        for (k, tpl) in refs.iter().enumerate() {
            let mut single = vec![0.0f32; len];
            let cond = correlate_fft_range(
                plan.as_ref(),
                &mut ws,
                tpl,
                &channel,
                &stats,
                start,
                &mut single,
            )
            .unwrap();
            assert_eq!(&data[k * len..(k + 1) * len], single.as_slice(), "template {k}");
            assert_eq!(conds[k], cond);
        }
    }

    #[test]
    fn batch_rejects_mixed_lengths() {
        let channel = signal(500);
        let stats = WindowStats::compute(&channel, 20).unwrap();
        let mut cache = PlanCache::new();
        let plan = cache.get_or_build(256).unwrap();
        let mut ws = Workspace::new(plan.as_ref()).unwrap();
        let a = TemplatePlan::new(&channel[..20]).unwrap();
        let b = TemplatePlan::new(&channel[..30]).unwrap();
        let mut data = vec![0.0f32; 20];
        let mut outs: Vec<&mut [f32]> = data.chunks_mut(10).collect();
        assert_eq!(
            correlate_fft_many(plan.as_ref(), &mut ws, &[&a, &b], &channel, &stats, 0, &mut outs)
                .err()
                .unwrap(),
            SeisCorrError::ShapeMismatch {
                expected: 20,
                got: 30
            }
        );
    }
}

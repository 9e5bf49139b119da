//! Time-domain normalized cross-correlation.

use crate::kernel::{check_range, normalize, template_conditioning, Correlator};
use crate::stats::{Conditioning, WindowStats};
use crate::template::TemplatePlan;
use crate::util::SeisCorrResult;

/// Direct sliding-window kernel.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeDomain;

/// `sum(t[i] * (w[i] - mean))` with the scalar loop.
#[inline]
pub(crate) fn centered_dot_scalar(t: &[f32], w: &[f32], mean: f32) -> f32 {
    let mut acc = 0.0f32;
    for (&a, &b) in t.iter().zip(w.iter()) {
        acc += a * (b - mean);
    }
    acc
}

#[inline]
fn centered_dot(t: &[f32], w: &[f32], mean: f32) -> f32 {
    #[cfg(feature = "simd")]
    {
        crate::kernel::simd::centered_dot(t, w, mean)
    }
    #[cfg(not(feature = "simd"))]
    {
        centered_dot_scalar(t, w, mean)
    }
}

/// Correlates window starts `start..start + out.len()` in the time domain.
pub fn correlate_time_range(
    tpl: &TemplatePlan,
    channel: &[f32],
    stats: &WindowStats,
    start: usize,
    out: &mut [f32],
) -> SeisCorrResult<Conditioning> {
    check_range(tpl, channel, stats, start, out.len())?;

    let m = tpl.len();
    let t = tpl.normalized();
    let means = stats.mean();
    let stds = stats.std();
    let mut cond = template_conditioning(tpl);

    for (k, value) in out.iter_mut().enumerate() {
        let i = start + k;
        let std = stds[i];
        let raw = if std == 0.0 || tpl.is_degenerate() {
            0.0
        } else {
            centered_dot(t, &channel[i..i + m], means[i])
        };
        *value = normalize(raw, std, &mut cond);
    }

    Ok(cond)
}

impl Correlator for TimeDomain {
    type Workspace = ();

    fn workspace(&self) -> SeisCorrResult<()> {
        Ok(())
    }

    fn segment_len(&self, _template_len: usize) -> usize {
        1
    }

    fn correlate_range(
        &self,
        _ws: &mut (),
        tpl: &TemplatePlan,
        channel: &[f32],
        stats: &WindowStats,
        start: usize,
        out: &mut [f32],
    ) -> SeisCorrResult<Conditioning> {
        correlate_time_range(tpl, channel, stats, start, out)
    }
}

#[cfg(test)]
mod tests {
    use super::correlate_time_range;
    use crate::stats::{Status, WindowStats};
    use crate::template::TemplatePlan;

    fn pearson(a: &[f32], b: &[f32]) -> f64 {
        let n = a.len() as f64;
        let ma = a.iter().map(|&v| v as f64).sum::<f64>() / n;
        let mb = b.iter().map(|&v| v as f64).sum::<f64>() / n;
        let mut num = 0.0;
        let mut da = 0.0;
        let mut db = 0.0;
        for (&x, &y) in a.iter().zip(b.iter()) {
            let x = x as f64 - ma;
            let y = y as f64 - mb;
            num += x * y;
            da += x * x;
            db += y * y;
        }
        num / (da * db).sqrt()
    }

    #[test]
    fn time_correlation_matches_pearson() {
        let channel: Vec<f32> = (0..200)
            .map(|i| (i as f32 * 0.37).sin() + 0.3 * ((i * 7 % 13) as f32 - 6.0))
            .collect();
        let template: Vec<f32> = channel[40..72].to_vec();
        let plan = TemplatePlan::new(&template).unwrap();
        let stats = WindowStats::compute(&channel, template.len()).unwrap();
        let mut out = vec![0.0f32; stats.len()];
        let cond = correlate_time_range(&plan, &channel, &stats, 0, &mut out).unwrap();
        assert_eq!(cond.status(), Status::Clean);
        assert_eq!(cond.windows, out.len());

        for (i, &value) in out.iter().enumerate() {
            let expected = pearson(&template, &channel[i..i + template.len()]);
            assert!((value as f64 - expected).abs() < 1e-4, "i={i}");
        }
        assert!((out[40] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn range_offset_matches_full_scan() {
        let channel: Vec<f32> = (0..64).map(|i| ((i * 5 % 11) as f32).cos()).collect();
        let plan = TemplatePlan::new(&channel[3..11]).unwrap();
        let stats = WindowStats::compute(&channel, 8).unwrap();
        let mut full = vec![0.0f32; stats.len()];
        correlate_time_range(&plan, &channel, &stats, 0, &mut full).unwrap();
        let mut part = vec![0.0f32; 10];
        correlate_time_range(&plan, &channel, &stats, 20, &mut part).unwrap();
        assert_eq!(&full[20..30], part.as_slice());
    }

    #[test]
    fn out_of_range_request_is_rejected() {
        let channel = vec![1.0f32, 2.0, 3.0, 4.0];
        let plan = TemplatePlan::new(&[1.0, 2.0]).unwrap();
        let stats = WindowStats::compute(&channel, 2).unwrap();
        let mut out = vec![0.0f32; 3];
        assert!(correlate_time_range(&plan, &channel, &stats, 1, &mut out).is_err());
    }
}

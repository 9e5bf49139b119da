//! Three-point parabolic interpolation of correlation maxima.

/// Curvature below which the fit is treated as flat.
const MIN_CURVATURE: f32 = 1e-6;

/// Sub-sample offset of the vertex of a parabola through three samples.
///
/// `prev`, `peak` and `next` are the trace values at offsets `-1`, `0` and
/// `+1`. Returns the vertex offset in `[-1, 1]`, or `None` when the samples
/// are not finite or the parabola is not concave.
pub fn quad_peak_offset_1d(prev: f32, peak: f32, next: f32) -> Option<f32> {
    if !(prev.is_finite() && peak.is_finite() && next.is_finite()) {
        return None;
    }
    let curvature = prev - 2.0 * peak + next;
    if curvature > -MIN_CURVATURE {
        return None;
    }
    let offset = 0.5 * (prev - next) / curvature;
    (offset.is_finite() && offset.abs() <= 1.0).then_some(offset)
}

#[cfg(test)]
mod tests {
    use super::quad_peak_offset_1d;

    #[test]
    fn symmetric_samples_give_zero_offset() {
        let dx = quad_peak_offset_1d(0.6, 0.95, 0.6).unwrap();
        assert!(dx.abs() < 1e-6);
    }

    #[test]
    fn recovers_vertex_of_sampled_parabola() {
        let f = |x: f32| 0.9 - 0.3 * (x + 0.4).powi(2);
        let dx = quad_peak_offset_1d(f(-1.0), f(0.0), f(1.0)).unwrap();
        assert!((dx + 0.4).abs() < 1e-5);
    }

    #[test]
    fn rejects_flat_convex_and_nan() {
        assert!(quad_peak_offset_1d(0.5, 0.5, 0.5).is_none());
        assert!(quad_peak_offset_1d(0.8, 0.2, 0.8).is_none());
        assert!(quad_peak_offset_1d(f32::NAN, 0.9, 0.1).is_none());
    }
}

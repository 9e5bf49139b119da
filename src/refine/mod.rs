//! Sub-sample refinement of correlation peaks.

use crate::candidate::Polarity;

mod quad1d;

pub use quad1d::quad_peak_offset_1d;

/// Refined position of the positive maximum at `index` of `trace`.
pub fn refine_peak(trace: &[f32], index: usize) -> f32 {
    refine_peak_with(trace, index, Polarity::Positive)
}

/// Refined position of the maximum at `index`, fitted on `polarity` keys.
///
/// Falls back to `index` itself at the trace boundaries or when the
/// neighbourhood is not a concave maximum.
pub fn refine_peak_with(trace: &[f32], index: usize, polarity: Polarity) -> f32 {
    if index == 0 || index + 1 >= trace.len() {
        return index as f32;
    }
    let key = |i: usize| polarity.key(trace[i]);
    match quad_peak_offset_1d(key(index - 1), key(index), key(index + 1)) {
        Some(dx) => index as f32 + dx,
        None => index as f32,
    }
}

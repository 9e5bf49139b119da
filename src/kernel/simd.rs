//! SIMD-accelerated dot products using the `wide` crate.
//!
//! The template loop of the time-domain kernel is vectorized to process 8
//! samples at a time using `f32x8`; the tail falls back to the scalar loop.

use crate::kernel::time::centered_dot_scalar;
use wide::f32x8;

const LANES: usize = 8;

/// Load 8 f32 values into f32x8.
#[inline]
fn load_f32x8(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

/// Horizontal sum of f32x8.
#[inline]
fn hsum(v: f32x8) -> f32 {
    let arr = v.to_array();
    arr[0] + arr[1] + arr[2] + arr[3] + arr[4] + arr[5] + arr[6] + arr[7]
}

/// `sum(t[i] * (w[i] - mean))`, eight lanes at a time.
#[inline]
pub(crate) fn centered_dot(t: &[f32], w: &[f32], mean: f32) -> f32 {
    let len = t.len().min(w.len());
    let simd_end = len / LANES * LANES;
    let mean_vec = f32x8::splat(mean);
    let mut acc = f32x8::ZERO;
    let mut idx = 0;
    while idx < simd_end {
        let tv = load_f32x8(&t[idx..idx + LANES]);
        let wv = load_f32x8(&w[idx..idx + LANES]);
        acc += tv * (wv - mean_vec);
        idx += LANES;
    }
    hsum(acc) + centered_dot_scalar(&t[simd_end..len], &w[simd_end..len], mean)
}

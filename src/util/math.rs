//! Numeric helpers for transform sizing and trace summaries.

/// Returns the smallest 5-smooth integer (`2^a * 3^b * 5^c`) that is `>= n`.
///
/// Mixed-radix FFTs are fastest on such lengths. `n == 0` maps to 1.
pub(crate) fn next_fast_len(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    let mut best = n.next_power_of_two();
    let mut p5 = 1usize;
    while p5 < best {
        let mut p35 = p5;
        while p35 < best {
            // Smallest power of two lifting p35 to at least n.
            let mut candidate = p35;
            while candidate < n {
                candidate *= 2;
            }
            if candidate < best {
                best = candidate;
            }
            p35 *= 3;
        }
        p5 *= 5;
    }
    best
}

/// Median of `|x|` over the finite values, or 0 for an empty input.
pub(crate) fn median_abs(values: &[f32]) -> f32 {
    let mut mags: Vec<f32> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| v.abs())
        .collect();
    if mags.is_empty() {
        return 0.0;
    }
    mags.sort_by(f32::total_cmp);
    let mid = mags.len() / 2;
    if mags.len() % 2 == 0 {
        0.5 * (mags[mid - 1] + mags[mid])
    } else {
        mags[mid]
    }
}

/// Mean of the finite values in f64, or 0 for an empty input.
pub(crate) fn mean_f64(values: &[f32]) -> f64 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for &v in values {
        if v.is_finite() {
            sum += v as f64;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

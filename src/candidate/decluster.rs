//! Minimum-separation declustering of candidate peaks.

use std::cmp::Ordering;

use crate::candidate::{Peak, Polarity};

/// Declustering options.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeclusterConfig {
    /// Candidates closer than this many samples belong to one cluster.
    pub min_separation: usize,
    /// Candidates whose key is below this value are dropped first.
    pub threshold: Option<f32>,
    /// Sign convention for thresholding and ranking.
    pub polarity: Polarity,
}

/// Keeps the strongest peak of every cluster of candidates closer than
/// `min_separation` samples.
pub fn decluster(peaks: &[Peak], min_separation: usize) -> Vec<Peak> {
    decluster_with(
        peaks,
        &DeclusterConfig {
            min_separation,
            ..DeclusterConfig::default()
        },
    )
}

/// Declusters `peaks` using `config`.
///
/// Candidates are sorted by index and chained into clusters while the gap to
/// the previous candidate is below the separation, so proximity is
/// transitive. Each cluster keeps its strongest member; ties go to the
/// smaller index and NaN loses to any number. The output is ordered by index,
/// never longer than the input, and unchanged by a second pass.
pub fn decluster_with(peaks: &[Peak], config: &DeclusterConfig) -> Vec<Peak> {
    let polarity = config.polarity;
    let mut sorted: Vec<Peak> = peaks
        .iter()
        .copied()
        .filter(|p| match config.threshold {
            Some(t) => polarity.key(p.value) >= t,
            None => true,
        })
        .collect();
    sorted.sort_by_key(|p| p.index);

    let mut kept: Vec<Peak> = Vec::with_capacity(sorted.len());
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return kept;
    };
    let mut best = first;
    let mut last_index = first.index;
    for peak in iter {
        if peak.index - last_index < config.min_separation {
            if polarity.cmp_strength(peak.value, best.value) == Ordering::Greater {
                best = peak;
            }
        } else {
            kept.push(best);
            best = peak;
        }
        last_index = peak.index;
    }
    kept.push(best);
    kept
}

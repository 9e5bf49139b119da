//! Work partitioning across worker threads.
//!
//! Work is cut into independent units, each owning a disjoint slice of the
//! output. With the `rayon` feature the units run on a thread pool that lives
//! for one call; without it, or with a single worker, they run in order on the
//! calling thread. Per-unit results come back in unit order, so callers reduce
//! them without locks.

use std::num::NonZeroUsize;

use crate::util::SeisCorrResult;

#[cfg(feature = "rayon")]
mod pool;

/// Worker count for a call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Parallelism {
    threads: Option<NonZeroUsize>,
}

impl Parallelism {
    /// Uses the platform's available hardware parallelism.
    pub fn available() -> Self {
        Self { threads: None }
    }

    /// Runs everything on the calling thread.
    pub fn sequential() -> Self {
        Self {
            threads: Some(NonZeroUsize::MIN),
        }
    }

    /// Uses exactly `threads` workers (0 is treated as 1).
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads: Some(NonZeroUsize::new(threads).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Resolved worker count.
    pub fn threads(&self) -> usize {
        match self.threads {
            Some(n) => n.get(),
            None => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

/// Dimension along which a multi-trace call is split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    /// One unit per template, covering all channels.
    Templates,
    /// One unit per channel, covering all templates.
    Channels,
    /// One trace split into ranges of window positions.
    Segments,
}

impl Axis {
    /// Short name used in trace events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Templates => "templates",
            Axis::Channels => "channels",
            Axis::Segments => "segments",
        }
    }
}

/// Picks the split axis: the larger of templates and channels, ties going to
/// templates; a single pair is split along time.
pub fn choose_axis(n_templates: usize, n_channels: usize) -> Axis {
    if n_templates.saturating_mul(n_channels) <= 1 {
        Axis::Segments
    } else if n_templates >= n_channels {
        Axis::Templates
    } else {
        Axis::Channels
    }
}

/// Splits `total` positions into about `workers` chunks whose sizes are
/// multiples of `align` (except the last).
pub(crate) fn chunk_len(total: usize, workers: usize, align: usize) -> usize {
    let align = align.max(1);
    let per_worker = total.div_ceil(workers.max(1)).max(1);
    per_worker.div_ceil(align) * align
}

/// Runs `work` over `units` with per-worker state from `init`.
///
/// Results are returned in unit order. The first error stops the call; every
/// worker state created so far is dropped before returning.
pub(crate) fn run<U, W, R, I, F>(
    parallelism: &Parallelism,
    units: Vec<U>,
    init: I,
    work: F,
) -> SeisCorrResult<Vec<R>>
where
    U: Send,
    R: Send,
    I: Fn() -> SeisCorrResult<W> + Sync + Send,
    F: Fn(&mut W, U) -> SeisCorrResult<R> + Sync + Send,
{
    #[cfg(feature = "rayon")]
    {
        let threads = parallelism.threads();
        if threads > 1 && units.len() > 1 {
            return pool::run(threads, units, init, work);
        }
    }
    #[cfg(not(feature = "rayon"))]
    let _ = parallelism;

    let mut worker = init()?;
    units
        .into_iter()
        .map(|unit| work(&mut worker, unit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{choose_axis, chunk_len, run, Axis, Parallelism};
    use crate::util::SeisCorrError;

    #[test]
    fn axis_follows_larger_dimension() {
        assert_eq!(choose_axis(1, 1), Axis::Segments);
        assert_eq!(choose_axis(8, 3), Axis::Templates);
        assert_eq!(choose_axis(3, 8), Axis::Channels);
        assert_eq!(choose_axis(4, 4), Axis::Templates);
    }

    #[test]
    fn parallelism_resolves_thread_counts() {
        assert_eq!(Parallelism::sequential().threads(), 1);
        assert_eq!(Parallelism::with_threads(0).threads(), 1);
        assert_eq!(Parallelism::with_threads(6).threads(), 6);
        assert!(Parallelism::available().threads() >= 1);
    }

    #[test]
    fn chunks_are_aligned() {
        assert_eq!(chunk_len(100, 4, 1), 25);
        assert_eq!(chunk_len(100, 3, 1), 34);
        assert_eq!(chunk_len(100, 4, 30), 30);
        assert_eq!(chunk_len(5, 8, 1), 1);
    }

    #[test]
    fn run_preserves_unit_order() {
        for threads in [1, 4] {
            let par = Parallelism::with_threads(threads);
            let out = run(
                &par,
                (0..50).collect(),
                || Ok(0usize),
                |calls, unit: usize| {
                    *calls += 1;
                    Ok(unit * 2)
                },
            )
            .unwrap();
            assert_eq!(out, (0..50).map(|v| v * 2).collect::<Vec<_>>());
        }
    }

    #[test]
    fn run_propagates_first_failure() {
        let par = Parallelism::with_threads(2);
        let err = run(
            &par,
            (0..20).collect(),
            || Ok(()),
            |_, unit: usize| {
                if unit == 7 {
                    Err(SeisCorrError::InvalidInput("unit failed"))
                } else {
                    Ok(unit)
                }
            },
        )
        .err()
        .unwrap();
        assert_eq!(err, SeisCorrError::InvalidInput("unit failed"));
    }

    #[test]
    fn init_failure_is_reported() {
        let par = Parallelism::sequential();
        let err = run(
            &par,
            vec![1, 2, 3],
            || Err::<(), _>(SeisCorrError::InvalidInput("no init")),
            |_, unit: i32| Ok(unit),
        )
        .err()
        .unwrap();
        assert_eq!(err, SeisCorrError::InvalidInput("no init"));
    }
}

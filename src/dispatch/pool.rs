//! Rayon-backed execution of dispatcher units (feature-gated).
//!
//! A pool of exactly the requested size is built at call entry and joined
//! before returning, so no thread state survives between calls.

use crate::trace::trace_event;
use crate::util::{SeisCorrError, SeisCorrResult};
use rayon::prelude::*;

/// Runs `work` over `units` on a fresh pool of `threads` workers.
///
/// Each rayon job gets its own worker state from `init`; states are never
/// shared between concurrently running jobs.
pub(crate) fn run<U, W, R, I, F>(
    threads: usize,
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
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| SeisCorrError::ThreadPool(e.to_string()))?;
    trace_event!("pool_started", threads = threads, units = units.len());

    pool.install(|| {
        units
            .into_par_iter()
            .map_init(&init, |worker, unit| match worker {
                Ok(state) => work(state, unit),
                Err(err) => Err(err.clone()),
            })
            .collect()
    })
}

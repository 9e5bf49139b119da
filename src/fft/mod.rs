//! Transform plans and their cache.
//!
//! The frequency-domain correlator only sees [`SpectralTransform`]: a fixed
//! length real-to-complex forward transform and its complex-to-real inverse.
//! Plans come from a [`TransformBackend`]; [`RealFftBackend`] is the default
//! implementation on top of `realfft`. [`PlanCache`] keys built plans by
//! length so repeated calls with the same length reuse them.

use std::collections::HashMap;
use std::sync::Arc;

use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::trace::trace_event;
use crate::util::{SeisCorrError, SeisCorrResult};

mod workspace;

pub use workspace::{HeapAllocator, ScratchAllocator, Workspace};

/// A planned real transform of one fixed length.
///
/// Plans describe a transform, not live data, so they are shared read-only
/// between workers; every call brings its own buffers.
pub trait SpectralTransform: Send + Sync {
    /// Transform length in real samples.
    fn len(&self) -> usize;

    /// Number of complex bins in the half spectrum.
    fn spectrum_len(&self) -> usize {
        self.len() / 2 + 1
    }

    /// Complex scratch elements needed by either direction.
    fn scratch_len(&self) -> usize;

    /// Forward transform. `input` is used as scratch and left unspecified.
    fn forward(
        &self,
        input: &mut [f32],
        spectrum: &mut [Complex32],
        scratch: &mut [Complex32],
    ) -> SeisCorrResult<()>;

    /// Unnormalized inverse transform. `spectrum` is left unspecified.
    fn inverse(
        &self,
        spectrum: &mut [Complex32],
        output: &mut [f32],
        scratch: &mut [Complex32],
    ) -> SeisCorrResult<()>;
}

/// Builds transform plans.
pub trait TransformBackend {
    /// Builds a plan for transforms of `len` samples.
    fn plan(&mut self, len: usize) -> SeisCorrResult<Arc<dyn SpectralTransform>>;
}

/// Default backend on top of `realfft`.
pub struct RealFftBackend {
    planner: RealFftPlanner<f32>,
}

impl RealFftBackend {
    /// Creates a backend with an empty planner.
    pub fn new() -> Self {
        Self {
            planner: RealFftPlanner::new(),
        }
    }
}

impl Default for RealFftBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformBackend for RealFftBackend {
    fn plan(&mut self, len: usize) -> SeisCorrResult<Arc<dyn SpectralTransform>> {
        if len == 0 {
            return Err(SeisCorrError::PlanFailed {
                len,
                reason: "zero-length transform".to_string(),
            });
        }
        let forward = self.planner.plan_fft_forward(len);
        let inverse = self.planner.plan_fft_inverse(len);
        let scratch_len = forward.get_scratch_len().max(inverse.get_scratch_len());
        Ok(Arc::new(RealFftTransform {
            len,
            forward,
            inverse,
            scratch_len,
        }))
    }
}

struct RealFftTransform {
    len: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    scratch_len: usize,
}

impl SpectralTransform for RealFftTransform {
    fn len(&self) -> usize {
        self.len
    }

    fn scratch_len(&self) -> usize {
        self.scratch_len
    }

    fn forward(
        &self,
        input: &mut [f32],
        spectrum: &mut [Complex32],
        scratch: &mut [Complex32],
    ) -> SeisCorrResult<()> {
        let scratch_len = self.forward.get_scratch_len();
        let got = scratch.len();
        let scratch = scratch
            .get_mut(..scratch_len)
            .ok_or(SeisCorrError::BufferTooSmall {
                needed: scratch_len,
                got,
            })?;
        self.forward
            .process_with_scratch(input, spectrum, scratch)
            .map_err(|e| SeisCorrError::Transform(e.to_string()))
    }

    fn inverse(
        &self,
        spectrum: &mut [Complex32],
        output: &mut [f32],
        scratch: &mut [Complex32],
    ) -> SeisCorrResult<()> {
        // The real inverse requires purely real DC (and Nyquist) bins.
        if let Some(first) = spectrum.first_mut() {
            first.im = 0.0;
        }
        if self.len % 2 == 0 {
            if let Some(last) = spectrum.last_mut() {
                last.im = 0.0;
            }
        }
        let scratch_len = self.inverse.get_scratch_len();
        let got = scratch.len();
        let scratch = scratch
            .get_mut(..scratch_len)
            .ok_or(SeisCorrError::BufferTooSmall {
                needed: scratch_len,
                got,
            })?;
        self.inverse
            .process_with_scratch(spectrum, output, scratch)
            .map_err(|e| SeisCorrError::Transform(e.to_string()))
    }
}

/// Cache of transform plans keyed by length.
pub struct PlanCache<B = RealFftBackend> {
    backend: B,
    plans: HashMap<usize, Arc<dyn SpectralTransform>>,
}

impl PlanCache<RealFftBackend> {
    /// Creates an empty cache on the default backend.
    pub fn new() -> Self {
        Self::with_backend(RealFftBackend::new())
    }
}

impl Default for PlanCache<RealFftBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: TransformBackend> PlanCache<B> {
    /// Creates an empty cache on a custom backend.
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            plans: HashMap::new(),
        }
    }

    /// Returns the plan for `len`, building it on first use.
    ///
    /// A failed build leaves the cache unchanged.
    pub fn get_or_build(&mut self, len: usize) -> SeisCorrResult<Arc<dyn SpectralTransform>> {
        if let Some(plan) = self.plans.get(&len) {
            return Ok(Arc::clone(plan));
        }
        let plan = self.backend.plan(len)?;
        if plan.len() != len {
            return Err(SeisCorrError::PlanFailed {
                len,
                reason: format!("backend returned a plan of length {}", plan.len()),
            });
        }
        trace_event!("plan_built", len = len);
        self.plans.insert(len, Arc::clone(&plan));
        Ok(plan)
    }

    /// Returns a cached plan without building.
    pub fn get(&self, len: usize) -> Option<Arc<dyn SpectralTransform>> {
        self.plans.get(&len).cloned()
    }

    /// Number of cached plans.
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// True if no plan has been built.
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Drops every cached plan. Plans still held by callers stay alive.
    pub fn clear(&mut self) {
        self.plans.clear();
    }
}

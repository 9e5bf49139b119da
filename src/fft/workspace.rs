//! Per-worker scratch buffers for the frequency-domain correlator.

use realfft::num_complex::Complex32;

use crate::fft::SpectralTransform;
use crate::util::{SeisCorrError, SeisCorrResult};

/// Source of scratch buffers.
///
/// Allocation failure is reported as an error instead of aborting, so a
/// workspace that fails half-way through construction unwinds cleanly.
pub trait ScratchAllocator {
    /// Allocates a zeroed real buffer of `len` samples.
    fn real(&mut self, what: &'static str, len: usize) -> SeisCorrResult<Vec<f32>>;

    /// Allocates a zeroed complex buffer of `len` bins.
    fn complex(&mut self, what: &'static str, len: usize) -> SeisCorrResult<Vec<Complex32>>;
}

/// Heap allocator that reports exhaustion through `try_reserve_exact`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapAllocator;

impl ScratchAllocator for HeapAllocator {
    fn real(&mut self, what: &'static str, len: usize) -> SeisCorrResult<Vec<f32>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| SeisCorrError::AllocationFailed { what, len })?;
        buf.resize(len, 0.0);
        Ok(buf)
    }

    fn complex(&mut self, what: &'static str, len: usize) -> SeisCorrResult<Vec<Complex32>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| SeisCorrError::AllocationFailed { what, len })?;
        buf.resize(len, Complex32::new(0.0, 0.0));
        Ok(buf)
    }
}

/// Scratch buffers sized for one transform length.
///
/// Owned by exactly one worker at a time. Dropping the workspace releases
/// every buffer, including on early-return paths.
pub struct Workspace {
    len: usize,
    pub(crate) real: Vec<f32>,
    pub(crate) spectrum: Vec<Complex32>,
    pub(crate) template_spectrum: Vec<Complex32>,
    pub(crate) scratch: Vec<Complex32>,
}

impl Workspace {
    /// Number of buffers a workspace owns.
    pub const BUFFERS: usize = 4;

    /// Allocates a workspace for `plan` on the heap.
    pub fn new(plan: &dyn SpectralTransform) -> SeisCorrResult<Self> {
        Self::with_allocator(plan, &mut HeapAllocator)
    }

    /// Allocates a workspace for `plan` from `alloc`.
    ///
    /// If any allocation fails the buffers acquired so far are released
    /// before the error is returned.
    pub fn with_allocator(
        plan: &dyn SpectralTransform,
        alloc: &mut dyn ScratchAllocator,
    ) -> SeisCorrResult<Self> {
        let len = plan.len();
        let bins = plan.spectrum_len();
        let real = alloc.real("transform input", len)?;
        let spectrum = alloc.complex("channel spectrum", bins)?;
        let template_spectrum = alloc.complex("template spectrum", bins)?;
        let scratch = alloc.complex("transform scratch", plan.scratch_len())?;
        Ok(Self {
            len,
            real,
            spectrum,
            template_spectrum,
            scratch,
        })
    }

    /// Transform length the buffers are sized for.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the workspace holds no transform length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resizes the buffers for `plan` if it has a different length.
    pub(crate) fn ensure(&mut self, plan: &dyn SpectralTransform) -> SeisCorrResult<()> {
        if self.len == plan.len() && self.scratch.len() >= plan.scratch_len() {
            return Ok(());
        }
        *self = Self::new(plan)?;
        Ok(())
    }

    /// Releases the buffers and returns how many were released.
    pub fn release(self) -> usize {
        let Self {
            real,
            spectrum,
            template_spectrum,
            scratch,
            ..
        } = self;
        drop(real);
        drop(spectrum);
        drop(template_spectrum);
        drop(scratch);
        Self::BUFFERS
    }
}

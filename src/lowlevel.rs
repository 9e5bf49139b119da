//! Low-level building blocks for custom correlation pipelines.
//!
//! These expose window statistics, kernels, transform plans and workspaces
//! for callers that manage their own buffers and plans across many calls.
//! Most users should prefer [`crate::correlate`] and [`crate::Detector`].

pub use crate::detect::{stack_channels, StackedTraces};
pub use crate::dispatch::{choose_axis, Axis};
pub use crate::fft::{
    HeapAllocator, PlanCache, RealFftBackend, ScratchAllocator, SpectralTransform, TransformBackend,
    Workspace,
};
pub use crate::kernel::fft::{correlate_fft_many, correlate_fft_range};
pub use crate::kernel::time::correlate_time_range;
pub use crate::kernel::{Correlator, FrequencyDomain, TimeDomain};
pub use crate::refine::{quad_peak_offset_1d, refine_peak, refine_peak_with};
pub use crate::stats::WindowStats;

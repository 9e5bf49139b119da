//! Shared utility helpers.

pub mod error;
pub(crate) mod math;

pub use error::{SeisCorrError, SeisCorrResult};

/// Rejects buffers that contain NaN or infinite samples.
pub(crate) fn ensure_finite(data: &[f32]) -> SeisCorrResult<()> {
    match data.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(SeisCorrError::NonFinite { index }),
        None => Ok(()),
    }
}

/// Allocates a zeroed `f32` buffer, reporting allocation failure as an error.
pub(crate) fn try_zeroed(len: usize, what: &'static str) -> SeisCorrResult<Vec<f32>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| SeisCorrError::AllocationFailed { what, len })?;
    buf.resize(len, 0.0);
    Ok(buf)
}

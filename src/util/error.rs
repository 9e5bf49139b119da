//! Error types for seiscorr.

use thiserror::Error;

/// Result alias for seiscorr operations.
pub type SeisCorrResult<T> = std::result::Result<T, SeisCorrError>;

/// Errors that can occur when running seiscorr algorithms.
///
/// Low-variance input is not an error: it is reported through
/// [`Conditioning`](crate::Conditioning) on the successful result.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SeisCorrError {
    /// A buffer length or a buffer count is zero.
    #[error("invalid dimensions: len={len}, count={count}")]
    InvalidDimensions { len: usize, count: usize },
    /// Stride is smaller than the signal length.
    #[error("invalid stride: len={len}, stride={stride}")]
    InvalidStride { len: usize, stride: usize },
    /// The backing buffer is too small for the requested layout.
    #[error("buffer too small: needed={needed}, got={got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// The template does not fit inside the channel.
    #[error("template of {template_len} samples is longer than channel of {channel_len}")]
    TemplateTooLong {
        template_len: usize,
        channel_len: usize,
    },
    /// A sample is NaN or infinite.
    #[error("non-finite sample at index {index}")]
    NonFinite { index: usize },
    /// Two related inputs disagree in size.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
    /// A scratch or output buffer could not be allocated.
    #[error("failed to allocate {what} of {len} elements")]
    AllocationFailed { what: &'static str, len: usize },
    /// A transform plan could not be built.
    #[error("failed to build transform plan of length {len}: {reason}")]
    PlanFailed { len: usize, reason: String },
    /// The transform backend reported a failure while executing.
    #[error("transform failed: {0}")]
    Transform(String),
    /// The worker pool could not be started.
    #[error("thread pool: {0}")]
    ThreadPool(String),
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

//! Borrowed views over blocks of equal-length signals.
//!
//! `SignalBlock` is a borrowed view of `count` signals of `len` samples each,
//! laid out in one flat buffer with an explicit stride. The stride counts
//! samples between the starts of consecutive signals, so a stride larger than
//! the length represents padded rows. Sub-blocks are zero-copy views into the
//! same backing slice and retain the original stride.

use crate::util::{ensure_finite, SeisCorrError, SeisCorrResult};

/// Borrowed block of equal-length signals with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct SignalBlock<'a> {
    data: &'a [f32],
    len: usize,
    count: usize,
    stride: usize,
}

impl<'a> SignalBlock<'a> {
    /// Creates a contiguous block with `stride == len`.
    pub fn from_slice(data: &'a [f32], count: usize, len: usize) -> SeisCorrResult<Self> {
        Self::new(data, count, len, len)
    }

    /// Wraps a single signal as a block of one.
    pub fn single(data: &'a [f32]) -> SeisCorrResult<Self> {
        Self::new(data, 1, data.len(), data.len())
    }

    /// Creates a block with an explicit stride.
    pub fn new(data: &'a [f32], count: usize, len: usize, stride: usize) -> SeisCorrResult<Self> {
        let needed = required_len(len, count, stride)?;
        if data.len() < needed {
            return Err(SeisCorrError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            len,
            count,
            stride,
        })
    }

    /// Returns the number of samples per signal.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the number of signals.
    pub fn count(&self) -> usize {
        self.count
    }

    /// True if the block holds no samples; blocks from the constructors never are.
    pub fn is_empty(&self) -> bool {
        self.len == 0 || self.count == 0
    }

    /// Returns the stride in samples between signal starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the backing slice including any padding.
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// Returns signal `idx` with length `len`.
    pub fn signal(&self, idx: usize) -> Option<&'a [f32]> {
        if idx >= self.count {
            return None;
        }
        let start = idx.checked_mul(self.stride)?;
        let end = start.checked_add(self.len)?;
        self.data.get(start..end)
    }

    /// Iterates over the signals in order.
    pub fn signals(&self) -> impl Iterator<Item = &'a [f32]> + '_ {
        (0..self.count).filter_map(move |idx| self.signal(idx))
    }

    /// Returns a zero-copy view of `count` signals starting at `first`.
    pub fn sub_block(&self, first: usize, count: usize) -> SeisCorrResult<SignalBlock<'a>> {
        if count == 0 {
            return Err(SeisCorrError::InvalidDimensions {
                len: self.len,
                count,
            });
        }
        let end = first
            .checked_add(count)
            .ok_or(SeisCorrError::InvalidInput("sub-block range overflows"))?;
        if end > self.count {
            return Err(SeisCorrError::ShapeMismatch {
                expected: self.count,
                got: end,
            });
        }
        let start = first
            .checked_mul(self.stride)
            .ok_or(SeisCorrError::InvalidInput("sub-block offset overflows"))?;
        let data = self
            .data
            .get(start..)
            .ok_or(SeisCorrError::BufferTooSmall {
                needed: start.saturating_add(1),
                got: self.data.len(),
            })?;
        SignalBlock::new(data, count, self.len, self.stride)
    }

    /// Rejects blocks holding NaN or infinite samples.
    ///
    /// The reported index is relative to the start of the backing slice.
    pub fn ensure_finite(&self) -> SeisCorrResult<()> {
        for idx in 0..self.count {
            let start = idx * self.stride;
            if let Some(signal) = self.signal(idx) {
                ensure_finite(signal).map_err(|err| match err {
                    SeisCorrError::NonFinite { index } => SeisCorrError::NonFinite {
                        index: start + index,
                    },
                    other => other,
                })?;
            }
        }
        Ok(())
    }
}

fn required_len(len: usize, count: usize, stride: usize) -> SeisCorrResult<usize> {
    if len == 0 || count == 0 {
        return Err(SeisCorrError::InvalidDimensions { len, count });
    }
    if stride < len {
        return Err(SeisCorrError::InvalidStride { len, stride });
    }
    let needed = (count - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(len))
        .ok_or(SeisCorrError::InvalidDimensions { len, count })?;
    Ok(needed)
}

//! Layouts of results written back into shared memory.
//!
//! Scalar results (`GetError`, `Is*`, `CheckFramebufferStatus`, `ClientWaitSync`,
//! `Get*Location`) are a single little-endian 4-byte value. Variable-length results use the
//! [`SizedResult`] layout; a few commands use a fixed struct.

use core::marker::PhantomData;
use core::mem::size_of;

use bytemuck::{Pod, Zeroable};

/// `u32` byte count followed by `size / size_of::<T>()` values of `T`.
///
/// A `size` of zero means no result was produced. Failures are reported through the GL error
/// channel, not through this header.
pub struct SizedResult<T>(PhantomData<T>);

impl<T: Pod> SizedResult<T> {
    pub const HEADER_BYTES: usize = 4;

    /// Bytes needed to hold `num_results` values plus the header.
    pub fn compute_size(num_results: usize) -> Option<usize> {
        num_results
            .checked_mul(size_of::<T>())?
            .checked_add(Self::HEADER_BYTES)
    }

    /// How many values fit in a buffer of `buffer_size` bytes.
    pub fn compute_max_results(buffer_size: usize) -> usize {
        buffer_size.saturating_sub(Self::HEADER_BYTES) / size_of::<T>()
    }

    /// The `size` field; `None` if `buf` is shorter than the header.
    pub fn size(buf: &[u8]) -> Option<u32> {
        let bytes = buf.get(..Self::HEADER_BYTES)?;
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    }

    /// The bytes immediately following the `size` field.
    pub fn data(buf: &[u8]) -> &[u8] {
        buf.get(Self::HEADER_BYTES..).unwrap_or(&[])
    }

    /// Decodes the values the `size` field covers. Returns `None` if it claims more than `buf`
    /// holds.
    pub fn read(buf: &[u8]) -> Option<Vec<T>> {
        let size = Self::size(buf)? as usize;
        let data = Self::data(buf).get(..size)?;
        Some(
            data.chunks_exact(size_of::<T>())
                .map(bytemuck::pod_read_unaligned)
                .collect(),
        )
    }

    /// Writes `values` and sets `size` to their byte length. Returns `false` if they don't fit.
    pub fn write(buf: &mut [u8], values: &[T]) -> bool {
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let Some(end) = bytes.len().checked_add(Self::HEADER_BYTES) else {
            return false;
        };
        let Some(out) = buf.get_mut(..end) else {
            return false;
        };
        out[..Self::HEADER_BYTES].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
        out[Self::HEADER_BYTES..].copy_from_slice(bytes);
        true
    }

    pub fn set_size(buf: &mut [u8], size: u32) -> bool {
        match buf.get_mut(..Self::HEADER_BYTES) {
            Some(out) => {
                out.copy_from_slice(&size.to_le_bytes());
                true
            }
            None => false,
        }
    }
}

/// Result of `GetActiveAttrib` / `GetActiveUniform`. The name goes to a bucket.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ActiveInfoResult {
    pub success: i32,
    pub size: i32,
    pub ty: u32,
}

/// Result of `ReadPixels`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ReadPixelsResult {
    pub success: u32,
    pub row_length: i32,
    pub num_rows: i32,
}

/// Completion record a query writes into the shared memory named by `BeginQueryEXT`.
///
/// `process_count` is set to the `submit_count` of the matching `EndQueryEXT` once `result`
/// is valid.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct QuerySync {
    pub process_count: u32,
    pub _pad: u32,
    pub result: u64,
}

macro_rules! impl_result_layout {
    ($($ty:ty),*) => {
        $(
            impl $ty {
                pub const SIZE_BYTES: usize = size_of::<Self>();

                pub fn as_bytes(&self) -> &[u8] {
                    bytemuck::bytes_of(self)
                }

                /// Reads the struct from the front of `buf`, which need not be aligned.
                pub fn read_from(buf: &[u8]) -> Option<Self> {
                    buf.get(..Self::SIZE_BYTES).map(bytemuck::pod_read_unaligned)
                }
            }
        )*
    };
}

impl_result_layout!(ActiveInfoResult, ReadPixelsResult, QuerySync);

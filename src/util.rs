
use std::{convert::TryFrom, fmt::Debug, num::NonZeroU8, num::NonZeroUsize};

use num_traits::{PrimInt, Unsigned};

#[cfg(target_arch = "x86_64")]
cpufeatures::new!(cpuid_avx2, "avx2");

#[cfg(target_arch = "x86_64")]
pub use cpuid_avx2::get as has_avx2;

/// A single sample of a block.
///
/// `u8` is the 8-bit storage, `u16` is the wide container used for 8, 10 and 12-bit
/// content. Kernels branch on `size_of::<T>()`, which is resolved at compile time.
pub trait Pixel:
    PrimInt
    + Unsigned
    + Into<u16>
    + Into<i32>
    + Into<u32>
    + From<u8>
    + TryFrom<u16>
    + TryFrom<u32>
    + Default
    + Debug
    + Send
    + Sync
    + 'static
{
    #[must_use]
    fn from_or_max(value: u32) -> Self;
}

impl<T> Pixel for T
where
    T: PrimInt
        + Unsigned
        + Into<u16>
        + Into<i32>
        + Into<u32>
        + From<u8>
        + TryFrom<u16>
        + TryFrom<u32>
        + Default
        + Debug
        + Send
        + Sync
        + 'static,
{
    fn from_or_max(value: u32) -> Self {
        Self::try_from(value).unwrap_or_else(|_| Self::max_value())
    }
}

/// Largest valid sample value at the given bit depth.
#[must_use]
pub fn max_sample(bits_per_sample: NonZeroU8) -> u32 {
    (1u32 << bits_per_sample.get()) - 1
}

/// The mid-range sample value, `1 << (bit_depth - 1)`.
#[must_use]
pub fn mid_sample(bits_per_sample: NonZeroU8) -> u32 {
    1u32 << (bits_per_sample.get() - 1)
}

/// Fills every row of a block with the same value.
///
/// Row `y` starts at `y * dest_stride`, so a stride narrower than `width` makes rows overlap.
pub fn fill_block<T: Pixel>(
    dest: &mut [T],
    dest_stride: NonZeroUsize,
    width: NonZeroUsize,
    height: NonZeroUsize,
    value: T,
) {
    let width = width.get();
    for y in 0..height.get() {
        let start = y * dest_stride.get();
        dest[start..start + width].fill(value);
    }
}

/// Minimum slice length that covers `height` rows of `width` samples at `stride`.
#[must_use]
pub const fn block_extent(width: usize, height: usize, stride: usize) -> usize {
    (height - 1) * stride + width
}

#[cfg(target_arch = "x86_64")]
mod avx2;
mod rust;


use std::num::NonZeroUsize;

use cfg_if::cfg_if;

use crate::{block::BlockSize, cpu::CpuFeatureLevel, util::Pixel};

/// SAD of one block against one reference, stopping early once the sum exceeds `max_sad`.
///
/// Arguments are `(src, src_pitch, ref_, ref_pitch, max_sad)`.
pub type SadFn<T> = fn(&[T], NonZeroUsize, &[T], NonZeroUsize, u32) -> u32;

/// Exact SAD of one block against four references sharing a pitch.
///
/// Arguments are `(src, src_pitch, refs, ref_pitch, sads)`.
pub type SadX4Fn<T> = fn(&[T], NonZeroUsize, [&[T]; 4], NonZeroUsize, &mut [u32; 4]);

/// Exact SAD of one block against the rounded average of a reference and a packed second
/// predictor.
///
/// Arguments are `(src, src_pitch, ref_, ref_pitch, second_pred)`.
pub type SadAvgFn<T> = fn(&[T], NonZeroUsize, &[T], NonZeroUsize, &[T]) -> u32;

/// The SAD kernels of one implementation tier, bound to a single block size.
#[derive(Debug, Clone, Copy)]
pub struct SadFns<T> {
    pub sad: SadFn<T>,
    pub sad_x4: SadX4Fn<T>,
    pub sad_avg: SadAvgFn<T>,
}

/// Looks up the SAD kernels of `level` for `size`.
///
/// Returns `None` if the tier cannot run on this machine or has no kernels for the size.
#[must_use]
pub fn sad_fns<T: Pixel>(level: CpuFeatureLevel, size: BlockSize) -> Option<SadFns<T>> {
    match level {
        CpuFeatureLevel::Rust => rust::sad_fns(size),
        CpuFeatureLevel::Avx2 => {
            cfg_if! {
                if #[cfg(all(target_arch = "x86_64", not(feature = "no_simd")))] {
                    if crate::util::has_avx2() {
                        // SAFETY: We check for AVX2 first
                        return unsafe { avx2::sad_fns(size) };
                    }
                }
            }
            None
        }
    }
}

fn current_fns<T: Pixel>(width: NonZeroUsize, height: NonZeroUsize) -> SadFns<T> {
    let size = BlockSize { width, height };
    sad_fns(CpuFeatureLevel::current(), size)
        .unwrap_or_else(|| unimplemented!("Invalid block size for SAD: {}", size))
}

/// Computes the sum of absolute differences between two blocks.
///
/// Accumulation may stop once the running sum exceeds `max_sad`. In that case the returned
/// value is not clamped: it is the sum so far, which is larger than `max_sad` but may be
/// smaller than the full sum. Pass `u32::MAX` to always get the exact sum.
///
/// # Parameters
/// - `width`, `height`: Block dimensions, one of the sizes in [`crate::block::SAD_BLOCK_SIZES`]
/// - `src`: Source block
/// - `src_pitch`: Number of samples per row in `src`
/// - `ref_`: Reference block
/// - `ref_pitch`: Number of samples per row in `ref_`
/// - `max_sad`: Early-exit bound
///
/// # Panics
/// Panics on an unsupported block size, or if a buffer is too short for its pitch.
#[must_use]
pub fn get_sad<T: Pixel>(
    width: NonZeroUsize,
    height: NonZeroUsize,
    src: &[T],
    src_pitch: NonZeroUsize,
    ref_: &[T],
    ref_pitch: NonZeroUsize,
    max_sad: u32,
) -> u32 {
    (current_fns::<T>(width, height).sad)(src, src_pitch, ref_, ref_pitch, max_sad)
}

/// Computes the exact SAD of `src` against each of four references, in order.
///
/// The references share `ref_pitch` but are otherwise unrelated and may alias.
pub fn get_sad_x4<T: Pixel>(
    width: NonZeroUsize,
    height: NonZeroUsize,
    src: &[T],
    src_pitch: NonZeroUsize,
    refs: [&[T]; 4],
    ref_pitch: NonZeroUsize,
    sads: &mut [u32; 4],
) {
    (current_fns::<T>(width, height).sad_x4)(src, src_pitch, refs, ref_pitch, sads);
}

/// Computes the exact SAD of `src` against `(ref_ + second_pred + 1) >> 1`.
///
/// `second_pred` is tightly packed, with a pitch of `width`.
#[must_use]
pub fn get_sad_avg<T: Pixel>(
    width: NonZeroUsize,
    height: NonZeroUsize,
    src: &[T],
    src_pitch: NonZeroUsize,
    ref_: &[T],
    ref_pitch: NonZeroUsize,
    second_pred: &[T],
) -> u32 {
    (current_fns::<T>(width, height).sad_avg)(src, src_pitch, ref_, ref_pitch, second_pred)
}

use std::num::NonZeroUsize;

use super::SadFns;
use crate::{block::BlockSize, util::Pixel};

#[must_use]
pub(super) fn sad_fns<T: Pixel>(size: BlockSize) -> Option<SadFns<T>> {
    Some(match (size.width.get(), size.height.get()) {
        (64, 64) => fns::<T, 64, 64>(),
        (64, 32) => fns::<T, 64, 32>(),
        (32, 64) => fns::<T, 32, 64>(),
        (32, 32) => fns::<T, 32, 32>(),
        (32, 16) => fns::<T, 32, 16>(),
        (16, 32) => fns::<T, 16, 32>(),
        (16, 16) => fns::<T, 16, 16>(),
        (16, 8) => fns::<T, 16, 8>(),
        (8, 16) => fns::<T, 8, 16>(),
        (8, 8) => fns::<T, 8, 8>(),
        (8, 4) => fns::<T, 8, 4>(),
        (4, 8) => fns::<T, 4, 8>(),
        (4, 4) => fns::<T, 4, 4>(),
        _ => return None,
    })
}

fn fns<T: Pixel, const WIDTH: usize, const HEIGHT: usize>() -> SadFns<T> {
    SadFns {
        sad: get_sad_impl::<T, WIDTH, HEIGHT>,
        sad_x4: get_sad_x4_impl::<T, WIDTH, HEIGHT>,
        sad_avg: get_sad_avg_impl::<T, WIDTH, HEIGHT>,
    }
}

#[must_use]
fn get_sad_impl<T: Pixel, const WIDTH: usize, const HEIGHT: usize>(
    src: &[T],
    src_pitch: NonZeroUsize,
    ref_: &[T],
    ref_pitch: NonZeroUsize,
    max_sad: u32,
) -> u32 {
    let mut sum = 0;
    for y in 0..HEIGHT {
        let src_row = &src[y * src_pitch.get()..][..WIDTH];
        let ref_row = &ref_[y * ref_pitch.get()..][..WIDTH];
        sum += row_sad(src_row, ref_row.iter().copied());
        if sum > max_sad {
            break;
        }
    }
    sum
}

fn get_sad_x4_impl<T: Pixel, const WIDTH: usize, const HEIGHT: usize>(
    src: &[T],
    src_pitch: NonZeroUsize,
    refs: [&[T]; 4],
    ref_pitch: NonZeroUsize,
    sads: &mut [u32; 4],
) {
    for (sad, ref_) in sads.iter_mut().zip(refs) {
        *sad = get_sad_impl::<T, WIDTH, HEIGHT>(src, src_pitch, ref_, ref_pitch, u32::MAX);
    }
}

#[must_use]
fn get_sad_avg_impl<T: Pixel, const WIDTH: usize, const HEIGHT: usize>(
    src: &[T],
    src_pitch: NonZeroUsize,
    ref_: &[T],
    ref_pitch: NonZeroUsize,
    second_pred: &[T],
) -> u32 {
    let mut sum = 0;
    for y in 0..HEIGHT {
        let src_row = &src[y * src_pitch.get()..][..WIDTH];
        let ref_row = &ref_[y * ref_pitch.get()..][..WIDTH];
        let pred_row = &second_pred[y * WIDTH..][..WIDTH];
        let comp = ref_row.iter().zip(pred_row).map(|(&r, &p)| {
            let r: u32 = r.into();
            let p: u32 = p.into();
            T::from_or_max((r + p + 1) >> 1)
        });
        sum += row_sad(src_row, comp);
    }
    sum
}

#[inline]
fn row_sad<T: Pixel>(src_row: &[T], ref_row: impl Iterator<Item = T>) -> u32 {
    src_row.iter().zip(ref_row).fold(0, |acc, (&s, r)| {
        let val1: i32 = s.into();
        let val2: i32 = r.into();
        acc + (val1 - val2).unsigned_abs()
    })
}

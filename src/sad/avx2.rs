#![allow(clippy::undocumented_unsafe_blocks)]
#![allow(unsafe_op_in_unsafe_fn)]

use std::{arch::x86_64::*, num::NonZeroUsize, ptr};

use super::SadFns;
use crate::{
    block::BlockSize,
    simd::{hsum_epi32, hsum_epi64},
    util::{Pixel, block_extent},
};

/// Rows accumulated between two early-exit checks.
const EARLY_EXIT_ROWS: usize = 8;

/// # Safety
/// The returned kernels may only be called on a CPU that supports AVX2.
#[must_use]
pub(super) unsafe fn sad_fns<T: Pixel>(size: BlockSize) -> Option<SadFns<T>> {
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
        sad: get_sad::<T, WIDTH, HEIGHT>,
        sad_x4: get_sad_x4::<T, WIDTH, HEIGHT>,
        sad_avg: get_sad_avg::<T, WIDTH, HEIGHT>,
    }
}

fn get_sad<T: Pixel, const WIDTH: usize, const HEIGHT: usize>(
    src: &[T],
    src_pitch: NonZeroUsize,
    ref_: &[T],
    ref_pitch: NonZeroUsize,
    max_sad: u32,
) -> u32 {
    // Check the array bounds once at the start of the loop.
    assert!(src.len() >= block_extent(WIDTH, HEIGHT, src_pitch.get()));
    assert!(ref_.len() >= block_extent(WIDTH, HEIGHT, ref_pitch.get()));

    // SAFETY: only reachable through `sad_fns`, whose caller verified AVX2 support
    unsafe {
        match size_of::<T>() {
            1 => sad_u8::<WIDTH, HEIGHT, false>(
                src.as_ptr().cast(),
                src_pitch.get(),
                ref_.as_ptr().cast(),
                ref_pitch.get(),
                ptr::null(),
                max_sad,
            ),
            2 => sad_u16::<WIDTH, HEIGHT, false>(
                src.as_ptr().cast(),
                src_pitch.get(),
                ref_.as_ptr().cast(),
                ref_pitch.get(),
                ptr::null(),
                max_sad,
            ),
            _ => unreachable!(),
        }
    }
}

fn get_sad_x4<T: Pixel, const WIDTH: usize, const HEIGHT: usize>(
    src: &[T],
    src_pitch: NonZeroUsize,
    refs: [&[T]; 4],
    ref_pitch: NonZeroUsize,
    sads: &mut [u32; 4],
) {
    assert!(src.len() >= block_extent(WIDTH, HEIGHT, src_pitch.get()));
    for ref_ in refs {
        assert!(ref_.len() >= block_extent(WIDTH, HEIGHT, ref_pitch.get()));
    }

    // SAFETY: only reachable through `sad_fns`, whose caller verified AVX2 support
    unsafe {
        *sads = match size_of::<T>() {
            1 => sad_x4_u8::<WIDTH, HEIGHT>(
                src.as_ptr().cast(),
                src_pitch.get(),
                refs.map(|r| r.as_ptr().cast()),
                ref_pitch.get(),
            ),
            2 => sad_x4_u16::<WIDTH, HEIGHT>(
                src.as_ptr().cast(),
                src_pitch.get(),
                refs.map(|r| r.as_ptr().cast()),
                ref_pitch.get(),
            ),
            _ => unreachable!(),
        };
    }
}

fn get_sad_avg<T: Pixel, const WIDTH: usize, const HEIGHT: usize>(
    src: &[T],
    src_pitch: NonZeroUsize,
    ref_: &[T],
    ref_pitch: NonZeroUsize,
    second_pred: &[T],
) -> u32 {
    assert!(src.len() >= block_extent(WIDTH, HEIGHT, src_pitch.get()));
    assert!(ref_.len() >= block_extent(WIDTH, HEIGHT, ref_pitch.get()));
    assert!(second_pred.len() >= WIDTH * HEIGHT);

    // SAFETY: only reachable through `sad_fns`, whose caller verified AVX2 support
    unsafe {
        match size_of::<T>() {
            1 => sad_u8::<WIDTH, HEIGHT, true>(
                src.as_ptr().cast(),
                src_pitch.get(),
                ref_.as_ptr().cast(),
                ref_pitch.get(),
                second_pred.as_ptr().cast(),
                u32::MAX,
            ),
            2 => sad_u16::<WIDTH, HEIGHT, true>(
                src.as_ptr().cast(),
                src_pitch.get(),
                ref_.as_ptr().cast(),
                ref_pitch.get(),
                second_pred.as_ptr().cast(),
                u32::MAX,
            ),
            _ => unreachable!(),
        }
    }
}

/// Accumulates the SAD of one 8-bit row into `wide` (32-byte chunks) and `narrow` (the rest).
///
/// With `AVG`, the reference is first averaged with the packed row at `pred`.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn row_sad_u8<const WIDTH: usize, const AVG: bool>(
    src: *const u8,
    ref_: *const u8,
    pred: *const u8,
    wide: &mut __m256i,
    narrow: &mut __m128i,
) {
    let mut i = 0;

    while i + 32 <= WIDTH {
        let s = _mm256_loadu_si256(src.add(i) as *const __m256i);
        let mut r = _mm256_loadu_si256(ref_.add(i) as *const __m256i);
        if AVG {
            r = _mm256_avg_epu8(r, _mm256_loadu_si256(pred.add(i) as *const __m256i));
        }
        *wide = _mm256_add_epi64(*wide, _mm256_sad_epu8(s, r));
        i += 32;
    }

    if i + 16 <= WIDTH {
        let s = _mm_loadu_si128(src.add(i) as *const __m128i);
        let mut r = _mm_loadu_si128(ref_.add(i) as *const __m128i);
        if AVG {
            r = _mm_avg_epu8(r, _mm_loadu_si128(pred.add(i) as *const __m128i));
        }
        *narrow = _mm_add_epi64(*narrow, _mm_sad_epu8(s, r));
        i += 16;
    }

    if i + 8 <= WIDTH {
        let s = _mm_loadl_epi64(src.add(i) as *const __m128i);
        let mut r = _mm_loadl_epi64(ref_.add(i) as *const __m128i);
        if AVG {
            r = _mm_avg_epu8(r, _mm_loadl_epi64(pred.add(i) as *const __m128i));
        }
        *narrow = _mm_add_epi64(*narrow, _mm_sad_epu8(s, r));
        i += 8;
    }

    if i + 4 <= WIDTH {
        // Upper lanes are zero in both operands, so they add nothing to the sum.
        let s = _mm_cvtsi32_si128(src.add(i).cast::<i32>().read_unaligned());
        let mut r = _mm_cvtsi32_si128(ref_.add(i).cast::<i32>().read_unaligned());
        if AVG {
            r = _mm_avg_epu8(
                r,
                _mm_cvtsi32_si128(pred.add(i).cast::<i32>().read_unaligned()),
            );
        }
        *narrow = _mm_add_epi64(*narrow, _mm_sad_epu8(s, r));
    }
}

#[target_feature(enable = "avx2")]
unsafe fn sad_u8<const WIDTH: usize, const HEIGHT: usize, const AVG: bool>(
    src: *const u8,
    src_pitch: usize,
    ref_: *const u8,
    ref_pitch: usize,
    pred: *const u8,
    max_sad: u32,
) -> u32 {
    let mut wide = _mm256_setzero_si256();
    let mut narrow = _mm_setzero_si128();

    for y in 0..HEIGHT {
        let pred_row = if AVG { pred.add(y * WIDTH) } else { pred };
        row_sad_u8::<WIDTH, AVG>(
            src.add(y * src_pitch),
            ref_.add(y * ref_pitch),
            pred_row,
            &mut wide,
            &mut narrow,
        );

        if (y + 1) % EARLY_EXIT_ROWS == 0 && y + 1 < HEIGHT {
            let sum = hsum_epi64(wide, narrow);
            if sum > max_sad {
                return sum;
            }
        }
    }

    hsum_epi64(wide, narrow)
}

#[target_feature(enable = "avx2")]
unsafe fn sad_x4_u8<const WIDTH: usize, const HEIGHT: usize>(
    src: *const u8,
    src_pitch: usize,
    refs: [*const u8; 4],
    ref_pitch: usize,
) -> [u32; 4] {
    let mut wide = [_mm256_setzero_si256(); 4];
    let mut narrow = [_mm_setzero_si128(); 4];

    for y in 0..HEIGHT {
        let src_row = src.add(y * src_pitch);
        for k in 0..4 {
            row_sad_u8::<WIDTH, false>(
                src_row,
                refs[k].add(y * ref_pitch),
                ptr::null(),
                &mut wide[k],
                &mut narrow[k],
            );
        }
    }

    [
        hsum_epi64(wide[0], narrow[0]),
        hsum_epi64(wide[1], narrow[1]),
        hsum_epi64(wide[2], narrow[2]),
        hsum_epi64(wide[3], narrow[3]),
    ]
}

/// `|a - b|` per unsigned 16-bit lane.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn abs_diff_epu16(a: __m256i, b: __m256i) -> __m256i {
    _mm256_or_si256(_mm256_subs_epu16(a, b), _mm256_subs_epu16(b, a))
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn abs_diff_epu16_128(a: __m128i, b: __m128i) -> __m128i {
    _mm_or_si128(_mm_subs_epu16(a, b), _mm_subs_epu16(b, a))
}

/// Accumulates the SAD of one 16-bit row into eight 32-bit lanes of `acc`.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn row_sad_u16<const WIDTH: usize, const AVG: bool>(
    src: *const u16,
    ref_: *const u16,
    pred: *const u16,
    acc: &mut __m256i,
) {
    let zero = _mm256_setzero_si256();
    let mut i = 0;

    while i + 16 <= WIDTH {
        let s = _mm256_loadu_si256(src.add(i) as *const __m256i);
        let mut r = _mm256_loadu_si256(ref_.add(i) as *const __m256i);
        if AVG {
            r = _mm256_avg_epu16(r, _mm256_loadu_si256(pred.add(i) as *const __m256i));
        }
        // Differences can use all 16 bits, so widen with zeros instead of `madd`.
        let diff = abs_diff_epu16(s, r);
        *acc = _mm256_add_epi32(*acc, _mm256_unpacklo_epi16(diff, zero));
        *acc = _mm256_add_epi32(*acc, _mm256_unpackhi_epi16(diff, zero));
        i += 16;
    }

    if i + 8 <= WIDTH {
        let s = _mm_loadu_si128(src.add(i) as *const __m128i);
        let mut r = _mm_loadu_si128(ref_.add(i) as *const __m128i);
        if AVG {
            r = _mm_avg_epu16(r, _mm_loadu_si128(pred.add(i) as *const __m128i));
        }
        *acc = _mm256_add_epi32(*acc, _mm256_cvtepu16_epi32(abs_diff_epu16_128(s, r)));
        i += 8;
    }

    if i + 4 <= WIDTH {
        let s = _mm_loadl_epi64(src.add(i) as *const __m128i);
        let mut r = _mm_loadl_epi64(ref_.add(i) as *const __m128i);
        if AVG {
            r = _mm_avg_epu16(r, _mm_loadl_epi64(pred.add(i) as *const __m128i));
        }
        *acc = _mm256_add_epi32(*acc, _mm256_cvtepu16_epi32(abs_diff_epu16_128(s, r)));
    }
}

#[target_feature(enable = "avx2")]
unsafe fn sad_u16<const WIDTH: usize, const HEIGHT: usize, const AVG: bool>(
    src: *const u16,
    src_pitch: usize,
    ref_: *const u16,
    ref_pitch: usize,
    pred: *const u16,
    max_sad: u32,
) -> u32 {
    let mut acc = _mm256_setzero_si256();

    for y in 0..HEIGHT {
        let pred_row = if AVG { pred.add(y * WIDTH) } else { pred };
        row_sad_u16::<WIDTH, AVG>(
            src.add(y * src_pitch),
            ref_.add(y * ref_pitch),
            pred_row,
            &mut acc,
        );

        if (y + 1) % EARLY_EXIT_ROWS == 0 && y + 1 < HEIGHT {
            let sum = hsum_epi32(acc);
            if sum > max_sad {
                return sum;
            }
        }
    }

    hsum_epi32(acc)
}

#[target_feature(enable = "avx2")]
unsafe fn sad_x4_u16<const WIDTH: usize, const HEIGHT: usize>(
    src: *const u16,
    src_pitch: usize,
    refs: [*const u16; 4],
    ref_pitch: usize,
) -> [u32; 4] {
    let mut acc = [_mm256_setzero_si256(); 4];

    for y in 0..HEIGHT {
        let src_row = src.add(y * src_pitch);
        for k in 0..4 {
            row_sad_u16::<WIDTH, false>(
                src_row,
                refs[k].add(y * ref_pitch),
                ptr::null(),
                &mut acc[k],
            );
        }
    }

    [
        hsum_epi32(acc[0]),
        hsum_epi32(acc[1]),
        hsum_epi32(acc[2]),
        hsum_epi32(acc[3]),
    ]
}

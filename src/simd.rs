#![allow(clippy::undocumented_unsafe_blocks)]

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[inline]
#[allow(non_snake_case)]
// Unstable function copied from std lib
pub const fn _MM_SHUFFLE(z: u32, y: u32, x: u32, w: u32) -> i32 {
    ((z << 6) | (y << 4) | (x << 2) | w) as i32
}

/// Adds the four 64-bit lanes of `wide` and the two of `narrow`.
#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2")]
pub unsafe fn hsum_epi64(wide: __m256i, narrow: __m128i) -> u32 {
    let sum = _mm_add_epi64(
        _mm256_castsi256_si128(wide),
        _mm256_extracti128_si256::<1>(wide),
    );
    let sum = _mm_add_epi64(sum, narrow);
    let sum = _mm_add_epi64(sum, _mm_unpackhi_epi64(sum, sum));
    _mm_cvtsi128_si64(sum) as u32
}

/// Adds the eight 32-bit lanes of `acc`.
#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2")]
pub unsafe fn hsum_epi32(acc: __m256i) -> u32 {
    let sum = _mm_add_epi32(
        _mm256_castsi256_si128(acc),
        _mm256_extracti128_si256::<1>(acc),
    );
    let sum = _mm_add_epi32(sum, _mm_shuffle_epi32::<{ _MM_SHUFFLE(1, 0, 3, 2) }>(sum));
    let sum = _mm_add_epi32(sum, _mm_shuffle_epi32::<{ _MM_SHUFFLE(2, 3, 0, 1) }>(sum));
    _mm_cvtsi128_si32(sum) as u32
}

#![allow(clippy::undocumented_unsafe_blocks)]
#![allow(unsafe_op_in_unsafe_fn)]

use std::{
    arch::x86_64::*,
    num::{NonZeroU8, NonZeroUsize},
};

use super::{IntraEdges, IntraFn, PredictionMode, avg3};
use crate::{
    block::BlockSize,
    simd::hsum_epi32,
    util::{Pixel, block_extent, max_sample, mid_sample},
};

/// Samples per vector.
const LANES: usize = 16;

/// # Safety
/// The returned predictors may only be called on a CPU that supports AVX2.
///
/// Only wide samples are covered, narrow samples get `None`.
#[must_use]
pub(super) unsafe fn intra_fn<T: Pixel>(
    mode: PredictionMode,
    size: BlockSize,
) -> Option<IntraFn<T>> {
    if size_of::<T>() != 2 || size.width != size.height {
        return None;
    }
    Some(match size.width.get() {
        4 => mode_fn::<T, 4>(mode),
        8 => mode_fn::<T, 8>(mode),
        16 => mode_fn::<T, 16>(mode),
        32 => mode_fn::<T, 32>(mode),
        _ => return None,
    })
}

fn mode_fn<T: Pixel, const N: usize>(mode: PredictionMode) -> IntraFn<T> {
    match mode {
        PredictionMode::Dc => predict_dc::<T, N>,
        PredictionMode::DcLeft => predict_dc_left::<T, N>,
        PredictionMode::DcTop => predict_dc_top::<T, N>,
        PredictionMode::Dc128 => predict_dc_128::<T, N>,
        PredictionMode::V => predict_v::<T, N>,
        PredictionMode::H => predict_h::<T, N>,
        PredictionMode::D45 => predict_d45::<T, N>,
        PredictionMode::D117 => predict_d117::<T, N>,
        PredictionMode::D135 => predict_d135::<T, N>,
        PredictionMode::Tm => predict_tm::<T, N>,
    }
}

/// Checks that the block fits in `dest` and reinterprets it as wide samples.
fn dest_ptr<T: Pixel, const N: usize>(dest: &mut [T], dest_pitch: NonZeroUsize) -> *mut u16 {
    assert_eq!(size_of::<T>(), 2);
    assert!(dest.len() >= block_extent(N, N, dest_pitch.get()));
    dest.as_mut_ptr().cast()
}

fn edge_ptr<T: Pixel>(edge: &[T], len: usize) -> *const u16 {
    assert!(edge.len() >= len);
    edge.as_ptr().cast()
}

fn predict_dc<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    let above = edge_ptr(edges.above, N);
    let left = edge_ptr(edges.left, N);
    let dst = dest_ptr::<T, N>(dest, dest_pitch);
    // SAFETY: only reachable through `intra_fn`, whose caller verified AVX2 support
    unsafe {
        let total = sum_edge::<N>(above) + sum_edge::<N>(left);
        let value = (total + N as u32) >> (2 * N).trailing_zeros();
        fill::<N>(dst, dest_pitch.get(), value as u16);
    }
}

fn predict_dc_left<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    let left = edge_ptr(edges.left, N);
    let dst = dest_ptr::<T, N>(dest, dest_pitch);
    // SAFETY: only reachable through `intra_fn`, whose caller verified AVX2 support
    unsafe {
        let value = (sum_edge::<N>(left) + N as u32 / 2) >> N.trailing_zeros();
        fill::<N>(dst, dest_pitch.get(), value as u16);
    }
}

fn predict_dc_top<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    let above = edge_ptr(edges.above, N);
    let dst = dest_ptr::<T, N>(dest, dest_pitch);
    // SAFETY: only reachable through `intra_fn`, whose caller verified AVX2 support
    unsafe {
        let value = (sum_edge::<N>(above) + N as u32 / 2) >> N.trailing_zeros();
        fill::<N>(dst, dest_pitch.get(), value as u16);
    }
}

fn predict_dc_128<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    _edges: &IntraEdges<T>,
    bits_per_sample: NonZeroU8,
) {
    let dst = dest_ptr::<T, N>(dest, dest_pitch);
    // SAFETY: only reachable through `intra_fn`, whose caller verified AVX2 support
    unsafe {
        fill::<N>(dst, dest_pitch.get(), mid_sample(bits_per_sample) as u16);
    }
}

fn predict_v<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    let above = edge_ptr(edges.above, N);
    let dst = dest_ptr::<T, N>(dest, dest_pitch);
    // SAFETY: only reachable through `intra_fn`, whose caller verified AVX2 support
    unsafe {
        v_u16::<N>(dst, dest_pitch.get(), above);
    }
}

fn predict_h<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    let left = edge_ptr(edges.left, N);
    let dst = dest_ptr::<T, N>(dest, dest_pitch);
    // SAFETY: only reachable through `intra_fn`, whose caller verified AVX2 support
    unsafe {
        h_u16::<N>(dst, dest_pitch.get(), left);
    }
}

fn predict_tm<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    bits_per_sample: NonZeroU8,
) {
    // The unclamped value must fit in a signed 16-bit lane.
    assert!(bits_per_sample.get() <= 14);
    let above = edge_ptr(edges.above, N);
    let left = edge_ptr(edges.left, N);
    let dst = dest_ptr::<T, N>(dest, dest_pitch);
    let above_left: u16 = edges.above_left.into();
    // SAFETY: only reachable through `intra_fn`, whose caller verified AVX2 support
    unsafe {
        tm_u16::<N>(
            dst,
            dest_pitch.get(),
            above,
            left,
            above_left,
            max_sample(bits_per_sample) as u16,
        );
    }
}

fn predict_d45<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    assert!(edges.above.len() >= N);
    // Past the available samples, the last one repeats.
    let available = edges.above.len().min(2 * N);
    let mut above = [0u16; 2 * 32 + LANES + 2];
    for (i, a) in above.iter_mut().enumerate() {
        *a = edges.above[i.min(available - 1)].into();
    }
    let dst = dest_ptr::<T, N>(dest, dest_pitch);
    // SAFETY: only reachable through `intra_fn`, whose caller verified AVX2 support
    unsafe {
        d45_u16::<N>(dst, dest_pitch.get(), &above);
    }
}

fn predict_d135<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    let mut border = [0u16; 2 * 32 + 1 + LANES + 1];
    for (b, &l) in border[..N].iter_mut().rev().zip(&edges.left[..N]) {
        *b = l.into();
    }
    border[N] = edges.above_left.into();
    for (b, &a) in border[N + 1..=2 * N].iter_mut().zip(&edges.above[..N]) {
        *b = a.into();
    }
    let dst = dest_ptr::<T, N>(dest, dest_pitch);
    // SAFETY: only reachable through `intra_fn`, whose caller verified AVX2 support
    unsafe {
        d135_u16::<N>(dst, dest_pitch.get(), &border);
    }
}

fn predict_d117<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    // `[left[0], above_left, above[0], ..]`, so the first two rows are plain vector averages.
    let mut above = [0u16; 32 + 2 + LANES];
    above[0] = edges.left[0].into();
    above[1] = edges.above_left.into();
    for (b, &a) in above[2..N + 2].iter_mut().zip(&edges.above[..N]) {
        *b = a.into();
    }

    let left = &edges.left[..N];
    let l = |i: usize| -> u32 { left[i].into() };
    let mut column = [0u16; 32];
    column[2] = avg3(edges.above_left.into(), l(0), l(1)) as u16;
    for r in 3..N {
        column[r] = avg3(l(r - 3), l(r - 2), l(r - 1)) as u16;
    }

    let dst = dest_ptr::<T, N>(dest, dest_pitch);
    // SAFETY: only reachable through `intra_fn`, whose caller verified AVX2 support
    unsafe {
        d117_u16::<N>(dst, dest_pitch.get(), &above, &column);
    }
}

/// Loads the first `min(N, 16)` samples of an edge, zeroing the remaining lanes.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn load_edge<const N: usize>(src: *const u16) -> __m256i {
    match N {
        4 => _mm256_zextsi128_si256(_mm_loadl_epi64(src.cast())),
        8 => _mm256_zextsi128_si256(_mm_loadu_si128(src.cast())),
        _ => _mm256_loadu_si256(src.cast()),
    }
}

/// Stores the first `min(N, 16)` lanes of `v`.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn store<const N: usize>(dst: *mut u16, v: __m256i) {
    match N {
        4 => _mm_storel_epi64(dst.cast(), _mm256_castsi256_si128(v)),
        8 => _mm_storeu_si128(dst.cast(), _mm256_castsi256_si128(v)),
        _ => _mm256_storeu_si256(dst.cast(), v),
    }
}

/// Copies row `r` of the block from `src(r)`, which must be readable for 16 samples.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn store_rows<const N: usize>(dst: *mut u16, pitch: usize, src: impl Fn(usize) -> *const u16) {
    for y in 0..N {
        let row = src(y);
        for x in (0..N).step_by(LANES) {
            store::<N>(dst.add(y * pitch + x), _mm256_loadu_si256(row.add(x).cast()));
        }
    }
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn avg3_epu16(a: __m256i, b: __m256i, c: __m256i) -> __m256i {
    // Halving the outer pair first keeps every intermediate in 16 bits and rounds the same way.
    _mm256_avg_epu16(_mm256_srli_epi16::<1>(_mm256_add_epi16(a, c)), b)
}

#[target_feature(enable = "avx2")]
unsafe fn sum_edge<const N: usize>(src: *const u16) -> u32 {
    let zero = _mm256_setzero_si256();
    let mut acc = zero;
    for x in (0..N).step_by(LANES) {
        let v = load_edge::<N>(src.add(x));
        acc = _mm256_add_epi32(acc, _mm256_unpacklo_epi16(v, zero));
        acc = _mm256_add_epi32(acc, _mm256_unpackhi_epi16(v, zero));
    }
    hsum_epi32(acc)
}

#[target_feature(enable = "avx2")]
unsafe fn fill<const N: usize>(dst: *mut u16, pitch: usize, value: u16) {
    let v = _mm256_set1_epi16(value as i16);
    for y in 0..N {
        for x in (0..N).step_by(LANES) {
            store::<N>(dst.add(y * pitch + x), v);
        }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn v_u16<const N: usize>(dst: *mut u16, pitch: usize, above: *const u16) {
    for x in (0..N).step_by(LANES) {
        let v = load_edge::<N>(above.add(x));
        for y in 0..N {
            store::<N>(dst.add(y * pitch + x), v);
        }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn h_u16<const N: usize>(dst: *mut u16, pitch: usize, left: *const u16) {
    for y in 0..N {
        let v = _mm256_set1_epi16(*left.add(y) as i16);
        for x in (0..N).step_by(LANES) {
            store::<N>(dst.add(y * pitch + x), v);
        }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn tm_u16<const N: usize>(
    dst: *mut u16,
    pitch: usize,
    above: *const u16,
    left: *const u16,
    above_left: u16,
    max: u16,
) {
    let corner = _mm256_set1_epi16(above_left as i16);
    let zero = _mm256_setzero_si256();
    let max = _mm256_set1_epi16(max as i16);
    for x in (0..N).step_by(LANES) {
        let diff = _mm256_sub_epi16(load_edge::<N>(above.add(x)), corner);
        for y in 0..N {
            let v = _mm256_add_epi16(diff, _mm256_set1_epi16(*left.add(y) as i16));
            let v = _mm256_min_epi16(_mm256_max_epi16(v, zero), max);
            store::<N>(dst.add(y * pitch + x), v);
        }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn d45_u16<const N: usize>(dst: *mut u16, pitch: usize, above: &[u16; 2 * 32 + LANES + 2]) {
    let src = above.as_ptr();
    let mut diagonal = [0u16; 2 * 32 + LANES];
    for k in (0..2 * N - 1).step_by(LANES) {
        let v = avg3_epu16(
            _mm256_loadu_si256(src.add(k).cast()),
            _mm256_loadu_si256(src.add(k + 1).cast()),
            _mm256_loadu_si256(src.add(k + 2).cast()),
        );
        _mm256_storeu_si256(diagonal.as_mut_ptr().add(k).cast(), v);
    }
    // The bottom-right corner takes the last above sample unfiltered.
    diagonal[2 * N - 2] = above[2 * N - 1];

    let diagonal = diagonal.as_ptr();
    store_rows::<N>(dst, pitch, |y| diagonal.add(y));
}

#[target_feature(enable = "avx2")]
unsafe fn d135_u16<const N: usize>(
    dst: *mut u16,
    pitch: usize,
    border: &[u16; 2 * 32 + 1 + LANES + 1],
) {
    let src = border.as_ptr();
    let mut diagonal = [0u16; 2 * 32 + LANES];
    for i in (0..2 * N - 1).step_by(LANES) {
        let v = avg3_epu16(
            _mm256_loadu_si256(src.add(i).cast()),
            _mm256_loadu_si256(src.add(i + 1).cast()),
            _mm256_loadu_si256(src.add(i + 2).cast()),
        );
        _mm256_storeu_si256(diagonal.as_mut_ptr().add(i).cast(), v);
    }

    let diagonal = diagonal.as_ptr();
    store_rows::<N>(dst, pitch, |y| diagonal.add(N - 1 - y));
}

#[target_feature(enable = "avx2")]
unsafe fn d117_u16<const N: usize>(
    dst: *mut u16,
    pitch: usize,
    above: &[u16; 32 + 2 + LANES],
    column: &[u16; 32],
) {
    // Rows of the same parity are the same line shifted right by one each time it
    // repeats, with the first column filling in from the left. Each line holds its row
    // at `half`, preceded by the column samples it picks up going down.
    let half = N / 2;
    let src = above.as_ptr();
    let mut lines = [[0u16; 32 / 2 + 32 + LANES]; 2];
    for x in (0..N).step_by(LANES) {
        let a0 = _mm256_loadu_si256(src.add(x).cast());
        let a1 = _mm256_loadu_si256(src.add(x + 1).cast());
        let a2 = _mm256_loadu_si256(src.add(x + 2).cast());
        _mm256_storeu_si256(
            lines[0].as_mut_ptr().add(half + x).cast(),
            _mm256_avg_epu16(a1, a2),
        );
        _mm256_storeu_si256(
            lines[1].as_mut_ptr().add(half + x).cast(),
            avg3_epu16(a0, a1, a2),
        );
    }
    for (parity, line) in lines.iter_mut().enumerate() {
        for t in 0..half - 1 {
            line[half - 1 - t] = column[parity + 2 + 2 * t];
        }
    }

    let lines = [lines[0].as_ptr(), lines[1].as_ptr()];
    store_rows::<N>(dst, pitch, |y| lines[y & 1].add(half - y / 2));
}

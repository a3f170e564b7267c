use std::num::{NonZeroU8, NonZeroUsize};

use super::{IntraEdges, IntraFn, PredictionMode, avg2, avg3};
use crate::{
    block::BlockSize,
    util::{Pixel, block_extent, max_sample, mid_sample},
};

#[must_use]
pub(super) fn intra_fn<T: Pixel>(mode: PredictionMode, size: BlockSize) -> Option<IntraFn<T>> {
    if size.width != size.height {
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

/// The first `N` samples of each of the `N` rows of the block.
fn rows_mut<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
) -> impl Iterator<Item = &mut [T]> {
    assert!(dest.len() >= block_extent(N, N, dest_pitch.get()));
    dest.chunks_mut(dest_pitch.get())
        .take(N)
        .map(|row| &mut row[..N])
}

fn fill<T: Pixel, const N: usize>(dest: &mut [T], dest_pitch: NonZeroUsize, value: u32) {
    let value = T::from_or_max(value);
    for row in rows_mut::<T, N>(dest, dest_pitch) {
        row.fill(value);
    }
}

fn sum<T: Pixel>(edge: &[T]) -> u32 {
    edge.iter().map(|&v| -> u32 { v.into() }).sum()
}

fn predict_dc<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    let total = sum(&edges.above[..N]) + sum(&edges.left[..N]);
    let shift = (2 * N).trailing_zeros();
    fill::<T, N>(dest, dest_pitch, (total + N as u32) >> shift);
}

fn predict_dc_left<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    let total = sum(&edges.left[..N]);
    fill::<T, N>(dest, dest_pitch, (total + N as u32 / 2) >> N.trailing_zeros());
}

fn predict_dc_top<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    let total = sum(&edges.above[..N]);
    fill::<T, N>(dest, dest_pitch, (total + N as u32 / 2) >> N.trailing_zeros());
}

fn predict_dc_128<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    _edges: &IntraEdges<T>,
    bits_per_sample: NonZeroU8,
) {
    fill::<T, N>(dest, dest_pitch, mid_sample(bits_per_sample));
}

fn predict_v<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    let above = &edges.above[..N];
    for row in rows_mut::<T, N>(dest, dest_pitch) {
        row.copy_from_slice(above);
    }
}

fn predict_h<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    let left = &edges.left[..N];
    for (row, &value) in rows_mut::<T, N>(dest, dest_pitch).zip(left) {
        row.fill(value);
    }
}

fn predict_tm<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    bits_per_sample: NonZeroU8,
) {
    let above = &edges.above[..N];
    let left = &edges.left[..N];
    let max = max_sample(bits_per_sample) as i32;
    let above_left: i32 = edges.above_left.into();
    for (row, &l) in rows_mut::<T, N>(dest, dest_pitch).zip(left) {
        let l: i32 = l.into();
        let base = l - above_left;
        for (pix, &a) in row.iter_mut().zip(above) {
            let a: i32 = a.into();
            *pix = T::from_or_max((a + base).clamp(0, max) as u32);
        }
    }
}

fn predict_d45<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    assert!(edges.above.len() >= N);
    let available = edges.above.len().min(2 * N);
    let above = |i: usize| -> u32 { edges.above[i.min(available - 1)].into() };

    // Every down-left diagonal holds one value, so row `r` is the run starting at `r`.
    let mut diagonal = [T::zero(); 64];
    for (k, value) in diagonal[..2 * N - 1].iter_mut().enumerate() {
        *value = if k + 2 < 2 * N {
            T::from_or_max(avg3(above(k), above(k + 1), above(k + 2)))
        } else {
            T::from_or_max(above(2 * N - 1))
        };
    }
    for (r, row) in rows_mut::<T, N>(dest, dest_pitch).enumerate() {
        row.copy_from_slice(&diagonal[r..][..N]);
    }
}

fn predict_d135<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    // The border runs from the bottom of the left column, through the corner, to the end
    // of the above row.
    let mut border = [0u32; 65];
    for (b, &l) in border[..N].iter_mut().rev().zip(&edges.left[..N]) {
        *b = l.into();
    }
    border[N] = edges.above_left.into();
    for (b, &a) in border[N + 1..=2 * N].iter_mut().zip(&edges.above[..N]) {
        *b = a.into();
    }

    let mut diagonal = [T::zero(); 63];
    for (i, value) in diagonal[..2 * N - 1].iter_mut().enumerate() {
        *value = T::from_or_max(avg3(border[i], border[i + 1], border[i + 2]));
    }
    for (r, row) in rows_mut::<T, N>(dest, dest_pitch).enumerate() {
        row.copy_from_slice(&diagonal[N - 1 - r..][..N]);
    }
}

fn predict_d117<T: Pixel, const N: usize>(
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    _bits_per_sample: NonZeroU8,
) {
    assert!(dest.len() >= block_extent(N, N, dest_pitch.get()));
    let pitch = dest_pitch.get();
    let above = &edges.above[..N];
    let left = &edges.left[..N];
    let above_left: u32 = edges.above_left.into();
    let a = |i: usize| -> u32 { above[i].into() };
    let l = |i: usize| -> u32 { left[i].into() };

    // Row 0 averages pairs, row 1 averages triples, both starting at the corner.
    let mut prev = above_left;
    for (c, pix) in dest[..N].iter_mut().enumerate() {
        *pix = T::from_or_max(avg2(prev, a(c)));
        prev = a(c);
    }
    let row1 = &mut dest[pitch..][..N];
    row1[0] = T::from_or_max(avg3(l(0), above_left, a(0)));
    row1[1] = T::from_or_max(avg3(above_left, a(0), a(1)));
    for c in 2..N {
        row1[c] = T::from_or_max(avg3(a(c - 2), a(c - 1), a(c)));
    }

    // The first column continues down the left edge.
    dest[2 * pitch] = T::from_or_max(avg3(above_left, l(0), l(1)));
    for r in 3..N {
        dest[r * pitch] = T::from_or_max(avg3(l(r - 3), l(r - 2), l(r - 1)));
    }

    // Every other pixel repeats the one two rows up and one column left.
    for r in 2..N {
        let from = (r - 2) * pitch;
        dest.copy_within(from..from + N - 1, r * pitch + 1);
    }
}

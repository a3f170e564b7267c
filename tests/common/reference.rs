//! Straightforward per-sample versions of every kernel, used as the source of truth.

use std::num::NonZeroU8;

use blockdsp::{BlockSize, PredictionMode, util::Pixel};

/// Sums row by row, giving up after the first row that takes the total past `max_sad`.
pub fn reference_sad<T: Pixel>(
    size: BlockSize,
    src: &[T],
    src_stride: usize,
    ref_: &[T],
    ref_stride: usize,
    max_sad: u32,
) -> u32 {
    let mut sad = 0u32;
    for y in 0..size.height.get() {
        for x in 0..size.width.get() {
            let s: u32 = src[y * src_stride + x].into();
            let r: u32 = ref_[y * ref_stride + x].into();
            sad += s.abs_diff(r);
        }
        if sad > max_sad {
            break;
        }
    }
    sad
}

/// SAD against the rounded average of `ref_` and the packed `second_pred`.
pub fn reference_sad_avg<T: Pixel>(
    size: BlockSize,
    src: &[T],
    src_stride: usize,
    ref_: &[T],
    ref_stride: usize,
    second_pred: &[T],
) -> u32 {
    let width = size.width.get();
    let mut sad = 0u32;
    for y in 0..size.height.get() {
        for x in 0..width {
            let r: u32 = ref_[y * ref_stride + x].into();
            let p: u32 = second_pred[y * width + x].into();
            let comp = (r + p + 1) >> 1;
            let s: u32 = src[y * src_stride + x].into();
            sad += s.abs_diff(comp);
        }
    }
    sad
}

/// Neighbor samples addressed the way the prediction angles see them.
struct Neighbors<'a, T> {
    above: &'a [T],
    left: &'a [T],
    corner: i64,
}

impl<T: Pixel> Neighbors<'_, T> {
    /// `above[i]`, with `above[-1]` being the corner.
    fn above(&self, i: i64) -> i64 {
        if i < 0 {
            self.corner
        } else {
            let v: u32 = self.above[i as usize].into();
            i64::from(v)
        }
    }

    /// `left[i]`, with `left[-1]` being the corner.
    fn left(&self, i: i64) -> i64 {
        if i < 0 {
            self.corner
        } else {
            let v: u32 = self.left[i as usize].into();
            i64::from(v)
        }
    }

    /// `above[i]` past the supplied samples repeats the last one.
    fn above_clamped(&self, i: i64) -> i64 {
        self.above(i.min(self.above.len() as i64 - 1))
    }
}

fn avg2(a: i64, b: i64) -> i64 {
    (a + b + 1) >> 1
}

fn avg3(a: i64, b: i64, c: i64) -> i64 {
    (a + 2 * b + c + 2) >> 2
}

/// Predicts one `n` x `n` block, one sample at a time. Returns the block packed row by row.
pub fn reference_intra<T: Pixel>(
    mode: PredictionMode,
    n: usize,
    above: &[T],
    left: &[T],
    above_left: T,
    bits_per_sample: NonZeroU8,
) -> Vec<u32> {
    let corner: u32 = above_left.into();
    let nb = Neighbors {
        above: &above[..above.len().min(2 * n)],
        left,
        corner: i64::from(corner),
    };
    let size = n as i64;
    let max = (1i64 << bits_per_sample.get()) - 1;
    let above_sum: i64 = (0..size).map(|i| nb.above(i)).sum();
    let left_sum: i64 = (0..size).map(|i| nb.left(i)).sum();

    let mut out = Vec::with_capacity(n * n);
    for r in 0..size {
        for c in 0..size {
            let value = match mode {
                PredictionMode::Dc => (above_sum + left_sum + size) / (2 * size),
                PredictionMode::DcLeft => (left_sum + size / 2) / size,
                PredictionMode::DcTop => (above_sum + size / 2) / size,
                PredictionMode::Dc128 => 1 << (bits_per_sample.get() - 1),
                PredictionMode::V => nb.above(c),
                PredictionMode::H => nb.left(r),
                PredictionMode::Tm => (nb.above(c) + nb.left(r) - nb.corner).clamp(0, max),
                PredictionMode::D45 => d45(&nb, size, r, c),
                PredictionMode::D117 => d117(&nb, r, c),
                PredictionMode::D135 => d135(&nb, r, c),
            };
            out.push(value as u32);
        }
    }
    out
}

fn d45<T: Pixel>(nb: &Neighbors<'_, T>, size: i64, r: i64, c: i64) -> i64 {
    let k = r + c;
    if k + 2 < 2 * size {
        avg3(
            nb.above_clamped(k),
            nb.above_clamped(k + 1),
            nb.above_clamped(k + 2),
        )
    } else {
        nb.above_clamped(2 * size - 1)
    }
}

fn d117<T: Pixel>(nb: &Neighbors<'_, T>, r: i64, c: i64) -> i64 {
    // Each pair of rows moves the pattern one column right; what enters from the left
    // comes down the left edge.
    let shift = r / 2;
    if c < shift {
        let r = r - 2 * c;
        return avg3(nb.left(r - 3), nb.left(r - 2), nb.left(r - 1));
    }
    let c = c - shift;
    if r % 2 == 0 {
        avg2(nb.above(c - 1), nb.above(c))
    } else if c == 0 {
        avg3(nb.left(0), nb.corner, nb.above(0))
    } else {
        avg3(nb.above(c - 2), nb.above(c - 1), nb.above(c))
    }
}

fn d135<T: Pixel>(nb: &Neighbors<'_, T>, r: i64, c: i64) -> i64 {
    // The border from the bottom of the left column up through the corner and along the
    // above row, indexed so that 0 is the corner.
    let border = |i: i64| {
        if i >= 0 {
            nb.above(i - 1)
        } else {
            nb.left(-i - 1)
        }
    };
    let e = c - r;
    avg3(border(e - 1), border(e), border(e + 1))
}

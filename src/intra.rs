#[cfg(target_arch = "x86_64")]
mod avx2;
mod rust;


use std::{
    fmt,
    num::{NonZeroU8, NonZeroUsize},
};

use bitflags::bitflags;
use cfg_if::cfg_if;
use smallvec::SmallVec;

use crate::{block::BlockSize, cpu::CpuFeatureLevel, util::Pixel};

bitflags! {
    /// Which already-reconstructed neighbors of a block can be used for prediction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EdgeAvailability: u8 {
        const ABOVE = 1;
        const LEFT = 1 << 1;
    }
}

/// Intra prediction modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredictionMode {
    /// Mean of the above row and left column.
    Dc,
    /// Mean of the left column.
    DcLeft,
    /// Mean of the above row.
    DcTop,
    /// The mid-range sample value.
    Dc128,
    /// Copies the above row.
    V,
    /// Copies the left column.
    H,
    /// 45 degrees, from the above row and the samples to its right.
    D45,
    /// 117 degrees, steep down-right from the corner and above row.
    D117,
    /// 135 degrees, the diagonal through the above-left corner.
    D135,
    /// True motion: `above[x] + left[y] - above_left`, clamped.
    Tm,
}

impl PredictionMode {
    pub const ALL: [Self; 10] = [
        Self::Dc,
        Self::DcLeft,
        Self::DcTop,
        Self::Dc128,
        Self::V,
        Self::H,
        Self::D45,
        Self::D117,
        Self::D135,
        Self::Tm,
    ];

    /// Picks the DC variant that only reads the neighbors which exist.
    #[must_use]
    pub const fn dc_for(available: EdgeAvailability) -> Self {
        match (
            available.contains(EdgeAvailability::ABOVE),
            available.contains(EdgeAvailability::LEFT),
        ) {
            (true, true) => Self::Dc,
            (true, false) => Self::DcTop,
            (false, true) => Self::DcLeft,
            (false, false) => Self::Dc128,
        }
    }

    /// Minimum number of `above` samples the mode needs for a `size` x `size` block.
    ///
    /// [`PredictionMode::D45`] reads up to `2 * size`, see [`extend_above`].
    #[must_use]
    pub const fn above_needed(self, size: usize) -> usize {
        match self {
            Self::DcLeft | Self::Dc128 | Self::H => 0,
            _ => size,
        }
    }

    /// Number of `left` samples the mode reads for a `size` x `size` block.
    #[must_use]
    pub const fn left_needed(self, size: usize) -> usize {
        match self {
            Self::DcTop | Self::Dc128 | Self::V | Self::D45 => 0,
            _ => size,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dc => "dc",
            Self::DcLeft => "dc_left",
            Self::DcTop => "dc_top",
            Self::Dc128 => "dc_128",
            Self::V => "v",
            Self::H => "h",
            Self::D45 => "d45",
            Self::D117 => "d117",
            Self::D135 => "d135",
            Self::Tm => "tm",
        }
    }
}

impl fmt::Display for PredictionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The reconstructed neighbors a block is predicted from.
///
/// `above_left` is the sample diagonally adjacent to the top-left corner of the block,
/// which sits directly before `above[0]` and directly above `left[0]`.
#[derive(Debug, Clone, Copy)]
pub struct IntraEdges<'a, T> {
    pub above: &'a [T],
    pub left: &'a [T],
    pub above_left: T,
}

impl<'a, T: Pixel> IntraEdges<'a, T> {
    #[must_use]
    pub const fn new(above: &'a [T], left: &'a [T], above_left: T) -> Self {
        Self {
            above,
            left,
            above_left,
        }
    }
}

/// Extends an above row to the `2 * size` samples read by [`PredictionMode::D45`].
///
/// Samples past the end of `above` repeat its last sample, which is how a codec fills in
/// above-right neighbors that have not been reconstructed.
///
/// # Panics
/// Panics if `above` is empty.
#[must_use]
pub fn extend_above<T: Pixel>(above: &[T], size: NonZeroUsize) -> SmallVec<[T; 64]> {
    let len = 2 * size.get();
    let available = above.len().min(len);
    let last = above[available - 1];
    let mut out: SmallVec<[T; 64]> = above[..available].iter().copied().collect();
    out.resize(len, last);
    out
}

/// Predicts a square block into `dest`.
///
/// Arguments are `(dest, dest_pitch, edges, bits_per_sample)`.
pub type IntraFn<T> = fn(&mut [T], NonZeroUsize, &IntraEdges<T>, NonZeroU8);

/// Looks up the predictor of `level` for `mode` at `size`.
///
/// Returns `None` if the tier cannot run on this machine or has no predictor for the
/// combination. The AVX2 tier only covers wide samples.
#[must_use]
pub fn intra_fn<T: Pixel>(
    level: CpuFeatureLevel,
    mode: PredictionMode,
    size: BlockSize,
) -> Option<IntraFn<T>> {
    match level {
        CpuFeatureLevel::Rust => rust::intra_fn(mode, size),
        CpuFeatureLevel::Avx2 => {
            cfg_if! {
                if #[cfg(all(target_arch = "x86_64", not(feature = "no_simd")))] {
                    if crate::util::has_avx2() {
                        // SAFETY: We check for AVX2 first
                        return unsafe { avx2::intra_fn(mode, size) };
                    }
                }
            }
            None
        }
    }
}

/// Fills a `size` x `size` block at `dest` with the prediction for `mode`.
///
/// `edges.above` must hold at least [`PredictionMode::above_needed`] samples and
/// `edges.left` at least [`PredictionMode::left_needed`]. For [`PredictionMode::D45`], an
/// above row shorter than `2 * size` is extended by repeating its last sample.
///
/// # Panics
/// Panics on a size other than 4, 8, 16 or 32, or if a buffer is too short.
pub fn predict_intra<T: Pixel>(
    mode: PredictionMode,
    size: NonZeroUsize,
    dest: &mut [T],
    dest_pitch: NonZeroUsize,
    edges: &IntraEdges<T>,
    bits_per_sample: NonZeroU8,
) {
    debug_assert!(bits_per_sample.get() as usize <= size_of::<T>() * 8);

    let block = BlockSize {
        width: size,
        height: size,
    };
    let predict = intra_fn(CpuFeatureLevel::current(), mode, block)
        .or_else(|| intra_fn(CpuFeatureLevel::Rust, mode, block))
        .unwrap_or_else(|| unimplemented!("Invalid block size for intra prediction: {}", block));
    predict(dest, dest_pitch, edges, bits_per_sample);
}

#[inline]
fn avg2(a: u32, b: u32) -> u32 {
    (a + b + 1) >> 1
}

#[inline]
fn avg3(a: u32, b: u32, c: u32) -> u32 {
    (a + 2 * b + c + 2) >> 2
}

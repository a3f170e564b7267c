use std::{
    fmt,
    num::{NonZeroU8, NonZeroUsize},
};

use crate::util::max_sample;

/// Dimensions of a block, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockSize {
    pub width: NonZeroUsize,
    pub height: NonZeroUsize,
}

impl BlockSize {
    /// # Panics
    /// Panics if either dimension is zero.
    #[must_use]
    pub const fn new(width: usize, height: usize) -> Self {
        match (NonZeroUsize::new(width), NonZeroUsize::new(height)) {
            (Some(width), Some(height)) => Self { width, height },
            _ => panic!("block dimensions must be non-zero"),
        }
    }

    #[must_use]
    pub const fn square(size: usize) -> Self {
        Self::new(size, size)
    }

    #[must_use]
    pub const fn area(self) -> usize {
        self.width.get() * self.height.get()
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Every partition shape the SAD kernels are implemented for.
pub const SAD_BLOCK_SIZES: [BlockSize; 13] = [
    BlockSize::new(64, 64),
    BlockSize::new(64, 32),
    BlockSize::new(32, 64),
    BlockSize::new(32, 32),
    BlockSize::new(32, 16),
    BlockSize::new(16, 32),
    BlockSize::new(16, 16),
    BlockSize::new(16, 8),
    BlockSize::new(8, 16),
    BlockSize::new(8, 8),
    BlockSize::new(8, 4),
    BlockSize::new(4, 8),
    BlockSize::new(4, 4),
];

/// Every (square) transform size the intra predictors are implemented for.
pub const INTRA_BLOCK_SIZES: [BlockSize; 4] = [
    BlockSize::square(4),
    BlockSize::square(8),
    BlockSize::square(16),
    BlockSize::square(32),
];

/// How samples of a buffer are stored and how many bits of them are significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    /// 8-bit samples in `u8` storage.
    Eight,
    /// 8, 10 or 12-bit samples in `u16` storage.
    High(NonZeroU8),
}

impl BitDepth {
    pub const HIGH_8: Self = Self::High(nonzero_bits(8));
    pub const HIGH_10: Self = Self::High(nonzero_bits(10));
    pub const HIGH_12: Self = Self::High(nonzero_bits(12));

    /// The wide-storage depths exercised by the conformance suites.
    pub const HIGH: [Self; 3] = [Self::HIGH_8, Self::HIGH_10, Self::HIGH_12];

    #[must_use]
    pub const fn bits(self) -> NonZeroU8 {
        match self {
            Self::Eight => nonzero_bits(8),
            Self::High(bits) => bits,
        }
    }

    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High(_))
    }

    /// Largest valid sample value.
    #[must_use]
    pub fn mask(self) -> u32 {
        max_sample(self.bits())
    }
}

const fn nonzero_bits(bits: u8) -> NonZeroU8 {
    match NonZeroU8::new(bits) {
        Some(bits) => bits,
        None => panic!("bit depth must be non-zero"),
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eight => f.write_str("8-bit"),
            Self::High(bits) => write!(f, "high {}-bit", bits),
        }
    }
}

use std::{fmt, num::NonZeroUsize};

use anyhow::{Context, Result, bail, ensure};
use blockdsp::{
    BitDepth, BlockSize, CpuFeatureLevel, IntraEdges, PredictionMode,
    block::INTRA_BLOCK_SIZES,
    intra::{IntraFn, intra_fn},
    util::Pixel,
};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro128StarStar;

use super::{SEED, reference::reference_intra, stage::Stage};

/// Destination pitch, wider than the largest block so overruns land in the padding.
pub const DEST_STRIDE: usize = 32 + 8;

/// Marks destination samples no predictor may write.
const SENTINEL: u32 = 0xA5;

/// How the neighbor samples of a case are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntraScenario {
    Random,
    /// Zero left column under an above row at the largest sample value.
    LeftZeroAboveMax,
    /// Both edges at the largest sample value with a zero corner, so extrapolation saturates.
    Saturated,
    /// Random, with only `size` above samples supplied.
    ShortAbove,
}

impl IntraScenario {
    pub const ALL: [Self; 4] = [
        Self::Random,
        Self::LeftZeroAboveMax,
        Self::Saturated,
        Self::ShortAbove,
    ];
}

impl fmt::Display for IntraScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Neighbor and destination buffers shared by every block size of one tier and bit depth.
pub struct IntraArena<T> {
    above: Vec<T>,
    left: Vec<T>,
    above_left: T,
    dest: Vec<T>,
    rng: Xoshiro128StarStar,
    stage: Stage,
}

impl<T: Pixel> IntraArena<T> {
    pub fn new() -> Self {
        Self {
            above: vec![T::zero(); 2 * 32],
            left: vec![T::zero(); 32],
            above_left: T::zero(),
            // One spare row below the largest block.
            dest: vec![T::zero(); DEST_STRIDE * (32 + 1)],
            rng: Xoshiro128StarStar::from_seed(SEED),
            stage: Stage::SetUp,
        }
    }

    pub fn tear_down(mut self) -> Result<()> {
        self.stage.advance(Stage::TearDown)
    }
}

/// One registered predictor tier at one block size and bit depth.
pub trait IntraInstance {
    fn depth(&self) -> BitDepth;
    fn size(&self) -> BlockSize;
    fn check(&mut self, mode: PredictionMode, scenario: IntraScenario) -> Result<()>;
    /// Predicts twice from the same random edges.
    fn check_deterministic(&mut self, mode: PredictionMode) -> Result<()>;
    /// Predicts the block and returns it packed row by row.
    fn predict(&mut self, mode: PredictionMode, scenario: IntraScenario) -> Result<Vec<u32>>;
    /// The first `size` above and left samples of the last fill.
    fn edges(&self) -> (Vec<u32>, Vec<u32>);
}

pub struct IntraCase<'a, T> {
    arena: &'a mut IntraArena<T>,
    level: CpuFeatureLevel,
    size: BlockSize,
    depth: BitDepth,
}

impl<'a, T: Pixel> IntraCase<'a, T> {
    pub fn new(
        arena: &'a mut IntraArena<T>,
        level: CpuFeatureLevel,
        size: BlockSize,
        depth: BitDepth,
    ) -> Self {
        arena.rng = Xoshiro128StarStar::from_seed(SEED);
        Self {
            arena,
            level,
            size,
            depth,
        }
    }

    fn describe(&self, mode: PredictionMode, scenario: IntraScenario) -> String {
        format!(
            "{} {} {} {} ({})",
            self.level, mode, self.size, self.depth, scenario
        )
    }

    fn predictor(&self, mode: PredictionMode) -> Result<IntraFn<T>> {
        intra_fn::<T>(self.level, mode, self.size)
            .with_context(|| format!("{} has no {} predictor", self.level, mode))
    }

    fn n(&self) -> usize {
        self.size.width.get()
    }

    fn fill_inputs(&mut self, scenario: IntraScenario) -> Result<()> {
        self.arena.stage.advance(Stage::FillInputs)?;

        let mask = self.depth.mask();
        let arena = &mut *self.arena;
        let mut random = || T::from_or_max(u32::from(arena.rng.random::<u16>()) & mask);
        match scenario {
            IntraScenario::Random | IntraScenario::ShortAbove => {
                arena.above.fill_with(&mut random);
                arena.left.fill_with(&mut random);
                arena.above_left = random();
            }
            IntraScenario::LeftZeroAboveMax => {
                arena.above_left = random();
                arena.above.fill(T::from_or_max(mask));
                arena.left.fill(T::zero());
            }
            IntraScenario::Saturated => {
                arena.above.fill(T::from_or_max(mask));
                arena.left.fill(T::from_or_max(mask));
                arena.above_left = T::zero();
            }
        }
        arena.dest.fill(T::from_or_max(SENTINEL));
        Ok(())
    }

    fn above_len(&self, scenario: IntraScenario) -> usize {
        match scenario {
            IntraScenario::ShortAbove => self.n(),
            _ => 2 * self.n(),
        }
    }

    fn invoke(&mut self, predict: IntraFn<T>, above_len: usize) -> Result<()> {
        self.arena.stage.advance(Stage::Invoke)?;
        let n = self.n();
        let arena = &mut *self.arena;
        let edges = IntraEdges::new(&arena.above[..above_len], &arena.left[..n], arena.above_left);
        predict(
            &mut arena.dest,
            NonZeroUsize::new(DEST_STRIDE).context("zero stride")?,
            &edges,
            self.depth.bits(),
        );
        Ok(())
    }

    /// The predicted block packed row by row, after checking nothing around it was written.
    fn read_block(&self) -> Result<Vec<u32>> {
        let n = self.n();
        let sentinel = T::from_or_max(SENTINEL);
        for (i, &sample) in self.arena.dest.iter().enumerate() {
            let (row, col) = (i / DEST_STRIDE, i % DEST_STRIDE);
            if (row >= n || col >= n) && sample != sentinel {
                bail!("wrote outside the block at row {} col {}", row, col);
            }
        }

        Ok(self
            .arena
            .dest
            .chunks(DEST_STRIDE)
            .take(n)
            .flat_map(|row| row[..n].iter().map(|&v| -> u32 { v.into() }))
            .collect())
    }

    fn run_predict(&mut self, mode: PredictionMode, scenario: IntraScenario) -> Result<Vec<u32>> {
        let predict = self.predictor(mode)?;
        self.fill_inputs(scenario)?;
        self.invoke(predict, self.above_len(scenario))?;
        self.arena.stage.advance(Stage::Verify)?;
        self.read_block()
    }

    fn run_check(&mut self, mode: PredictionMode, scenario: IntraScenario) -> Result<()> {
        let actual = self.run_predict(mode, scenario)?;
        let n = self.n();
        let arena = &*self.arena;
        let expected = reference_intra(
            mode,
            n,
            &arena.above[..self.above_len(scenario)],
            &arena.left[..n],
            arena.above_left,
            self.depth.bits(),
        );
        if let Some(i) = (0..n * n).find(|&i| actual[i] != expected[i]) {
            bail!(
                "mismatch at row {} col {}: expected {}, got {}",
                i / n,
                i % n,
                expected[i],
                actual[i]
            );
        }
        Ok(())
    }

    fn run_deterministic(&mut self, mode: PredictionMode) -> Result<()> {
        let predict = self.predictor(mode)?;
        self.fill_inputs(IntraScenario::Random)?;
        let above_len = self.above_len(IntraScenario::Random);
        self.invoke(predict, above_len)?;
        let first = self.arena.dest.clone();
        self.invoke(predict, above_len)?;
        self.arena.stage.advance(Stage::Verify)?;
        ensure!(first == self.arena.dest, "output changed between calls");
        Ok(())
    }
}

impl<T: Pixel> IntraInstance for IntraCase<'_, T> {
    fn depth(&self) -> BitDepth {
        self.depth
    }

    fn size(&self) -> BlockSize {
        self.size
    }

    fn check(&mut self, mode: PredictionMode, scenario: IntraScenario) -> Result<()> {
        self.run_check(mode, scenario)
            .with_context(|| self.describe(mode, scenario))
    }

    fn check_deterministic(&mut self, mode: PredictionMode) -> Result<()> {
        self.run_deterministic(mode)
            .with_context(|| self.describe(mode, IntraScenario::Random))
    }

    fn predict(&mut self, mode: PredictionMode, scenario: IntraScenario) -> Result<Vec<u32>> {
        self.run_predict(mode, scenario)
            .with_context(|| self.describe(mode, scenario))
    }

    fn edges(&self) -> (Vec<u32>, Vec<u32>) {
        let n = self.n();
        let widen = |samples: &[T]| -> Vec<u32> {
            samples[..n].iter().map(|&v| -> u32 { v.into() }).collect()
        };
        (widen(&self.arena.above), widen(&self.arena.left))
    }
}

/// Runs `check` against every registered predictor tier, block size and bit depth.
///
/// Tiers that do not cover a sample width are skipped for it.
pub fn for_each_intra_case(
    mut check: impl FnMut(&mut dyn IntraInstance) -> Result<()>,
) -> Result<()> {
    for level in CpuFeatureLevel::available() {
        run_family::<u8>(level, BitDepth::Eight, &mut check)?;
        for depth in BitDepth::HIGH {
            run_family::<u16>(level, depth, &mut check)?;
        }
    }
    Ok(())
}

fn run_family<T: Pixel>(
    level: CpuFeatureLevel,
    depth: BitDepth,
    check: &mut impl FnMut(&mut dyn IntraInstance) -> Result<()>,
) -> Result<()> {
    if intra_fn::<T>(level, PredictionMode::Dc, BlockSize::square(4)).is_none() {
        return Ok(());
    }

    let mut arena = IntraArena::<T>::new();
    for size in INTRA_BLOCK_SIZES {
        check(&mut IntraCase::new(&mut arena, level, size, depth))?;
    }
    arena.tear_down()
}

use std::fmt;

use anyhow::{Result, ensure};

/// Where the shared buffers of a suite are in their lifecycle.
///
/// A case must get from `FillInputs` through `Verify` before the next case may refill
/// the buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SetUp,
    FillInputs,
    Invoke,
    Verify,
    TearDown,
}

impl Stage {
    pub fn advance(&mut self, next: Self) -> Result<()> {
        let allowed = matches!(
            (*self, next),
            (Self::SetUp | Self::Verify, Self::FillInputs | Self::TearDown)
                | (Self::FillInputs, Self::FillInputs | Self::Invoke)
                | (Self::Invoke, Self::Invoke | Self::Verify)
        );
        ensure!(allowed, "cannot go from {} to {}", self, next);
        *self = next;
        Ok(())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

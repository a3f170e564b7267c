use std::{env, fmt, str::FromStr, sync::OnceLock};

use anyhow::{Result, bail};
use cfg_if::cfg_if;
use log::{info, warn};
use smallvec::SmallVec;

/// Environment variable that can lower the implementation tier used by the dispatchers.
pub const CPU_TARGET_VAR: &str = "BLOCKDSP_CPU_TARGET";

/// The implementation tier that backs a kernel call.
///
/// Tiers are ordered: a machine that can run a tier can run every tier below it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CpuFeatureLevel {
    /// Portable const-generic implementations.
    Rust,
    /// Hand-written `x86_64` AVX2 intrinsics.
    Avx2,
}

static CURRENT: OnceLock<CpuFeatureLevel> = OnceLock::new();

impl CpuFeatureLevel {
    pub const ALL: [Self; 2] = [Self::Rust, Self::Avx2];

    /// The highest tier the host can run, ignoring any override.
    #[must_use]
    pub fn detect() -> Self {
        cfg_if! {
            if #[cfg(all(target_arch = "x86_64", not(feature = "no_simd")))] {
                if crate::util::has_avx2() {
                    return Self::Avx2;
                }
                Self::Rust
            } else {
                Self::Rust
            }
        }
    }

    /// Resolves the tier from the detected one and an optional override value.
    ///
    /// Requests above the detected tier are clamped down to it.
    #[must_use]
    pub fn resolve(detected: Self, manual: Option<&str>) -> Self {
        let Some(manual) = manual else {
            return detected;
        };
        match manual.parse::<Self>() {
            Ok(level) if level > detected => {
                warn!(
                    "{} requested {}, but this CPU only supports {}",
                    CPU_TARGET_VAR, level, detected
                );
                detected
            }
            Ok(level) => level,
            Err(e) => {
                warn!("Ignoring {}: {:#}", CPU_TARGET_VAR, e);
                detected
            }
        }
    }

    /// The tier the public dispatchers use, detected once per process.
    pub fn current() -> Self {
        *CURRENT.get_or_init(|| {
            let manual = env::var(CPU_TARGET_VAR).ok();
            let level = Self::resolve(Self::detect(), manual.as_deref());
            info!("CPU feature level: {}", level);
            level
        })
    }

    /// Every tier that can run on this machine, lowest first.
    #[must_use]
    pub fn available() -> SmallVec<[Self; 2]> {
        let detected = Self::detect();
        Self::ALL.into_iter().filter(|&l| l <= detected).collect()
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Avx2 => "avx2",
        }
    }
}

impl FromStr for CpuFeatureLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        for level in Self::ALL {
            if s.eq_ignore_ascii_case(level.name()) {
                return Ok(level);
            }
        }
        bail!("unknown CPU feature level '{}'", s)
    }
}

impl fmt::Display for CpuFeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

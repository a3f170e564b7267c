#![allow(dead_code, reason = "each test binary uses a different part of the harness")]

pub mod intra_suite;
pub mod reference;
pub mod stage;

pub use intra_suite::{IntraInstance, IntraScenario, for_each_intra_case};
pub use sad_suite::{SadInstance, Scenario, for_each_sad_case};

/// Seed for every random fill, so failures reproduce.
pub const SEED: [u8; 16] = *b"deadbeeflolcakes";

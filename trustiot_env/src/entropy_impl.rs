//! Exploratory context seeded from OS entropy.

use crate::RunContext;

/// Context whose master seed is drawn once from OS entropy.
///
/// Used when the caller asks for a fresh seed (CLI `--seed 0`). The drawn
/// seed is still reported through `seed()`, so an interesting run can be
/// replayed with `SeededContext`.
#[derive(Debug, Clone, Copy)]
pub struct EntropyContext {
    seed: u64,
}

impl EntropyContext {
    /// Creates a new context with a freshly drawn seed.
    pub fn new() -> Self {
        Self {
            seed: rand::random::<u64>(),
        }
    }
}

impl Default for EntropyContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext for EntropyContext {
    fn seed(&self) -> u64 {
        self.seed
    }
}

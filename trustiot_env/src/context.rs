//! Randomness context for deterministic simulation runs.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Independent random streams used by a simulation.
///
/// Setup and cost streams depend only on the run index, so every
/// allocation strategy evaluated in run `i` sees exactly the same
/// devices, servers and cost matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RngStream {
    /// Entity construction by the setup collaborator
    Setup { run: usize },
    
    /// Per-run (device, server) latency/energy matrix
    Costs { run: usize },
    
    /// Allocation decisions of one strategy
    Allocation { run: usize, strategy: u8 },
    
    /// Outcome generation (task stalls) under one strategy
    Outcomes { run: usize, strategy: u8 },
}

impl RngStream {
    /// Returns a 64-bit key unique to this stream.
    pub fn key(&self) -> u64 {
        let (tag, run, strategy) = match *self {
            RngStream::Setup { run } => (1u64, run, 0u8),
            RngStream::Costs { run } => (2, run, 0),
            RngStream::Allocation { run, strategy } => (3, run, strategy),
            RngStream::Outcomes { run, strategy } => (4, run, strategy),
        };
        (tag << 56) ^ ((strategy as u64) << 48) ^ (run as u64 & 0x0000_ffff_ffff_ffff)
    }
}

/// The central interface for randomness.
///
/// # Implementations
///
/// - **Reproducible**: `SeededContext` - a caller-supplied master seed
/// - **Exploratory**: `EntropyContext` - a master seed drawn from OS entropy
///
/// # Determinism
///
/// Every RNG in the system is obtained through `derive_rng`, so two
/// contexts with the same seed hand out bit-identical streams.
pub trait RunContext: Send + Sync {
    /// Returns the master seed (for logging and replay).
    fn seed(&self) -> u64;
    
    /// Derives an independent ChaCha8 RNG for the given stream.
    fn derive_rng(&self, stream: RngStream) -> ChaCha8Rng {
        let combined = self.seed().wrapping_mul(0x517cc1b727220a95)
            ^ stream.key().wrapping_mul(0x9e3779b97f4a7c15);
        ChaCha8Rng::seed_from_u64(combined)
    }
}

/// Context backed by an explicit master seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededContext {
    seed: u64,
}

impl SeededContext {
    /// Creates a new context with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl RunContext for SeededContext {
    fn seed(&self) -> u64 {
        self.seed
    }
}

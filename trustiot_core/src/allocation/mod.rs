//! Allocation strategies.
//!
//! Every strategy maps (devices, servers, costs) to an `Assignment` of each
//! device to at most one server. The set of strategies is closed:
//!
//! - `GameTheoretic` - trust-aware two-sided best-response dynamics
//! - `Greedy` - one pass, each device takes its best feasible server
//! - `Random` - one pass, each device takes a uniformly random feasible server
//!
//! Allocators never read a device's malice label.

mod game_theoretic;
mod greedy;
mod random;

pub use game_theoretic::GameTheoreticAllocator;
pub use greedy::GreedyAllocator;
pub use random::RandomAllocator;

use crate::cost::CostMatrix;
use crate::entities::{Device, Resources, Server};
use crate::utility::UtilityWeights;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use trustiot_env::EnvError;

/// Utilities closer than this are treated as a tie.
pub const UTILITY_TIE_EPSILON: f64 = 1e-12;

/// Device index -> server index (or unassigned) for one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    slots: Vec<Option<usize>>,
}

impl Assignment {
    /// Creates an assignment with every device unassigned.
    pub fn unassigned(num_devices: usize) -> Self {
        Self {
            slots: vec![None; num_devices],
        }
    }
    
    pub fn from_slots(slots: Vec<Option<usize>>) -> Self {
        Self { slots }
    }
    
    /// Server chosen for a device.
    pub fn server_of(&self, device: usize) -> Option<usize> {
        self.slots.get(device).copied().flatten()
    }
    
    pub fn set(&mut self, device: usize, server: Option<usize>) {
        self.slots[device] = server;
    }
    
    pub fn len(&self) -> usize {
        self.slots.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
    
    /// Number of devices with a server.
    pub fn assigned_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
    
    /// Iterates (device index, server index) in device order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<usize>)> + '_ {
        self.slots.iter().copied().enumerate()
    }
}

/// Result of one allocation call.
#[derive(Debug, Clone)]
pub struct AllocationReport {
    pub assignment: Assignment,
    
    /// Internal rounds executed (1 for one-pass strategies)
    pub rounds: usize,
    
    /// False if the round cap was hit before a stable assignment
    pub converged: bool,
}

impl AllocationReport {
    /// Report for a strategy without internal iteration.
    pub fn single_pass(assignment: Assignment) -> Self {
        Self {
            assignment,
            rounds: 1,
            converged: true,
        }
    }
}

/// Common contract of every allocation strategy.
pub trait Allocator {
    /// Returns the strategy name.
    fn name(&self) -> &'static str;
    
    /// Assigns each device to at most one server. Servers are expected to
    /// be reset (zero load) for the iteration; their loads are the baseline.
    fn allocate(&mut self, devices: &[Device], servers: &[Server], costs: &CostMatrix) -> AllocationReport;
}

/// Built-in strategy identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    GameTheoretic,
    Greedy,
    Random,
}

impl StrategyKind {
    /// Returns all strategies in comparison order.
    pub fn all() -> Vec<StrategyKind> {
        vec![StrategyKind::GameTheoretic, StrategyKind::Greedy, StrategyKind::Random]
    }
    
    /// Returns the machine name.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::GameTheoretic => "game_theory",
            StrategyKind::Greedy => "greedy",
            StrategyKind::Random => "random",
        }
    }
    
    /// Returns the human-readable label used in tables.
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::GameTheoretic => "Game-Theoretic",
            StrategyKind::Greedy => "Greedy",
            StrategyKind::Random => "Random",
        }
    }
    
    /// Stable index used to derive per-strategy random streams.
    pub fn index(&self) -> u8 {
        match self {
            StrategyKind::GameTheoretic => 0,
            StrategyKind::Greedy => 1,
            StrategyKind::Random => 2,
        }
    }
    
    /// Builds the allocator for this strategy.
    ///
    /// `rng` is consumed only by the random baseline. `max_rounds` of `None`
    /// lets the game-theoretic allocator run to its proven round bound.
    pub fn build(&self, weights: UtilityWeights, max_rounds: Option<usize>, rng: ChaCha8Rng) -> Strategy {
        match self {
            StrategyKind::GameTheoretic => {
                Strategy::GameTheoretic(GameTheoreticAllocator::new(weights, max_rounds))
            }
            StrategyKind::Greedy => Strategy::Greedy(GreedyAllocator::new(weights)),
            StrategyKind::Random => Strategy::Random(RandomAllocator::new(rng)),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = EnvError;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "game_theory" | "game_theoretic" | "gametheoretic" | "gt" => Ok(StrategyKind::GameTheoretic),
            "greedy" => Ok(StrategyKind::Greedy),
            "random" => Ok(StrategyKind::Random),
            _ => Err(EnvError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Closed set of allocators behind the `Allocator` contract.
#[derive(Debug, Clone)]
pub enum Strategy {
    GameTheoretic(GameTheoreticAllocator),
    Greedy(GreedyAllocator),
    Random(RandomAllocator),
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::GameTheoretic(_) => StrategyKind::GameTheoretic,
            Strategy::Greedy(_) => StrategyKind::Greedy,
            Strategy::Random(_) => StrategyKind::Random,
        }
    }
}

impl Allocator for Strategy {
    fn name(&self) -> &'static str {
        self.kind().name()
    }
    
    fn allocate(&mut self, devices: &[Device], servers: &[Server], costs: &CostMatrix) -> AllocationReport {
        match self {
            Strategy::GameTheoretic(a) => a.allocate(devices, servers, costs),
            Strategy::Greedy(a) => a.allocate(devices, servers, costs),
            Strategy::Random(a) => a.allocate(devices, servers, costs),
        }
    }
}

/// A feasible (server, utility) option for one device.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub server: usize,
    pub utility: f64,
    pub remaining: Resources,
}

/// Orders candidates best-first: higher utility, then more remaining
/// cpu, then more remaining ram, then the server listed first in the setup.
///
/// Position in the setup list is the identifier order, so `edge-2` wins a
/// full tie against `edge-10` when it was listed first.
pub(crate) fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    if (a.utility - b.utility).abs() > UTILITY_TIE_EPSILON {
        return b.utility.total_cmp(&a.utility);
    }
    b.remaining
        .cpu
        .total_cmp(&a.remaining.cpu)
        .then_with(|| b.remaining.ram.total_cmp(&a.remaining.ram))
        .then_with(|| a.server.cmp(&b.server))
}

/// Picks the best of a candidate stream under `compare_candidates`.
pub(crate) fn best_candidate(candidates: impl Iterator<Item = Candidate>) -> Option<Candidate> {
    candidates.fold(None, |best, c| match best {
        Some(b) if compare_candidates(&b, &c) != Ordering::Greater => Some(b),
        _ => Some(c),
    })
}

/// Remaining capacity of `server` at the given load.
pub(crate) fn remaining(server: &Server, load: Resources) -> Resources {
    let capacity = server.capacity();
    Resources::new(capacity.cpu - load.cpu, capacity.ram - load.ram)
}

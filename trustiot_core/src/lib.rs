//! TrustIoT Core - Trust-Aware Task Allocation for IoT Edge Computing
//!
//! This library decides which edge server hosts which IoT device's task:
//! 1. **Entity Model**: devices and servers with a hard capacity invariant
//! 2. **Trust Model**: behavioral reputation learned from task outcomes
//! 3. **Allocation**: game-theoretic best-response dynamics, plus greedy and
//!    random baselines behind the same `Allocator` contract

pub mod allocation;
pub mod cost;
pub mod entities;
pub mod metrics;
pub mod setup;
pub mod trust;
pub mod utility;

// Re-export key types for convenience
pub use allocation::{AllocationReport, Allocator, Assignment, Strategy, StrategyKind};
pub use cost::{CostConfig, CostMatrix, LinkCost};
pub use entities::{Device, Resources, Server, TaskOutcome, NEUTRAL_TRUST};
pub use metrics::{IterationMetrics, MetricKind};
pub use setup::{FnSetup, JsonSetup, Setup, SetupFactory};
pub use trust::{TrustConfig, TrustLedger, TrustModel};
pub use utility::{UtilityModel, UtilityWeights};

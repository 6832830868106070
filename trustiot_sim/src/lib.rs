//! TrustIoT Simulation Harness
//!
//! Drives the allocation strategies of `trustiot_core` through repeated
//! iterations and aggregates the results across independent runs.
//!
//! # Control Flow
//!
//! ```text
//! RunAggregator ──► SimulationEngine (per run) ──► Allocator (per iteration)
//!       ▲                    │
//!       │                    ├──► outcome evaluation (deadlines, stalls)
//!       │                    ├──► TrustModel::update_trust
//!       └── cross-run ◄──────┴──► IterationMetrics
//!           reduction
//! ```
//!
//! # Determinism
//!
//! Every run derives its RNGs from a `RunContext`. Setup and cost streams
//! depend only on the run index, so all strategies face the same devices,
//! servers and links in run `i`, and a run replays bit-identically from
//! its seed.
//!
//! # Usage
//!
//! ```ignore
//! use trustiot_sim::{RunAggregator, ScenarioId, SimConfig};
//! use trustiot_env::SeededContext;
//!
//! let ctx = SeededContext::new(42);
//! let aggregator = RunAggregator::new(&ctx, &ScenarioId::IotEdge, SimConfig::default(), 5)?;
//! let comparison = aggregator.run_all()?;
//! ```

pub mod engine;
pub mod error;
pub mod exporter;
pub mod runner;
pub mod scenarios;
pub mod visualizer;

pub use engine::{RunResult, ServerLoadSnapshot, SimConfig, SimulationEngine};
pub use error::SimError;
pub use exporter::{SeriesPoint, SimExport, StrategyExport};
pub use runner::{
    aggregate_runs, AggregatedIteration, AggregatedResult, Comparison, IterationStats, RunAggregator,
    ServerLoadSummary,
};
pub use scenarios::ScenarioId;
pub use visualizer::TerminalPlotter;

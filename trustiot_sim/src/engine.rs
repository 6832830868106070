//! Simulation Engine - one run of one allocation strategy.
//!
//! Per run the engine walks the state machine
//!
//! ```text
//! Init -> { Iterate -> Evaluate -> UpdateTrust -> RecordMetrics } x iterations -> Finalize
//! ```
//!
//! The engine is a closed, synchronous loop: it owns its devices, servers,
//! cost matrix and RNGs, so independent runs never share mutable state.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use trustiot_core::allocation::{AllocationReport, Allocator};
use trustiot_core::metrics::{mean, population_std, ratio};
use trustiot_core::{
    CostConfig, CostMatrix, Device, IterationMetrics, Server, Setup, TaskOutcome, TrustConfig,
    TrustLedger, TrustModel, UtilityModel, UtilityWeights,
};
use trustiot_env::{EnvError, ServerId};

/// Configuration for a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Iterations per run
    pub iterations: usize,
    
    /// Best-response round cap for the game-theoretic allocator
    /// (`None` = the allocator's proven bound for the setup size)
    pub max_rounds: Option<usize>,
    
    /// Probability that a hosted malicious task stalls past its deadline
    pub malicious_fault_rate: f64,
    
    /// Trust update rule
    pub trust: TrustConfig,
    
    /// Utility weights shared by the allocators
    pub weights: UtilityWeights,
    
    /// Link cost distributions
    pub costs: CostConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            iterations: 50,
            max_rounds: None,
            malicious_fault_rate: 0.8,
            trust: TrustConfig::default(),
            weights: UtilityWeights::default(),
            costs: CostConfig::default(),
        }
    }
}

impl SimConfig {
    /// Sets the number of iterations per run.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }
    
    /// Sets the best-response round cap.
    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = Some(rounds);
        self
    }
    
    /// Sets the malicious stall probability.
    pub fn with_malicious_fault_rate(mut self, rate: f64) -> Self {
        self.malicious_fault_rate = rate;
        self
    }
    
    pub fn with_trust(mut self, trust: TrustConfig) -> Self {
        self.trust = trust;
        self
    }
    
    pub fn with_weights(mut self, weights: UtilityWeights) -> Self {
        self.weights = weights;
        self
    }
    
    pub fn with_costs(mut self, costs: CostConfig) -> Self {
        self.costs = costs;
        self
    }
    
    /// Validates every parameter.
    pub fn validate(&self) -> Result<(), EnvError> {
        if self.iterations == 0 {
            return Err(EnvError::InvalidCount { what: "iterations", value: 0 });
        }
        if self.max_rounds == Some(0) {
            return Err(EnvError::InvalidCount { what: "max_rounds", value: 0 });
        }
        if !(0.0..=1.0).contains(&self.malicious_fault_rate) {
            return Err(EnvError::parameter(
                "malicious_fault_rate",
                format!("{} not in [0, 1]", self.malicious_fault_rate),
            ));
        }
        self.trust.validate()?;
        self.weights.validate()?;
        self.costs.validate()?;
        Ok(())
    }
}

/// Final dominant load of one server at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerLoadSnapshot {
    pub server: ServerId,
    pub load: f64,
}

/// Ordered per-iteration metrics of one complete run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// One entry per iteration
    pub iterations: Vec<IterationMetrics>,
    
    /// Server loads after the last iteration
    pub final_loads: Vec<ServerLoadSnapshot>,
    
    /// Iterations in which the allocator hit its round cap
    pub non_converged_iterations: usize,
}

/// Drives one run of one allocator over a fixed entity set.
pub struct SimulationEngine<A: Allocator> {
    config: SimConfig,
    allocator: A,
    trust_model: TrustModel,
    costs: CostMatrix,
    devices: Vec<Device>,
    servers: Vec<Server>,
    ledger: TrustLedger,
    outcome_rng: ChaCha8Rng,
    metrics: Vec<IterationMetrics>,
    non_converged: usize,
}

impl<A: Allocator> SimulationEngine<A> {
    /// Init: validates the setup and resets loads and trust.
    pub fn new(
        config: SimConfig,
        setup: Setup,
        costs: CostMatrix,
        allocator: A,
        outcome_rng: ChaCha8Rng,
    ) -> Result<Self, EnvError> {
        config.validate()?;
        setup.validate()?;
        let expected = (setup.devices.len(), setup.servers.len());
        if costs.dimensions() != expected {
            let (devices, servers) = costs.dimensions();
            return Err(EnvError::parameter(
                "costs",
                format!(
                    "matrix is {} x {}, setup has {} devices and {} servers",
                    devices, servers, expected.0, expected.1
                ),
            ));
        }
        
        let Setup { mut devices, mut servers } = setup;
        for device in &mut devices {
            device.reset_iteration();
            device.reset_trust(config.trust.initial_trust);
        }
        for server in &mut servers {
            server.reset_iteration();
        }
        
        Ok(Self {
            config,
            allocator,
            trust_model: TrustModel::new(config.trust),
            costs,
            devices,
            servers,
            ledger: TrustLedger::new(),
            outcome_rng,
            metrics: Vec::with_capacity(config.iterations),
            non_converged: 0,
        })
    }
    
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }
    
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }
    
    pub fn ledger(&self) -> &TrustLedger {
        &self.ledger
    }
    
    /// Metrics recorded so far.
    pub fn metrics(&self) -> &[IterationMetrics] {
        &self.metrics
    }
    
    /// Runs one full iteration and returns its metrics.
    pub fn step(&mut self) -> IterationMetrics {
        let report = self.iterate();
        if !report.converged {
            self.non_converged += 1;
        }
        let outcomes = self.evaluate(&report);
        self.update_trust(&outcomes);
        let metrics = self.record_metrics(&outcomes, report.rounds);
        
        debug!(
            "[{}] iteration {}: completion={:.3} adherence={:.3} load_std={:.4} rounds={}",
            self.allocator.name(),
            self.metrics.len(),
            metrics.completion_ratio,
            metrics.deadline_adherence,
            metrics.server_load_std_dev,
            report.rounds
        );
        metrics
    }
    
    /// Runs every iteration, then finalizes.
    pub fn run(mut self) -> RunResult {
        for _ in 0..self.config.iterations {
            self.step();
        }
        self.finalize()
    }
    
    /// Iterate: clears transient state and asks the allocator for an assignment.
    fn iterate(&mut self) -> AllocationReport {
        for device in &mut self.devices {
            device.reset_iteration();
        }
        for server in &mut self.servers {
            server.reset_iteration();
        }
        self.allocator.allocate(&self.devices, &self.servers, &self.costs)
    }
    
    /// Evaluate: commits requests in device order, then checks deadlines
    /// against each server's final committed load.
    fn evaluate(&mut self, report: &AllocationReport) -> Vec<TaskOutcome> {
        let mut outcomes = vec![TaskOutcome::Rejected; self.devices.len()];
        let mut hosted = Vec::new();
        
        for (d, slot) in report.assignment.iter() {
            let Some(s) = slot else { continue };
            if self.servers[s].try_commit(&self.devices[d]) {
                self.devices[d].assigned_server = Some(self.servers[s].id.clone());
                hosted.push((d, s));
            }
        }
        
        for (d, s) in hosted {
            let device = &self.devices[d];
            let server = &self.servers[s];
            let late = self.costs.completion_time(d, device, s, server) > device.deadline;
            // Ground truth drives behavior here, never trust or allocation
            let stalled = device.is_malicious()
                && self.outcome_rng.gen_bool(self.config.malicious_fault_rate);
            
            outcomes[d] = if late || stalled {
                TaskOutcome::DeadlineMissed
            } else {
                TaskOutcome::Completed
            };
        }
        outcomes
    }
    
    /// UpdateTrust: applies each device's outcome.
    fn update_trust(&mut self, outcomes: &[TaskOutcome]) {
        for (device, &outcome) in self.devices.iter_mut().zip(outcomes) {
            self.trust_model.update_trust(device, outcome, &mut self.ledger);
        }
    }
    
    /// RecordMetrics: reduces the iteration to an `IterationMetrics`.
    fn record_metrics(&mut self, outcomes: &[TaskOutcome], rounds: usize) -> IterationMetrics {
        let utility = UtilityModel::new(self.config.weights, &self.costs);
        let total = self.devices.len();
        
        let mut hosted = 0;
        let mut completed = 0;
        let mut malicious = 0;
        let mut malicious_hosted = 0;
        let mut utility_sum = 0.0;
        let mut energy = 0.0;
        let mut honest_trust = Vec::new();
        let mut malicious_trust = Vec::new();
        
        for (d, (device, outcome)) in self.devices.iter().zip(outcomes).enumerate() {
            if device.is_malicious() {
                malicious += 1;
                malicious_trust.push(device.trust());
            } else {
                honest_trust.push(device.trust());
            }
            
            if !outcome.is_hosted() {
                continue;
            }
            hosted += 1;
            if device.is_malicious() {
                malicious_hosted += 1;
            }
            
            let s = self.server_index(device);
            if let Some(s) = s {
                energy += self.costs.get(d, s).energy;
                if outcome.is_success() {
                    completed += 1;
                    utility_sum += utility.realized_service(d, s, &self.servers[s]);
                }
            }
        }
        
        let loads: Vec<f64> = self.servers.iter().map(|s| s.dominant_load_fraction()).collect();
        let initial = self.config.trust.initial_trust;
        let group_mean = |scores: &[f64]| if scores.is_empty() { initial } else { mean(scores) };
        
        let metrics = IterationMetrics {
            avg_device_utility: if total == 0 { 0.0 } else { utility_sum / total as f64 },
            server_load_std_dev: population_std(&loads),
            completion_ratio: ratio(hosted, total),
            deadline_adherence: ratio(completed, hosted),
            malicious_acceptance: ratio(malicious_hosted, malicious),
            avg_trust_honest: group_mean(&honest_trust),
            avg_trust_malicious: group_mean(&malicious_trust),
            total_energy: energy,
            allocation_rounds: rounds as f64,
        };
        self.metrics.push(metrics);
        metrics
    }
    
    fn server_index(&self, device: &Device) -> Option<usize> {
        let id = device.assigned_server.as_ref()?;
        self.servers.iter().position(|s| &s.id == id)
    }
    
    /// Finalize: hands back the metric sequence.
    fn finalize(self) -> RunResult {
        RunResult {
            iterations: self.metrics,
            final_loads: self
                .servers
                .iter()
                .map(|s| ServerLoadSnapshot {
                    server: s.id.clone(),
                    load: s.dominant_load_fraction(),
                })
                .collect(),
            non_converged_iterations: self.non_converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use trustiot_core::allocation::{GameTheoreticAllocator, StrategyKind};
    use trustiot_core::LinkCost;
    
    fn flat_costs(devices: usize, servers: usize) -> CostMatrix {
        CostMatrix::uniform(CostConfig::default(), devices, servers, LinkCost { latency: 5.0, energy: 2.0 })
    }
    
    fn engine_for(setup: Setup, iterations: usize) -> SimulationEngine<GameTheoreticAllocator> {
        let costs = flat_costs(setup.devices.len(), setup.servers.len());
        SimulationEngine::new(
            SimConfig::default().with_iterations(iterations),
            setup,
            costs,
            GameTheoreticAllocator::default(),
            ChaCha8Rng::seed_from_u64(1),
        )
        .unwrap()
    }
    
    #[test]
    fn test_trivial_feasibility() {
        let setup = Setup::new(
            vec![Device::new("module-0", 1.0, 1.0, 100.0)],
            vec![Server::new("edge-0", 4.0, 8.0)],
        );
        let mut engine = engine_for(setup, 10);
        
        let mut last = 0.5;
        for _ in 0..10 {
            let metrics = engine.step();
            assert_eq!(metrics.completion_ratio, 1.0);
            assert_eq!(metrics.deadline_adherence, 1.0);
            assert_eq!(engine.devices()[0].last_outcome, Some(TaskOutcome::Completed));
            let trust = engine.devices()[0].trust();
            assert!(trust > last);
            last = trust;
        }
        assert_eq!(engine.ledger().history(&engine.devices()[0].id).unwrap().len(), 10);
    }
    
    #[test]
    fn test_infeasible_device() {
        let setup = Setup::new(
            vec![Device::new("module-0", 2.0, 2.0, 100.0)],
            vec![Server::new("edge-0", 1.0, 1.0)],
        );
        let mut engine = engine_for(setup, 10);
        
        let mut last = 0.5;
        for _ in 0..10 {
            let metrics = engine.step();
            assert_eq!(metrics.completion_ratio, 0.0);
            assert_eq!(engine.devices()[0].last_outcome, Some(TaskOutcome::Rejected));
            let trust = engine.devices()[0].trust();
            assert!(trust < last);
            last = trust;
        }
    }
    
    #[test]
    fn test_tight_deadline_is_missed() {
        // Latency 5 alone exceeds the deadline
        let setup = Setup::new(
            vec![Device::new("module-0", 1.0, 1.0, 1.0)],
            vec![Server::new("edge-0", 4.0, 8.0)],
        );
        let mut engine = engine_for(setup, 1);
        
        let metrics = engine.step();
        
        assert_eq!(metrics.completion_ratio, 1.0);
        assert_eq!(metrics.deadline_adherence, 0.0);
        assert_eq!(engine.devices()[0].last_outcome, Some(TaskOutcome::DeadlineMissed));
        assert_eq!(metrics.avg_device_utility, 0.0);
    }
    
    #[test]
    fn test_malicious_tasks_stall() {
        let setup = Setup::new(
            vec![Device::new("module-0", 1.0, 1.0, 100.0).with_malice(true)],
            vec![Server::new("edge-0", 4.0, 8.0)],
        );
        let costs = flat_costs(1, 1);
        let config = SimConfig::default().with_malicious_fault_rate(1.0);
        let mut engine = SimulationEngine::new(
            config,
            setup,
            costs,
            GameTheoreticAllocator::default(),
            ChaCha8Rng::seed_from_u64(1),
        )
        .unwrap();
        
        let metrics = engine.step();
        
        assert_eq!(metrics.malicious_acceptance, 1.0);
        assert_eq!(engine.devices()[0].last_outcome, Some(TaskOutcome::DeadlineMissed));
        assert!(metrics.avg_trust_malicious < 0.5);
        // No honest devices: group mean falls back to the initial trust
        assert_eq!(metrics.avg_trust_honest, 0.5);
    }
    
    #[test]
    fn test_run_has_one_record_per_iteration() {
        let setup = Setup::new(
            (0..6).map(|i| Device::new(format!("module-{}", i), 1.0, 1.0, 100.0)).collect(),
            vec![Server::new("edge-0", 4.0, 4.0), Server::new("edge-1", 2.0, 2.0)],
        );
        let result = engine_for(setup, 7).run();
        
        assert_eq!(result.iterations.len(), 7);
        assert_eq!(result.final_loads.len(), 2);
        assert_eq!(result.non_converged_iterations, 0);
    }
    
    #[test]
    fn test_capacity_invariant_every_iteration() {
        let setup = Setup::new(
            (0..40)
                .map(|i| Device::new(format!("module-{}", i), 0.3 + (i % 5) as f64 * 0.2, 0.5, 100.0))
                .collect(),
            vec![Server::new("edge-0", 3.0, 5.0), Server::new("edge-1", 4.0, 2.0)],
        );
        
        for kind in StrategyKind::all() {
            let costs = flat_costs(40, 2);
            let allocator = kind.build(UtilityWeights::default(), None, ChaCha8Rng::seed_from_u64(5));
            let mut engine = SimulationEngine::new(
                SimConfig::default().with_iterations(15),
                setup.clone(),
                costs,
                allocator,
                ChaCha8Rng::seed_from_u64(6),
            )
            .unwrap();
            
            for _ in 0..15 {
                engine.step();
                for server in engine.servers() {
                    assert!(server.load().cpu <= server.capacity().cpu);
                    assert!(server.load().ram <= server.capacity().ram);
                }
                for device in engine.devices() {
                    assert!((0.0..=1.0).contains(&device.trust()));
                }
            }
        }
    }
    
    #[test]
    fn test_invalid_config_is_rejected() {
        let setup = Setup::new(vec![Device::new("a", 1.0, 1.0, 10.0)], vec![Server::new("s", 1.0, 1.0)]);
        let result = SimulationEngine::new(
            SimConfig::default().with_iterations(0),
            setup,
            flat_costs(1, 1),
            GameTheoreticAllocator::default(),
            ChaCha8Rng::seed_from_u64(1),
        );
        assert!(result.is_err());
    }
    
    #[test]
    fn test_round_cap_defaults_to_proven_bound() {
        let config = SimConfig::default();
        
        assert_eq!(config.max_rounds, None);
        assert!(config.validate().is_ok());
        assert!(config.with_max_rounds(0).validate().is_err());
        assert_eq!(config.with_max_rounds(250).max_rounds, Some(250));
    }
    
    #[test]
    fn test_mismatched_cost_matrix_is_rejected() {
        let setup = Setup::new(
            vec![Device::new("a", 1.0, 1.0, 10.0), Device::new("b", 1.0, 1.0, 10.0)],
            vec![Server::new("s", 4.0, 4.0)],
        );
        let result = SimulationEngine::new(
            SimConfig::default(),
            setup,
            flat_costs(1, 1),
            GameTheoreticAllocator::default(),
            ChaCha8Rng::seed_from_u64(1),
        );
        assert!(matches!(result, Err(EnvError::InvalidParameter { name: "costs", .. })));
    }
}

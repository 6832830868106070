//! Run Aggregator - executes each strategy over independent runs and
//! reduces the per-iteration metrics across runs.

use crate::engine::{RunResult, SimConfig, SimulationEngine};
use crate::error::SimError;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use trustiot_core::metrics::{mean, population_std};
use trustiot_core::{CostMatrix, IterationMetrics, MetricKind, Setup, SetupFactory, StrategyKind};
use trustiot_env::{EnvError, RngStream, RunContext, ServerId};

/// Mean and standard deviation of one metric at one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationStats {
    pub mean: f64,
    pub std: f64,
}

/// Cross-run statistics of every metric at one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AggregatedIteration {
    /// Arithmetic mean across runs
    pub mean: IterationMetrics,
    
    /// Population standard deviation across runs
    pub std: IterationMetrics,
}

impl AggregatedIteration {
    pub fn stats(&self, kind: MetricKind) -> IterationStats {
        IterationStats {
            mean: self.mean.get(kind),
            std: self.std.get(kind),
        }
    }
}

/// Mean final load of one server across runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerLoadSummary {
    pub server: ServerId,
    pub mean_load: f64,
}

/// Per-strategy result of all runs.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedResult {
    /// Strategy that produced these runs
    pub strategy: StrategyKind,
    
    /// Number of runs reduced
    pub num_runs: usize,
    
    /// One entry per iteration, in order
    pub iterations: Vec<AggregatedIteration>,
    
    /// Final server loads averaged by server position
    pub final_loads: Vec<ServerLoadSummary>,
    
    /// Iterations (summed over runs) where the allocator hit its round cap
    pub non_converged_iterations: usize,
}

impl AggregatedResult {
    /// Last-iteration means, the row used in the comparison table.
    pub fn summary(&self) -> IterationMetrics {
        self.iterations.last().map(|it| it.mean).unwrap_or_default()
    }
    
    /// Per-iteration statistics of one metric.
    pub fn series(&self, kind: MetricKind) -> Vec<IterationStats> {
        self.iterations.iter().map(|it| it.stats(kind)).collect()
    }
    
    pub fn num_iterations(&self) -> usize {
        self.iterations.len()
    }
}

/// Reduces equal-length runs to per-iteration mean and standard deviation.
///
/// Any run whose length differs from `num_iterations` aborts the
/// reduction; runs are never padded or truncated.
pub fn aggregate_runs(
    strategy: StrategyKind,
    num_iterations: usize,
    runs: &[RunResult],
) -> Result<AggregatedResult, SimError> {
    if runs.is_empty() {
        return Err(EnvError::InvalidCount { what: "num_runs", value: 0 }.into());
    }
    for (run, result) in runs.iter().enumerate() {
        if result.iterations.len() != num_iterations {
            return Err(SimError::TruncatedRun {
                strategy: strategy.name().to_string(),
                run,
                expected: num_iterations,
                actual: result.iterations.len(),
            });
        }
    }
    
    let mut column = Vec::with_capacity(runs.len());
    let iterations = (0..num_iterations)
        .map(|i| {
            let mut stats = AggregatedIteration::default();
            for kind in MetricKind::all() {
                column.clear();
                column.extend(runs.iter().map(|r| r.iterations[i].get(kind)));
                stats.mean.set(kind, mean(&column));
                stats.std.set(kind, population_std(&column));
            }
            stats
        })
        .collect();
    
    let num_servers = runs.iter().map(|r| r.final_loads.len()).min().unwrap_or(0);
    let final_loads = (0..num_servers)
        .map(|s| {
            let loads: Vec<f64> = runs.iter().map(|r| r.final_loads[s].load).collect();
            ServerLoadSummary {
                server: runs[0].final_loads[s].server.clone(),
                mean_load: mean(&loads),
            }
        })
        .collect();
    
    Ok(AggregatedResult {
        strategy,
        num_runs: runs.len(),
        iterations,
        final_loads,
        non_converged_iterations: runs.iter().map(|r| r.non_converged_iterations).sum(),
    })
}

/// Cross-strategy comparison over the same setups and costs.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    /// Setup factory name
    pub setup: String,
    
    /// Master seed
    pub seed: u64,
    
    pub num_runs: usize,
    
    pub num_iterations: usize,
    
    /// One result per strategy, in `StrategyKind::all()` order
    pub results: Vec<AggregatedResult>,
}

impl Comparison {
    pub fn get(&self, strategy: StrategyKind) -> Option<&AggregatedResult> {
        self.results.iter().find(|r| r.strategy == strategy)
    }
}

/// Runs every strategy `num_runs` times against a setup factory.
pub struct RunAggregator<'a> {
    context: &'a dyn RunContext,
    factory: &'a dyn SetupFactory,
    config: SimConfig,
    num_runs: usize,
}

impl<'a> RunAggregator<'a> {
    /// Creates an aggregator, validating the configuration and probing the
    /// setup factory once so bad setups fail before any run starts.
    pub fn new(
        context: &'a dyn RunContext,
        factory: &'a dyn SetupFactory,
        config: SimConfig,
        num_runs: usize,
    ) -> Result<Self, SimError> {
        if num_runs == 0 {
            return Err(EnvError::InvalidCount { what: "num_runs", value: 0 }.into());
        }
        config.validate()?;
        
        let mut rng = context.derive_rng(RngStream::Setup { run: 0 });
        let sample = factory.build(&mut rng)?;
        sample.validate()?;
        debug!(
            "Setup '{}': {} devices ({} malicious), {} servers",
            factory.name(),
            sample.devices.len(),
            sample.malicious_count(),
            sample.servers.len()
        );
        
        Ok(Self {
            context,
            factory,
            config,
            num_runs,
        })
    }
    
    pub fn config(&self) -> &SimConfig {
        &self.config
    }
    
    pub fn num_runs(&self) -> usize {
        self.num_runs
    }
    
    /// Builds the entities and cost matrix of one run. Both depend only on
    /// the run index, so every strategy sees the same run `run`.
    pub fn prepare_run(&self, run: usize) -> Result<(Setup, CostMatrix), SimError> {
        let mut setup_rng = self.context.derive_rng(RngStream::Setup { run });
        let setup = self.factory.build(&mut setup_rng)?;
        setup.validate()?;
        
        let mut cost_rng = self.context.derive_rng(RngStream::Costs { run });
        let costs = CostMatrix::sample(
            self.config.costs,
            setup.devices.len(),
            setup.servers.len(),
            &mut cost_rng,
        )?;
        Ok((setup, costs))
    }
    
    /// Executes one run of one strategy.
    pub fn run_once(&self, strategy: StrategyKind, run: usize) -> Result<RunResult, SimError> {
        let (setup, costs) = self.prepare_run(run)?;
        let stream = strategy.index();
        let allocator = strategy.build(
            self.config.weights,
            self.config.max_rounds,
            self.context.derive_rng(RngStream::Allocation { run, strategy: stream }),
        );
        let outcome_rng = self.context.derive_rng(RngStream::Outcomes { run, strategy: stream });
        
        let engine = SimulationEngine::new(self.config, setup, costs, allocator, outcome_rng)?;
        let result = engine.run();
        
        if result.non_converged_iterations > 0 {
            warn!(
                "{} run {}: {} iterations hit the round cap",
                strategy.label(),
                run,
                result.non_converged_iterations
            );
        }
        Ok(result)
    }
    
    /// Executes all runs of one strategy in parallel and reduces them.
    pub fn run_strategy(&self, strategy: StrategyKind) -> Result<AggregatedResult, SimError> {
        info!("Running {} ({} runs x {} iterations)", strategy.label(), self.num_runs, self.config.iterations);
        
        let runs = (0..self.num_runs)
            .into_par_iter()
            .map(|run| self.run_once(strategy, run))
            .collect::<Result<Vec<_>, _>>()?;
        
        aggregate_runs(strategy, self.config.iterations, &runs)
    }
    
    /// Executes every built-in strategy.
    pub fn run_all(&self) -> Result<Comparison, SimError> {
        let results = StrategyKind::all()
            .into_iter()
            .map(|strategy| self.run_strategy(strategy))
            .collect::<Result<Vec<_>, _>>()?;
        
        Ok(Comparison {
            setup: self.factory.name().to_string(),
            seed: self.context.seed(),
            num_runs: self.num_runs,
            num_iterations: self.config.iterations,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ServerLoadSnapshot;
    use crate::scenarios::ScenarioId;
    use approx::assert_relative_eq;
    use trustiot_core::FnSetup;
    use trustiot_env::SeededContext;
    
    fn run_with(values: &[f64]) -> RunResult {
        RunResult {
            iterations: values
                .iter()
                .map(|&v| IterationMetrics { completion_ratio: v, ..Default::default() })
                .collect(),
            final_loads: vec![ServerLoadSnapshot { server: ServerId::from("edge-0"), load: values[0] }],
            non_converged_iterations: 0,
        }
    }
    
    #[test]
    fn test_mean_and_std_are_exact() {
        let runs = vec![run_with(&[0.2, 1.0]), run_with(&[0.4, 1.0]), run_with(&[0.6, 0.5])];
        
        let result = aggregate_runs(StrategyKind::Greedy, 2, &runs).unwrap();
        let series = result.series(MetricKind::CompletionRatio);
        
        assert_eq!(series.len(), 2);
        assert_relative_eq!(series[0].mean, 0.4, epsilon = 1e-12);
        // Population std of {0.2, 0.4, 0.6}
        assert_relative_eq!(series[0].std, (0.08f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(series[1].mean, 2.5 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(result.summary().completion_ratio, 2.5 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(result.final_loads[0].mean_load, 0.4, epsilon = 1e-12);
    }
    
    #[test]
    fn test_identical_runs_have_zero_std() {
        let runs = vec![run_with(&[0.7]); 4];
        let result = aggregate_runs(StrategyKind::Random, 1, &runs).unwrap();
        
        assert_eq!(result.series(MetricKind::CompletionRatio)[0].std, 0.0);
        assert_eq!(result.num_runs, 4);
    }
    
    #[test]
    fn test_truncated_run_aborts() {
        let runs = vec![run_with(&[0.1, 0.2, 0.3]), run_with(&[0.1, 0.2])];
        
        let err = aggregate_runs(StrategyKind::GameTheoretic, 3, &runs).unwrap_err();
        
        match err {
            SimError::TruncatedRun { run, expected, actual, .. } => {
                assert_eq!(run, 1);
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
    
    #[test]
    fn test_zero_runs_rejected() {
        let ctx = SeededContext::new(1);
        let result = RunAggregator::new(&ctx, &ScenarioId::Trivial, SimConfig::default(), 0);
        assert!(matches!(result, Err(SimError::Config(EnvError::InvalidCount { .. }))));
    }
    
    #[test]
    fn test_bad_setup_fails_before_runs() {
        let ctx = SeededContext::new(1);
        let factory = FnSetup::new("empty", |_| Ok(Setup::new(Vec::new(), Vec::new())));
        
        let result = RunAggregator::new(&ctx, &factory, SimConfig::default(), 3);
        
        assert!(matches!(result, Err(SimError::Config(EnvError::NoDevices))));
    }
    
    #[test]
    fn test_runs_are_reproducible() {
        let ctx = SeededContext::new(7);
        let config = SimConfig::default().with_iterations(10);
        let aggregator = RunAggregator::new(&ctx, &ScenarioId::IotEdge, config, 2).unwrap();
        
        for strategy in StrategyKind::all() {
            let a = aggregator.run_once(strategy, 1).unwrap();
            let b = aggregator.run_once(strategy, 1).unwrap();
            assert_eq!(a.iterations, b.iterations);
        }
    }
    
    #[test]
    fn test_strategies_share_setup_and_costs() {
        let ctx = SeededContext::new(11);
        let aggregator = RunAggregator::new(&ctx, &ScenarioId::IotEdge, SimConfig::default(), 1).unwrap();
        
        let (a, costs_a) = aggregator.prepare_run(0).unwrap();
        let (b, costs_b) = aggregator.prepare_run(0).unwrap();
        
        let ids_a: Vec<_> = a.devices.iter().map(|d| (d.id.clone(), d.is_malicious())).collect();
        let ids_b: Vec<_> = b.devices.iter().map(|d| (d.id.clone(), d.is_malicious())).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(costs_a.get(3, 2), costs_b.get(3, 2));
    }
    
    #[test]
    fn test_run_all_covers_every_strategy() {
        let ctx = SeededContext::new(3);
        let config = SimConfig::default().with_iterations(5);
        let aggregator = RunAggregator::new(&ctx, &ScenarioId::Trivial, config, 3).unwrap();
        
        let comparison = aggregator.run_all().unwrap();
        
        assert_eq!(comparison.results.len(), 3);
        for result in &comparison.results {
            assert_eq!(result.num_iterations(), 5);
            assert_eq!(result.num_runs, 3);
            assert_eq!(result.summary().completion_ratio, 1.0);
        }
    }
    
    #[test]
    fn test_load_balancing_beats_random() {
        let ctx = SeededContext::new(42);
        let aggregator =
            RunAggregator::new(&ctx, &ScenarioId::LoadBalancing, SimConfig::default(), 5).unwrap();
        
        let gt = aggregator.run_strategy(StrategyKind::GameTheoretic).unwrap();
        let random = aggregator.run_strategy(StrategyKind::Random).unwrap();
        
        assert_eq!(gt.num_iterations(), 50);
        assert!(gt.summary().server_load_std_dev < random.summary().server_load_std_dev);
    }
    
    #[test]
    fn test_malicious_devices_lose_trust() {
        let ctx = SeededContext::new(42);
        let config = SimConfig::default().with_iterations(20);
        let aggregator =
            RunAggregator::new(&ctx, &ScenarioId::MaliciousDiscrimination, config, 5).unwrap();
        
        let gt = aggregator.run_strategy(StrategyKind::GameTheoretic).unwrap();
        let first = gt.iterations[0].mean.malicious_acceptance;
        let last = gt.summary();
        
        assert!(last.malicious_acceptance < first);
        assert!(last.avg_trust_malicious < last.avg_trust_honest);
    }
    
    proptest::proptest! {
        #[test]
        fn prop_mean_matches_arithmetic_mean(
            values in proptest::collection::vec(proptest::collection::vec(0.0f64..1.0, 3), 1..8)
        ) {
            let runs: Vec<RunResult> = values.iter().map(|v| run_with(v)).collect();
            let result = aggregate_runs(StrategyKind::Random, 3, &runs).unwrap();
            
            for (i, stats) in result.series(MetricKind::CompletionRatio).iter().enumerate() {
                let column: Vec<f64> = values.iter().map(|v| v[i]).collect();
                let expected = column.iter().sum::<f64>() / column.len() as f64;
                proptest::prop_assert!((stats.mean - expected).abs() < 1e-12);
                proptest::prop_assert!(stats.std >= 0.0);
            }
        }
    }
}

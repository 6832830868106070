//! JSON exporter for external plotting.
//!
//! Exports the labeled (iteration -> mean/std) series of every metric and
//! strategy, plus the final comparison rows.

use crate::error::SimError;
use crate::runner::{AggregatedResult, Comparison, IterationStats};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use trustiot_core::MetricKind;

/// One point of a metric series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub iteration: usize,
    pub mean: f64,
    pub std: f64,
}

/// Every metric series of one strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyExport {
    /// Machine name (`game_theory`, `greedy`, `random`)
    pub strategy: String,
    
    /// Display label
    pub label: String,
    
    /// Metric name -> per-iteration series
    pub series: BTreeMap<String, Vec<SeriesPoint>>,
    
    /// Metric label -> last-iteration mean
    pub summary: BTreeMap<String, f64>,
    
    /// Server id -> mean final dominant load
    pub final_loads: BTreeMap<String, f64>,
}

impl StrategyExport {
    pub fn from_result(result: &AggregatedResult) -> Self {
        let series = MetricKind::all()
            .iter()
            .map(|kind| (kind.name().to_string(), points(&result.series(*kind))))
            .collect();
        
        let summary_row = result.summary();
        let summary = MetricKind::summary()
            .iter()
            .map(|kind| (kind.label().to_string(), summary_row.get(*kind)))
            .collect();
        
        let final_loads = result
            .final_loads
            .iter()
            .map(|l| (l.server.to_string(), l.mean_load))
            .collect();
        
        Self {
            strategy: result.strategy.name().to_string(),
            label: result.strategy.label().to_string(),
            series,
            summary,
            final_loads,
        }
    }
}

fn points(stats: &[IterationStats]) -> Vec<SeriesPoint> {
    stats
        .iter()
        .enumerate()
        .map(|(iteration, s)| SeriesPoint {
            iteration,
            mean: s.mean,
            std: s.std,
        })
        .collect()
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Setup name
    pub setup: String,
    
    /// Seed used
    pub seed: u64,
    
    pub num_runs: usize,
    
    pub num_iterations: usize,
    
    /// One entry per strategy
    pub strategies: Vec<StrategyExport>,
}

impl SimExport {
    /// Builds the export from a finished comparison.
    pub fn from_comparison(comparison: &Comparison) -> Self {
        Self {
            setup: comparison.setup.clone(),
            seed: comparison.seed,
            num_runs: comparison.num_runs,
            num_iterations: comparison.num_iterations,
            strategies: comparison.results.iter().map(StrategyExport::from_result).collect(),
        }
    }
    
    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String, SimError> {
        serde_json::to_string_pretty(self).map_err(|e| SimError::Export(e.to_string()))
    }
    
    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> Result<(), SimError> {
        let json = self.to_json()?;
        let mut file = File::create(path).map_err(|e| SimError::Export(format!("{}: {}", path, e)))?;
        file.write_all(json.as_bytes())
            .map_err(|e| SimError::Export(format!("{}: {}", path, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimConfig;
    use crate::runner::RunAggregator;
    use crate::scenarios::ScenarioId;
    use trustiot_env::SeededContext;
    
    fn comparison() -> Comparison {
        let ctx = SeededContext::new(5);
        let config = SimConfig::default().with_iterations(4);
        RunAggregator::new(&ctx, &ScenarioId::Trivial, config, 2)
            .unwrap()
            .run_all()
            .unwrap()
    }
    
    #[test]
    fn test_export_shape() {
        let export = SimExport::from_comparison(&comparison());
        
        assert_eq!(export.strategies.len(), 3);
        let gt = &export.strategies[0];
        assert_eq!(gt.strategy, "game_theory");
        assert_eq!(gt.series.len(), MetricKind::all().len());
        assert_eq!(gt.series["completion_ratio"].len(), 4);
        assert_eq!(gt.summary.len(), 5);
        assert_eq!(gt.final_loads.len(), 1);
    }
    
    #[test]
    fn test_json_parses_back() {
        let export = SimExport::from_comparison(&comparison());
        let json = export.to_json().unwrap();
        
        let parsed: SimExport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.seed, 5);
        assert_eq!(parsed.num_iterations, 4);
    }
    
    #[test]
    fn test_write_to_missing_dir_fails() {
        let export = SimExport::from_comparison(&comparison());
        let result = export.write_to_file("/nonexistent-dir/export.json");
        assert!(matches!(result, Err(SimError::Export(_))));
    }
}

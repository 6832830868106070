//! TrustIoT Metrics Module
//! =======================
//!
//! A fixed, strongly typed record of what one iteration of one run looked
//! like, plus the small statistics used to reduce records across runs.
//!
//! - **Comparison table**: average device utility, server-load standard
//!   deviation, task completion ratio, deadline adherence, malicious-task
//!   acceptance
//! - **Discrimination**: mean trust of honest vs malicious devices
//! - **Cost / convergence**: total energy of hosted tasks, allocator rounds

use serde::{Deserialize, Serialize};

/// Snapshot of one iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IterationMetrics {
    /// Sum of realized service utility of completed tasks / all devices
    pub avg_device_utility: f64,
    /// Population std of per-server dominant load fraction
    pub server_load_std_dev: f64,
    /// Hosted tasks / all devices
    pub completion_ratio: f64,
    /// Tasks finished within deadline / hosted tasks
    pub deadline_adherence: f64,
    /// Hosted malicious tasks / malicious devices
    pub malicious_acceptance: f64,
    /// Mean trust of honest devices after the update
    pub avg_trust_honest: f64,
    /// Mean trust of malicious devices after the update
    pub avg_trust_malicious: f64,
    /// Energy of all hosted tasks
    pub total_energy: f64,
    /// Internal allocator rounds this iteration
    pub allocation_rounds: f64,
}

/// Field selector for `IterationMetrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    AvgDeviceUtility,
    ServerLoadStdDev,
    CompletionRatio,
    DeadlineAdherence,
    MaliciousAcceptance,
    AvgTrustHonest,
    AvgTrustMalicious,
    TotalEnergy,
    AllocationRounds,
}

impl MetricKind {
    /// Returns every metric in record order.
    pub fn all() -> [MetricKind; 9] {
        [
            MetricKind::AvgDeviceUtility,
            MetricKind::ServerLoadStdDev,
            MetricKind::CompletionRatio,
            MetricKind::DeadlineAdherence,
            MetricKind::MaliciousAcceptance,
            MetricKind::AvgTrustHonest,
            MetricKind::AvgTrustMalicious,
            MetricKind::TotalEnergy,
            MetricKind::AllocationRounds,
        ]
    }
    
    /// Metrics shown in the final comparison table.
    pub fn summary() -> [MetricKind; 5] {
        [
            MetricKind::AvgDeviceUtility,
            MetricKind::ServerLoadStdDev,
            MetricKind::CompletionRatio,
            MetricKind::DeadlineAdherence,
            MetricKind::MaliciousAcceptance,
        ]
    }
    
    /// Returns the machine name.
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::AvgDeviceUtility => "avg_device_utility",
            MetricKind::ServerLoadStdDev => "server_load_std_dev",
            MetricKind::CompletionRatio => "completion_ratio",
            MetricKind::DeadlineAdherence => "deadline_adherence",
            MetricKind::MaliciousAcceptance => "malicious_accepted",
            MetricKind::AvgTrustHonest => "avg_trust_honest",
            MetricKind::AvgTrustMalicious => "avg_trust_malicious",
            MetricKind::TotalEnergy => "total_energy",
            MetricKind::AllocationRounds => "allocation_rounds",
        }
    }
    
    /// Returns the table/plot label.
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::AvgDeviceUtility => "Avg. Device Utility (Higher is Better)",
            MetricKind::ServerLoadStdDev => "Server Load Std. Dev. (Lower is Better)",
            MetricKind::CompletionRatio => "Task Completion Ratio (%)",
            MetricKind::DeadlineAdherence => "Deadline Adherence (%)",
            MetricKind::MaliciousAcceptance => "Malicious Task Acceptance (%)",
            MetricKind::AvgTrustHonest => "Avg. Trust (Honest)",
            MetricKind::AvgTrustMalicious => "Avg. Trust (Malicious)",
            MetricKind::TotalEnergy => "Total Energy",
            MetricKind::AllocationRounds => "Allocation Rounds",
        }
    }
    
    /// True for ratios displayed as percentages.
    pub fn is_percentage(&self) -> bool {
        matches!(
            self,
            MetricKind::CompletionRatio | MetricKind::DeadlineAdherence | MetricKind::MaliciousAcceptance
        )
    }
}

impl IterationMetrics {
    /// Reads one field.
    pub fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::AvgDeviceUtility => self.avg_device_utility,
            MetricKind::ServerLoadStdDev => self.server_load_std_dev,
            MetricKind::CompletionRatio => self.completion_ratio,
            MetricKind::DeadlineAdherence => self.deadline_adherence,
            MetricKind::MaliciousAcceptance => self.malicious_acceptance,
            MetricKind::AvgTrustHonest => self.avg_trust_honest,
            MetricKind::AvgTrustMalicious => self.avg_trust_malicious,
            MetricKind::TotalEnergy => self.total_energy,
            MetricKind::AllocationRounds => self.allocation_rounds,
        }
    }
    
    /// Writes one field.
    pub fn set(&mut self, kind: MetricKind, value: f64) {
        let slot = match kind {
            MetricKind::AvgDeviceUtility => &mut self.avg_device_utility,
            MetricKind::ServerLoadStdDev => &mut self.server_load_std_dev,
            MetricKind::CompletionRatio => &mut self.completion_ratio,
            MetricKind::DeadlineAdherence => &mut self.deadline_adherence,
            MetricKind::MaliciousAcceptance => &mut self.malicious_acceptance,
            MetricKind::AvgTrustHonest => &mut self.avg_trust_honest,
            MetricKind::AvgTrustMalicious => &mut self.avg_trust_malicious,
            MetricKind::TotalEnergy => &mut self.total_energy,
            MetricKind::AllocationRounds => &mut self.allocation_rounds,
        };
        *slot = value;
    }
    
    /// Builds a record field by field.
    pub fn from_fn(mut f: impl FnMut(MetricKind) -> f64) -> Self {
        let mut metrics = Self::default();
        for kind in MetricKind::all() {
            metrics.set(kind, f(kind));
        }
        metrics
    }
}

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0 for an empty slice.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// `numerator / denominator`, or 0 when the denominator is 0.
pub fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

//! The "TRUST" Model - behavioral reputation for IoT devices.
//!
//! Trust is earned and lost purely from observed task outcomes:
//! - **Completed**: exponential smoothing toward 1.0
//! - **Rejected**: mild smoothing toward 0.0
//! - **DeadlineMissed**: strong smoothing toward 0.0
//!
//! The update never looks at a device's ground-truth malice label.
//! Adversarial devices are expected to sink through repeated bad
//! outcomes, which is what makes the honest/malicious discrimination
//! curve meaningful.

use crate::entities::{Device, TaskOutcome, NEUTRAL_TRUST};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trustiot_env::{DeviceId, EnvError};

/// Configuration for the trust update rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Score every device starts a run with
    pub initial_trust: f64,
    
    /// Fraction of the gap to 1.0 closed by a success
    pub reward_rate: f64,
    
    /// Fraction of the score removed by a rejection
    pub rejection_penalty: f64,
    
    /// Fraction of the score removed by a deadline miss
    pub violation_penalty: f64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            initial_trust: NEUTRAL_TRUST,
            reward_rate: 0.1,
            rejection_penalty: 0.05,
            violation_penalty: 0.25,
        }
    }
}

impl TrustConfig {
    /// Checks every rate is in [0, 1].
    pub fn validate(&self) -> Result<(), EnvError> {
        for (name, value) in [
            ("initial_trust", self.initial_trust),
            ("reward_rate", self.reward_rate),
            ("rejection_penalty", self.rejection_penalty),
            ("violation_penalty", self.violation_penalty),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EnvError::parameter(name, format!("{} not in [0, 1]", value)));
            }
        }
        Ok(())
    }
}

/// Per-device trust history over the iterations of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrustLedger {
    histories: BTreeMap<DeviceId, Vec<f64>>,
}

impl TrustLedger {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Appends a score to a device's history.
    pub fn record(&mut self, device: &DeviceId, score: f64) {
        self.histories.entry(device.clone()).or_default().push(score);
    }
    
    /// Returns the recorded scores for a device, oldest first.
    pub fn history(&self, device: &DeviceId) -> Option<&[f64]> {
        self.histories.get(device).map(|h| h.as_slice())
    }
    
    /// Number of devices with at least one recorded score.
    pub fn len(&self) -> usize {
        self.histories.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
    
    /// Iterates (device, history) in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &[f64])> {
        self.histories.iter().map(|(id, h)| (id, h.as_slice()))
    }
    
    pub fn clear(&mut self) {
        self.histories.clear();
    }
}

/// Trust update rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustModel {
    config: TrustConfig,
}

impl TrustModel {
    pub fn new(config: TrustConfig) -> Self {
        Self { config }
    }
    
    pub fn config(&self) -> &TrustConfig {
        &self.config
    }
    
    /// Computes the next score from the current one. Result is in [0, 1].
    pub fn next_score(&self, current: f64, outcome: TaskOutcome) -> f64 {
        let current = current.clamp(0.0, 1.0);
        let next = match outcome {
            TaskOutcome::Completed => current + self.config.reward_rate * (1.0 - current),
            TaskOutcome::Rejected => current - self.config.rejection_penalty * current,
            TaskOutcome::DeadlineMissed => current - self.config.violation_penalty * current,
        };
        next.clamp(0.0, 1.0)
    }
    
    /// Applies an outcome to a device and appends the new score to the ledger.
    pub fn update_trust(
        &self,
        device: &mut Device,
        outcome: TaskOutcome,
        ledger: &mut TrustLedger,
    ) -> f64 {
        let score = self.next_score(device.trust(), outcome);
        device.set_trust(score);
        device.last_outcome = Some(outcome);
        ledger.record(&device.id, score);
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    
    fn outcome_strategy() -> impl Strategy<Value = TaskOutcome> {
        prop_oneof![
            Just(TaskOutcome::Completed),
            Just(TaskOutcome::Rejected),
            Just(TaskOutcome::DeadlineMissed),
        ]
    }
    
    #[test]
    fn test_success_moves_toward_one() {
        let model = TrustModel::default();
        assert_relative_eq!(model.next_score(0.5, TaskOutcome::Completed), 0.55);
    }
    
    #[test]
    fn test_failures_move_toward_zero() {
        let model = TrustModel::default();
        assert_relative_eq!(model.next_score(0.5, TaskOutcome::Rejected), 0.475);
        assert_relative_eq!(model.next_score(0.5, TaskOutcome::DeadlineMissed), 0.375);
    }
    
    #[test]
    fn test_update_records_history() {
        let model = TrustModel::default();
        let mut ledger = TrustLedger::new();
        let mut device = Device::new("module-0", 1.0, 1.0, 30.0);
        
        model.update_trust(&mut device, TaskOutcome::Completed, &mut ledger);
        model.update_trust(&mut device, TaskOutcome::DeadlineMissed, &mut ledger);
        
        let history = ledger.history(&device.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_relative_eq!(history[0], 0.55);
        assert_relative_eq!(history[1], 0.55 * 0.75);
        assert_eq!(device.trust(), history[1]);
        assert_eq!(device.last_outcome, Some(TaskOutcome::DeadlineMissed));
    }
    
    #[test]
    fn test_malice_label_is_ignored() {
        let model = TrustModel::default();
        let mut ledger = TrustLedger::new();
        let mut honest = Device::new("a", 1.0, 1.0, 30.0);
        let mut malicious = Device::new("b", 1.0, 1.0, 30.0).with_malice(true);
        
        for outcome in [TaskOutcome::Completed, TaskOutcome::Rejected, TaskOutcome::Completed] {
            model.update_trust(&mut honest, outcome, &mut ledger);
            model.update_trust(&mut malicious, outcome, &mut ledger);
        }
        
        assert_eq!(honest.trust(), malicious.trust());
    }
    
    #[test]
    fn test_config_validation() {
        assert!(TrustConfig::default().validate().is_ok());
        let bad = TrustConfig { reward_rate: 1.5, ..Default::default() };
        assert!(bad.validate().is_err());
    }
    
    proptest! {
        #[test]
        fn prop_trust_stays_in_bounds(
            start in 0.0f64..=1.0,
            outcomes in proptest::collection::vec(outcome_strategy(), 0..64),
        ) {
            let model = TrustModel::default();
            let mut score = start;
            for outcome in outcomes {
                score = model.next_score(score, outcome);
                prop_assert!((0.0..=1.0).contains(&score));
            }
        }
        
        #[test]
        fn prop_successes_never_decrease(start in 0.0f64..=1.0, k in 1usize..50) {
            let model = TrustModel::default();
            let mut score = start;
            for _ in 0..k {
                let next = model.next_score(score, TaskOutcome::Completed);
                prop_assert!(next >= score);
                score = next;
            }
        }
        
        #[test]
        fn prop_failures_never_increase(
            start in 0.0f64..=1.0,
            missed in proptest::collection::vec(any::<bool>(), 1..50),
        ) {
            let model = TrustModel::default();
            let mut score = start;
            for miss in missed {
                let outcome = if miss { TaskOutcome::DeadlineMissed } else { TaskOutcome::Rejected };
                let next = model.next_score(score, outcome);
                prop_assert!(next <= score);
                score = next;
            }
        }
    }
}

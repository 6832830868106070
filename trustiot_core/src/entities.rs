//! Entity Model - IoT devices (task submitters) and edge servers.
//!
//! Devices and servers are plain records. Identity, requests, capacities
//! and the malice flag are fixed for a run; loads, assignments and trust
//! mutate every iteration through the small mutators below.

use serde::{Deserialize, Serialize};
use std::ops::Add;
use trustiot_env::{DeviceId, EnvError, ServerId};

/// Trust score a device starts every run with.
pub const NEUTRAL_TRUST: f64 = 0.5;

/// A (cpu, ram) pair used for requests, capacities and loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu: f64,
    pub ram: f64,
}

impl Resources {
    pub const ZERO: Resources = Resources { cpu: 0.0, ram: 0.0 };
    
    pub fn new(cpu: f64, ram: f64) -> Self {
        Self { cpu, ram }
    }
}

impl Add for Resources {
    type Output = Resources;
    
    fn add(self, rhs: Resources) -> Resources {
        Resources {
            cpu: self.cpu + rhs.cpu,
            ram: self.ram + rhs.ram,
        }
    }
}

/// Returns true if `request` can be added to `load` without exceeding `capacity`.
///
/// A fully loaded dimension never accepts anything, and the check adds the
/// request to the load exactly as `Server::try_commit` does, so a feasible
/// request can always be committed.
pub fn fits(capacity: Resources, load: Resources, request: Resources) -> bool {
    load.cpu < capacity.cpu
        && load.ram < capacity.ram
        && load.cpu + request.cpu <= capacity.cpu
        && load.ram + request.ram <= capacity.ram
}

/// Largest per-dimension utilization of `load` against `capacity`.
pub fn dominant_fraction(capacity: Resources, load: Resources) -> f64 {
    (load.cpu / capacity.cpu).max(load.ram / capacity.ram)
}

/// Outcome of one allocation attempt for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskOutcome {
    /// Hosted and finished within its deadline
    Completed,
    
    /// Not hosted (no feasible server, refused, or capacity breach)
    Rejected,
    
    /// Hosted, but finished after its deadline
    DeadlineMissed,
}

impl TaskOutcome {
    /// Returns true for the only outcome that earns trust.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Completed)
    }
    
    /// Returns true if the task consumed server resources.
    pub fn is_hosted(&self) -> bool {
        !matches!(self, TaskOutcome::Rejected)
    }
}

/// A simulated IoT device submitting one task per iteration.
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    /// Unique device ID
    pub id: DeviceId,
    
    /// CPU demanded by the device's task
    pub cpu_request: f64,
    
    /// RAM demanded by the device's task
    pub ram_request: f64,
    
    /// Latest acceptable completion time (same unit as link latency)
    pub deadline: f64,
    
    /// Ground-truth adversary label; only outcome generation reads it
    is_malicious: bool,
    
    /// Reputation in [0, 1]
    trust_score: f64,
    
    /// Server hosting the task this iteration
    pub assigned_server: Option<ServerId>,
    
    /// Outcome of the most recent iteration
    pub last_outcome: Option<TaskOutcome>,
}

impl Device {
    /// Creates an honest device at neutral trust.
    pub fn new(id: impl Into<DeviceId>, cpu_request: f64, ram_request: f64, deadline: f64) -> Self {
        Self {
            id: id.into(),
            cpu_request,
            ram_request,
            deadline,
            is_malicious: false,
            trust_score: NEUTRAL_TRUST,
            assigned_server: None,
            last_outcome: None,
        }
    }
    
    /// Sets the adversary label.
    pub fn with_malice(mut self, is_malicious: bool) -> Self {
        self.is_malicious = is_malicious;
        self
    }
    
    /// Returns the ground-truth adversary label.
    pub fn is_malicious(&self) -> bool {
        self.is_malicious
    }
    
    /// Returns the current trust score.
    pub fn trust(&self) -> f64 {
        self.trust_score
    }
    
    /// Sets the trust score, clamped to [0, 1].
    pub(crate) fn set_trust(&mut self, score: f64) {
        self.trust_score = score.clamp(0.0, 1.0);
    }
    
    /// Resets trust to the given starting value (start of a run).
    pub fn reset_trust(&mut self, initial: f64) {
        self.set_trust(initial);
        self.last_outcome = None;
    }
    
    /// Returns the task's resource request.
    pub fn request(&self) -> Resources {
        Resources::new(self.cpu_request, self.ram_request)
    }
    
    /// Clears per-iteration transient state.
    pub fn reset_iteration(&mut self) {
        self.assigned_server = None;
    }
    
    /// Checks requests and deadline are positive finite numbers.
    pub fn validate(&self) -> Result<(), EnvError> {
        for (name, value) in [
            ("cpu_request", self.cpu_request),
            ("ram_request", self.ram_request),
            ("deadline", self.deadline),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(EnvError::request(&self.id, format!("{} = {}", name, value)));
            }
        }
        Ok(())
    }
}

/// A simulated edge server with fixed capacity.
#[derive(Debug, Clone, Serialize)]
pub struct Server {
    /// Unique server ID
    pub id: ServerId,
    
    capacity_cpu: f64,
    capacity_ram: f64,
    current_load_cpu: f64,
    current_load_ram: f64,
    
    /// Devices hosted this iteration, in commit order
    pub assigned_devices: Vec<DeviceId>,
}

impl Server {
    /// Creates an idle server.
    pub fn new(id: impl Into<ServerId>, capacity_cpu: f64, capacity_ram: f64) -> Self {
        Self {
            id: id.into(),
            capacity_cpu,
            capacity_ram,
            current_load_cpu: 0.0,
            current_load_ram: 0.0,
            assigned_devices: Vec::new(),
        }
    }
    
    pub fn capacity(&self) -> Resources {
        Resources::new(self.capacity_cpu, self.capacity_ram)
    }
    
    pub fn load(&self) -> Resources {
        Resources::new(self.current_load_cpu, self.current_load_ram)
    }
    
    /// Returns the unused (cpu, ram).
    pub fn remaining(&self) -> Resources {
        Resources::new(
            self.capacity_cpu - self.current_load_cpu,
            self.capacity_ram - self.current_load_ram,
        )
    }
    
    /// CPU utilization in [0, 1].
    pub fn cpu_load_fraction(&self) -> f64 {
        self.current_load_cpu / self.capacity_cpu
    }
    
    /// Largest of the cpu/ram utilizations.
    pub fn dominant_load_fraction(&self) -> f64 {
        dominant_fraction(self.capacity(), self.load())
    }
    
    /// Returns true if the request fits in the remaining capacity.
    pub fn can_host(&self, request: Resources) -> bool {
        fits(self.capacity(), self.load(), request)
    }
    
    /// Commits a device's request if it fits. Never exceeds capacity.
    pub fn try_commit(&mut self, device: &Device) -> bool {
        let request = device.request();
        if !self.can_host(request) {
            return false;
        }
        self.current_load_cpu += request.cpu;
        self.current_load_ram += request.ram;
        self.assigned_devices.push(device.id.clone());
        true
    }
    
    /// Clears loads and tenants (start of an iteration).
    pub fn reset_iteration(&mut self) {
        self.current_load_cpu = 0.0;
        self.current_load_ram = 0.0;
        self.assigned_devices.clear();
    }
    
    /// Checks capacities are positive finite numbers.
    pub fn validate(&self) -> Result<(), EnvError> {
        for (name, value) in [("capacity_cpu", self.capacity_cpu), ("capacity_ram", self.capacity_ram)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(EnvError::capacity(&self.id, format!("{} = {}", name, value)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    
    #[test]
    fn test_commit_within_capacity() {
        let mut server = Server::new("edge-0", 4.0, 8.0);
        let device = Device::new("module-0", 1.0, 1.0, 30.0);
        
        assert!(server.try_commit(&device));
        assert_eq!(server.load(), Resources::new(1.0, 1.0));
        assert_eq!(server.assigned_devices, vec![DeviceId::from("module-0")]);
        assert_relative_eq!(server.dominant_load_fraction(), 0.25);
    }
    
    #[test]
    fn test_commit_rejects_overflow() {
        let mut server = Server::new("edge-0", 1.0, 1.0);
        let device = Device::new("module-0", 2.0, 2.0, 30.0);
        
        assert!(!server.try_commit(&device));
        assert_eq!(server.load(), Resources::ZERO);
        assert!(server.assigned_devices.is_empty());
    }
    
    #[test]
    fn test_full_server_hosts_nothing() {
        let mut server = Server::new("edge-0", 2.0, 2.0);
        assert!(server.try_commit(&Device::new("a", 2.0, 1.0, 30.0)));
        
        // cpu exhausted, even a tiny request is refused
        assert!(!server.can_host(Resources::new(0.001, 0.001)));
    }
    
    #[test]
    fn test_exact_fill_is_allowed() {
        let mut server = Server::new("edge-0", 1.0, 1.0);
        assert!(server.try_commit(&Device::new("a", 0.5, 0.25, 30.0)));
        assert!(server.try_commit(&Device::new("b", 0.5, 0.25, 30.0)));
        assert_eq!(server.load().cpu, server.capacity().cpu);
        assert!(!server.can_host(Resources::new(0.1, 0.1)));
    }
    
    #[test]
    fn test_reset_iteration() {
        let mut server = Server::new("edge-0", 4.0, 4.0);
        server.try_commit(&Device::new("a", 1.0, 1.0, 30.0));
        server.reset_iteration();
        
        assert_eq!(server.load(), Resources::ZERO);
        assert!(server.assigned_devices.is_empty());
    }
    
    #[test]
    fn test_trust_is_clamped() {
        let mut device = Device::new("a", 1.0, 1.0, 30.0);
        device.set_trust(1.7);
        assert_eq!(device.trust(), 1.0);
        device.set_trust(-0.2);
        assert_eq!(device.trust(), 0.0);
    }
    
    #[test]
    fn test_validation() {
        assert!(Device::new("a", 0.0, 1.0, 30.0).validate().is_err());
        assert!(Device::new("a", 1.0, f64::NAN, 30.0).validate().is_err());
        assert!(Server::new("s", 1.0, -1.0).validate().is_err());
        assert!(Server::new("s", 1.0, 1.0).validate().is_ok());
    }
    
    #[test]
    fn test_outcome_classes() {
        assert!(TaskOutcome::Completed.is_success());
        assert!(TaskOutcome::DeadlineMissed.is_hosted());
        assert!(!TaskOutcome::DeadlineMissed.is_success());
        assert!(!TaskOutcome::Rejected.is_hosted());
    }
}

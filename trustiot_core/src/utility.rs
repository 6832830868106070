//! Utility functions for the device/server allocation game.
//!
//! # Device side
//! ```text
//! headroom(d, s) = min over {cpu, ram} of (capacity - load - request) / capacity
//! service(d, s)  = w_fit * headroom + w_qos / (1 + cost(d, s))
//! U_dev(d, s)    = trust(d) * service(d, s)
//! ```
//! `headroom` is only defined for feasible pairs, lies in [0, 1] and is
//! monotonic in the capacity left after the assignment. With the default
//! weights `U_dev` lies in [0, 1].
//!
//! # Server side
//! ```text
//! U_srv(T) = sum of trust over tenants T - lambda * dominant_load(T)^2
//! ```
//! A server admits a candidate only if the marginal gain is positive, so
//! low-trust devices are turned away from busy servers even when resources
//! remain.

use crate::cost::CostMatrix;
use crate::entities::{dominant_fraction, fits, Device, Resources, Server};
use serde::{Deserialize, Serialize};
use trustiot_env::EnvError;

/// Weights of the device and server utility terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilityWeights {
    /// Weight of resource headroom in device utility
    pub fit: f64,
    
    /// Weight of link quality in device utility
    pub qos: f64,
    
    /// Server-side penalty on squared dominant load
    pub load_penalty: f64,
}

impl Default for UtilityWeights {
    fn default() -> Self {
        Self {
            fit: 0.6,
            qos: 0.4,
            load_penalty: 1.5,
        }
    }
}

impl UtilityWeights {
    pub fn validate(&self) -> Result<(), EnvError> {
        if self.fit < 0.0 || self.qos < 0.0 || self.load_penalty < 0.0 {
            return Err(EnvError::parameter("utility_weights", "weights must be non-negative"));
        }
        if self.fit + self.qos <= 0.0 {
            return Err(EnvError::parameter("utility_weights", "fit + qos must be positive"));
        }
        Ok(())
    }
}

/// Fraction of capacity left after adding `request` to `load`, or `None`
/// if the request does not fit.
pub fn headroom(capacity: Resources, load: Resources, request: Resources) -> Option<f64> {
    if !fits(capacity, load, request) {
        return None;
    }
    let cpu = (capacity.cpu - load.cpu - request.cpu) / capacity.cpu;
    let ram = (capacity.ram - load.ram - request.ram) / capacity.ram;
    Some(cpu.min(ram).clamp(0.0, 1.0))
}

/// Utility evaluator bound to one run's cost matrix.
#[derive(Debug, Clone, Copy)]
pub struct UtilityModel<'a> {
    weights: UtilityWeights,
    costs: &'a CostMatrix,
}

impl<'a> UtilityModel<'a> {
    pub fn new(weights: UtilityWeights, costs: &'a CostMatrix) -> Self {
        Self { weights, costs }
    }
    
    pub fn weights(&self) -> &UtilityWeights {
        &self.weights
    }
    
    /// Trust-free quality of hosting `device` on `server` given the
    /// server's current `load` (excluding the device).
    pub fn service(
        &self,
        device_idx: usize,
        device: &Device,
        server_idx: usize,
        server: &Server,
        load: Resources,
    ) -> Option<f64> {
        let request = device.request();
        let fit = headroom(server.capacity(), load, request)?;
        let after = load + request;
        let cost = self.costs.weighted_cost(device_idx, server_idx, server, after);
        Some(self.weights.fit * fit + self.weights.qos / (1.0 + cost))
    }
    
    /// Trust-discounted device utility, `None` if infeasible.
    pub fn device_utility(
        &self,
        device_idx: usize,
        device: &Device,
        server_idx: usize,
        server: &Server,
        load: Resources,
    ) -> Option<f64> {
        self.service(device_idx, device, server_idx, server, load)
            .map(|u| device.trust() * u)
    }
    
    /// Service quality a hosted device actually received, measured at the
    /// server's committed load (which already includes the device).
    pub fn realized_service(
        &self,
        device_idx: usize,
        server_idx: usize,
        server: &Server,
    ) -> f64 {
        let capacity = server.capacity();
        let load = server.load();
        let fit = ((capacity.cpu - load.cpu) / capacity.cpu)
            .min((capacity.ram - load.ram) / capacity.ram)
            .clamp(0.0, 1.0);
        let cost = self.costs.weighted_cost(device_idx, server_idx, server, load);
        self.weights.fit * fit + self.weights.qos / (1.0 + cost)
    }
    
    /// Server utility of a tenant set summarized by its trust sum and load.
    pub fn server_utility(&self, trust_sum: f64, capacity: Resources, load: Resources) -> f64 {
        let dominant = dominant_fraction(capacity, load);
        trust_sum - self.weights.load_penalty * dominant * dominant
    }
    
    /// Change in server utility from admitting a device with `trust`.
    pub fn marginal_server_gain(
        &self,
        trust: f64,
        capacity: Resources,
        load: Resources,
        request: Resources,
    ) -> f64 {
        let before = dominant_fraction(capacity, load);
        let after = dominant_fraction(capacity, load + request);
        trust - self.weights.load_penalty * (after * after - before * before)
    }
}

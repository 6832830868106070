//! Link cost model: latency and energy between each device and server.
//!
//! Base costs are sampled once per run. Latency grows with the server's
//! cpu utilization, so a crowded server is slower for everyone on it:
//!
//! ```text
//! latency(d, s)    = base_latency(d, s) * (1 + cpu_load(s) / cpu_capacity(s))
//! processing(d, s) = cpu_request(d) / cpu_capacity(s)
//! deadline miss   <=> latency + processing > deadline(d)
//! ```

use crate::entities::{Device, Resources, Server};
use rand::Rng;
use rand_distr::{Distribution, LogNormal, Uniform};
use serde::{Deserialize, Serialize};
use trustiot_env::EnvError;

/// Distribution parameters and device cost weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostConfig {
    /// Mean of ln(base latency)
    pub latency_mu: f64,
    
    /// Standard deviation of ln(base latency)
    pub latency_sigma: f64,
    
    /// Lower bound of the uniform energy cost
    pub energy_min: f64,
    
    /// Upper bound (exclusive) of the uniform energy cost
    pub energy_max: f64,
    
    /// Weight of latency in a device's cost
    pub latency_weight: f64,
    
    /// Weight of energy in a device's cost
    pub energy_weight: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            latency_mu: 2.5,
            latency_sigma: 0.8,
            energy_min: 1.0,
            energy_max: 5.0,
            latency_weight: 0.8,
            energy_weight: 0.2,
        }
    }
}

impl CostConfig {
    pub fn validate(&self) -> Result<(), EnvError> {
        if !self.latency_sigma.is_finite() || self.latency_sigma < 0.0 {
            return Err(EnvError::parameter("latency_sigma", format!("{}", self.latency_sigma)));
        }
        if !(self.energy_min >= 0.0 && self.energy_min < self.energy_max) {
            return Err(EnvError::parameter(
                "energy_range",
                format!("[{}, {}) is empty or negative", self.energy_min, self.energy_max),
            ));
        }
        if self.latency_weight < 0.0 || self.energy_weight < 0.0 {
            return Err(EnvError::parameter("cost_weights", "weights must be non-negative"));
        }
        Ok(())
    }
}

/// Base cost of running one device's task on one server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkCost {
    pub latency: f64,
    pub energy: f64,
}

/// Dense (device x server) matrix of base link costs.
#[derive(Debug, Clone)]
pub struct CostMatrix {
    config: CostConfig,
    num_devices: usize,
    num_servers: usize,
    cells: Vec<LinkCost>,
}

impl CostMatrix {
    /// Samples base costs for every (device, server) pair, row by row.
    pub fn sample<R: Rng>(
        config: CostConfig,
        num_devices: usize,
        num_servers: usize,
        rng: &mut R,
    ) -> Result<Self, EnvError> {
        config.validate()?;
        let latency = LogNormal::new(config.latency_mu, config.latency_sigma)
            .map_err(|e| EnvError::parameter("latency", e.to_string()))?;
        let energy = Uniform::new(config.energy_min, config.energy_max);
        
        let mut cells = Vec::with_capacity(num_devices * num_servers);
        for _ in 0..num_devices * num_servers {
            cells.push(LinkCost {
                latency: latency.sample(rng),
                energy: energy.sample(rng),
            });
        }
        
        Ok(Self {
            config,
            num_devices,
            num_servers,
            cells,
        })
    }
    
    /// Builds a matrix where every pair has the same cost.
    pub fn uniform(config: CostConfig, num_devices: usize, num_servers: usize, cost: LinkCost) -> Self {
        Self {
            config,
            num_devices,
            num_servers,
            cells: vec![cost; num_devices * num_servers],
        }
    }
    
    /// Overrides the base cost of one pair.
    pub fn with_cell(mut self, device: usize, server: usize, cost: LinkCost) -> Self {
        self.cells[device * self.num_servers + server] = cost;
        self
    }
    
    pub fn config(&self) -> &CostConfig {
        &self.config
    }
    
    /// Returns (devices, servers) covered by the matrix.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.num_devices, self.num_servers)
    }
    
    /// Base cost for (device index, server index).
    pub fn get(&self, device: usize, server: usize) -> LinkCost {
        self.cells[device * self.num_servers + server]
    }
    
    /// Latency including congestion from the given cpu load.
    pub fn dynamic_latency(&self, device: usize, server_idx: usize, server: &Server, load: Resources) -> f64 {
        self.get(device, server_idx).latency * (1.0 + load.cpu / server.capacity().cpu)
    }
    
    /// Pure compute time of the task on the server.
    pub fn processing_time(&self, device: &Device, server: &Server) -> f64 {
        device.cpu_request / server.capacity().cpu
    }
    
    /// End-to-end completion time at the server's committed load.
    pub fn completion_time(&self, device_idx: usize, device: &Device, server_idx: usize, server: &Server) -> f64 {
        self.dynamic_latency(device_idx, server_idx, server, server.load())
            + self.processing_time(device, server)
    }
    
    /// Device-side cost: weighted latency plus weighted energy.
    pub fn weighted_cost(&self, device: usize, server_idx: usize, server: &Server, load: Resources) -> f64 {
        self.config.latency_weight * self.dynamic_latency(device, server_idx, server, load)
            + self.config.energy_weight * self.get(device, server_idx).energy
    }
}

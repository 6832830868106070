//! Setup collaborator interface.
//!
//! A setup factory produces the (devices, servers) pair for one run. The
//! engine only ever calls the factory; it never loads or executes external
//! code. User-supplied environments are plain data (`JsonSetup`).

use crate::entities::{Device, Server};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use trustiot_env::EnvError;

/// Deadline range used when a setup file omits a device deadline.
pub const DEFAULT_DEADLINE_RANGE: (f64, f64) = (20.0, 40.0);

/// The entity set of one run.
#[derive(Debug, Clone)]
pub struct Setup {
    pub devices: Vec<Device>,
    pub servers: Vec<Server>,
}

impl Setup {
    pub fn new(devices: Vec<Device>, servers: Vec<Server>) -> Self {
        Self { devices, servers }
    }
    
    /// Checks the pair-of-sequences shape and every entity.
    pub fn validate(&self) -> Result<(), EnvError> {
        if self.devices.is_empty() {
            return Err(EnvError::NoDevices);
        }
        if self.servers.is_empty() {
            return Err(EnvError::NoServers);
        }
        
        let mut seen = HashSet::new();
        for device in &self.devices {
            device.validate()?;
            if !seen.insert(device.id.as_str()) {
                return Err(EnvError::DuplicateDevice(device.id.to_string()));
            }
        }
        
        let mut seen = HashSet::new();
        for server in &self.servers {
            server.validate()?;
            if !seen.insert(server.id.as_str()) {
                return Err(EnvError::DuplicateServer(server.id.to_string()));
            }
        }
        Ok(())
    }
    
    /// Number of devices carrying the malice label.
    pub fn malicious_count(&self) -> usize {
        self.devices.iter().filter(|d| d.is_malicious()).count()
    }
}

/// Produces a fresh entity set for each run.
pub trait SetupFactory: Send + Sync {
    /// Returns the factory name (for logs and exports).
    fn name(&self) -> &str;
    
    /// Builds devices and servers, drawing any randomness from `rng`.
    fn build(&self, rng: &mut ChaCha8Rng) -> Result<Setup, EnvError>;
}

/// Adapter turning a closure into a named setup factory.
pub struct FnSetup<F> {
    name: String,
    build: F,
}

impl<F> FnSetup<F>
where
    F: Fn(&mut ChaCha8Rng) -> Result<Setup, EnvError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, build: F) -> Self {
        Self {
            name: name.into(),
            build,
        }
    }
}

impl<F> SetupFactory for FnSetup<F>
where
    F: Fn(&mut ChaCha8Rng) -> Result<Setup, EnvError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }
    
    fn build(&self, rng: &mut ChaCha8Rng) -> Result<Setup, EnvError> {
        (self.build)(rng)
    }
}

/// One device entry of a setup file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSpec {
    pub id: String,
    pub cpu_request: f64,
    pub ram_request: f64,
    #[serde(default)]
    pub is_malicious: bool,
    /// Drawn uniformly from `DEFAULT_DEADLINE_RANGE` when absent
    #[serde(default)]
    pub deadline: Option<f64>,
}

/// One server entry of a setup file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSpec {
    pub id: String,
    pub capacity_cpu: f64,
    pub capacity_ram: f64,
}

/// Setup file contents: `{ "devices": [...], "servers": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupSpec {
    pub devices: Vec<DeviceSpec>,
    pub servers: Vec<ServerSpec>,
}

/// Data-only setup factory loaded from JSON.
#[derive(Debug, Clone)]
pub struct JsonSetup {
    name: String,
    spec: SetupSpec,
}

impl JsonSetup {
    /// Parses a setup document.
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self, EnvError> {
        let spec: SetupSpec =
            serde_json::from_str(json).map_err(|e| EnvError::MalformedSetup(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            spec,
        })
    }
    
    /// Reads and parses a setup file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EnvError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| EnvError::SetupFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".to_string());
        Self::from_json(name, &json)
    }
    
    pub fn spec(&self) -> &SetupSpec {
        &self.spec
    }
}

impl SetupFactory for JsonSetup {
    fn name(&self) -> &str {
        &self.name
    }
    
    fn build(&self, rng: &mut ChaCha8Rng) -> Result<Setup, EnvError> {
        let (lo, hi) = DEFAULT_DEADLINE_RANGE;
        let devices = self
            .spec
            .devices
            .iter()
            .map(|d| {
                let deadline = d.deadline.unwrap_or_else(|| rng.gen_range(lo..hi));
                Device::new(d.id.as_str(), d.cpu_request, d.ram_request, deadline)
                    .with_malice(d.is_malicious)
            })
            .collect();
        let servers = self
            .spec
            .servers
            .iter()
            .map(|s| Server::new(s.id.as_str(), s.capacity_cpu, s.capacity_ram))
            .collect();
        
        let setup = Setup::new(devices, servers);
        setup.validate()?;
        Ok(setup)
    }
}

//! Built-in setups: realistic workloads and the reference scenarios.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use trustiot_core::{Device, Server, Setup, SetupFactory};
use trustiot_env::{DeviceId, EnvError, ServerId};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// 10 edge servers, 200 IoT modules, 15% malicious
    IotEdge,
    
    /// CPU-bound sensor motes on small gateways
    SensorMote,
    
    /// One small device, one large server
    Trivial,
    
    /// One device larger than the only server
    Infeasible,
    
    /// Honest and persistently failing devices competing for two servers
    MaliciousDiscrimination,
    
    /// 30 identical devices, 3 identical servers
    LoadBalancing,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::IotEdge,
            ScenarioId::SensorMote,
            ScenarioId::Trivial,
            ScenarioId::Infeasible,
            ScenarioId::MaliciousDiscrimination,
            ScenarioId::LoadBalancing,
        ]
    }
    
    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::IotEdge => "iot_edge",
            ScenarioId::SensorMote => "sensor_mote",
            ScenarioId::Trivial => "trivial",
            ScenarioId::Infeasible => "infeasible",
            ScenarioId::MaliciousDiscrimination => "malicious",
            ScenarioId::LoadBalancing => "load_balancing",
        }
    }
    
    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::IotEdge => "10 edge servers, 200 IoT modules (15% malicious), deadlines 20-40",
            ScenarioId::SensorMote => "6 gateways, 80 CPU-bound sensor tasks, RAM unconstrained",
            ScenarioId::Trivial => "1 device (1,1) on 1 server (4,8): always completes",
            ScenarioId::Infeasible => "1 device (2,2) on 1 server (1,1): always rejected",
            ScenarioId::MaliciousDiscrimination => "10 honest + 5 failing devices on 2 servers",
            ScenarioId::LoadBalancing => "30 devices (1,1) on 3 servers (20,20)",
        }
    }
    
    /// Builds the entity set for one run.
    pub fn build_setup(&self, rng: &mut ChaCha8Rng) -> Setup {
        match self {
            ScenarioId::IotEdge => iot_edge(rng),
            ScenarioId::SensorMote => sensor_mote(rng),
            ScenarioId::Trivial => Setup::new(
                vec![Device::new("module-0", 1.0, 1.0, 1000.0)],
                vec![Server::new("edge-0", 4.0, 8.0)],
            ),
            ScenarioId::Infeasible => Setup::new(
                vec![Device::new("module-0", 2.0, 2.0, 1000.0)],
                vec![Server::new("edge-0", 1.0, 1.0)],
            ),
            ScenarioId::MaliciousDiscrimination => malicious_discrimination(),
            ScenarioId::LoadBalancing => Setup::new(
                (0..30).map(|i| Device::new(DeviceId::indexed("module", i), 1.0, 1.0, 1000.0)).collect(),
                (0..3).map(|i| Server::new(ServerId::indexed("edge", i), 20.0, 20.0)).collect(),
            ),
        }
    }
}

impl SetupFactory for ScenarioId {
    fn name(&self) -> &str {
        ScenarioId::name(self)
    }
    
    fn build(&self, rng: &mut ChaCha8Rng) -> Result<Setup, EnvError> {
        let setup = self.build_setup(rng);
        setup.validate()?;
        Ok(setup)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = EnvError;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "iot_edge" | "iotedge" | "iot" => Ok(ScenarioId::IotEdge),
            "sensor_mote" | "sensormote" | "sensor" => Ok(ScenarioId::SensorMote),
            "trivial" => Ok(ScenarioId::Trivial),
            "infeasible" => Ok(ScenarioId::Infeasible),
            "malicious" | "malicious_discrimination" => Ok(ScenarioId::MaliciousDiscrimination),
            "load_balancing" | "loadbalancing" | "balance" => Ok(ScenarioId::LoadBalancing),
            _ => Err(EnvError::UnknownScenario(s.to_string())),
        }
    }
}

const IOT_SERVERS: usize = 10;
const IOT_MODULES: usize = 200;
const IOT_MALICIOUS_FRACTION: f64 = 0.15;

fn iot_edge(rng: &mut ChaCha8Rng) -> Setup {
    let servers = (0..IOT_SERVERS)
        .map(|i| {
            Server::new(
                ServerId::indexed("edge", i),
                rng.gen_range(2.0..8.0),
                rng.gen_range(4.0..16.0),
            )
        })
        .collect();
    
    // Exact malicious count, then shuffled so malice is not tied to id order
    let num_malicious = (IOT_MODULES as f64 * IOT_MALICIOUS_FRACTION).round() as usize;
    let mut labels: Vec<bool> = (0..IOT_MODULES).map(|i| i < num_malicious).collect();
    labels.shuffle(rng);
    
    let devices = labels
        .into_iter()
        .enumerate()
        .map(|(i, is_malicious)| {
            Device::new(
                DeviceId::indexed("module", i),
                rng.gen_range(0.1..1.0),
                rng.gen_range(0.1..0.5),
                rng.gen_range(20.0..40.0),
            )
            .with_malice(is_malicious)
        })
        .collect();
    
    Setup::new(devices, servers)
}

const MOTE_GATEWAYS: usize = 6;
const MOTE_TASKS: usize = 80;
const MOTE_MALICIOUS_FRACTION: f64 = 0.1;
/// Stands in for "no RAM limit" on gateways.
const UNCONSTRAINED_RAM: f64 = 1.0e6;

fn sensor_mote(rng: &mut ChaCha8Rng) -> Setup {
    let servers = (0..MOTE_GATEWAYS)
        .map(|i| Server::new(ServerId::indexed("gateway", i), rng.gen_range(1.0..4.0), UNCONSTRAINED_RAM))
        .collect();
    
    let devices = (0..MOTE_TASKS)
        .map(|i| {
            Device::new(
                DeviceId::indexed("mote", i),
                rng.gen_range(0.05..0.5),
                0.01,
                rng.gen_range(25.0..50.0),
            )
            .with_malice(rng.gen_bool(MOTE_MALICIOUS_FRACTION))
        })
        .collect();
    
    Setup::new(devices, servers)
}

fn malicious_discrimination() -> Setup {
    let honest = (0..10).map(|i| Device::new(DeviceId::indexed("honest", i), 0.5, 0.5, 1000.0));
    // Deadline below any realistic link latency: these tasks always fail
    let failing = (0..5)
        .map(|i| Device::new(DeviceId::indexed("rogue", i), 1.0, 1.0, 1.0).with_malice(true));
    
    Setup::new(
        honest.chain(failing).collect(),
        (0..2).map(|i| Server::new(ServerId::indexed("edge", i), 8.0, 16.0)).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    
    #[test]
    fn test_every_scenario_builds() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for scenario in ScenarioId::all() {
            let setup = SetupFactory::build(&scenario, &mut rng).unwrap();
            assert!(!setup.devices.is_empty(), "{}", scenario);
            assert!(!setup.servers.is_empty(), "{}", scenario);
        }
    }
    
    #[test]
    fn test_iot_edge_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let setup = ScenarioId::IotEdge.build_setup(&mut rng);
        
        assert_eq!(setup.servers.len(), 10);
        assert_eq!(setup.devices.len(), 200);
        assert_eq!(setup.malicious_count(), 30);
        for server in &setup.servers {
            assert!((2.0..8.0).contains(&server.capacity().cpu));
            assert!((4.0..16.0).contains(&server.capacity().ram));
        }
        for device in &setup.devices {
            assert!((20.0..40.0).contains(&device.deadline));
        }
    }
    
    #[test]
    fn test_iot_edge_is_seeded() {
        let a = ScenarioId::IotEdge.build_setup(&mut ChaCha8Rng::seed_from_u64(9));
        let b = ScenarioId::IotEdge.build_setup(&mut ChaCha8Rng::seed_from_u64(9));
        
        let labels = |s: &Setup| s.devices.iter().map(|d| d.is_malicious()).collect::<Vec<_>>();
        assert_eq!(labels(&a), labels(&b));
    }
    
    #[test]
    fn test_parse_names() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>().unwrap(), scenario);
        }
        assert!(matches!("chaos".parse::<ScenarioId>(), Err(EnvError::UnknownScenario(_))));
    }
}

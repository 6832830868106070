//! Trust-aware game-theoretic allocator (two-sided best-response dynamics).
//!
//! # Round structure
//!
//! 1. **Propose**: every unassigned device, in device order, proposes to
//!    the feasible server maximizing its trust-discounted utility. Feasible
//!    means the request fits the server's capacity as already claimed by its
//!    tentative tenants and by earlier proposers in the same round. Servers
//!    that refused the device earlier in this call are skipped.
//! 2. **Accept**: each server ranks tentative tenants plus new proposers by
//!    trust (desc), dominant share (asc), setup position (asc), and admits
//!    candidates greedily while they fit and the marginal server utility is
//!    positive. Everyone else is refused and remembers the refusal.
//! 3. Repeat until a round produces no proposal (stable) or the round cap
//!    is reached (best assignment so far is returned).
//!
//! # Bound
//!
//! Each (device, server) refusal happens at most once per call, so there are
//! at most `D * S` refusals, each displacing at most one tenant. A round
//! without refusals places at least one more device, which can happen at
//! most `D + D * S` times. A stable assignment is thus reached within
//! `2 * D * S + D + 1` rounds (including the final empty round). That bound
//! is the default cap; an explicit `max_rounds` can lower it.

use super::{best_candidate, remaining, AllocationReport, Allocator, Assignment, Candidate};
use crate::cost::CostMatrix;
use crate::entities::{fits, Device, Resources, Server};
use crate::utility::{UtilityModel, UtilityWeights};
use std::cmp::Ordering;
use tracing::{trace, warn};

/// Game-theoretic allocator.
#[derive(Debug, Clone)]
pub struct GameTheoreticAllocator {
    weights: UtilityWeights,
    
    /// Explicit round cap; `None` uses `round_bound` for the input size
    max_rounds: Option<usize>,
}

impl GameTheoreticAllocator {
    pub fn new(weights: UtilityWeights, max_rounds: Option<usize>) -> Self {
        Self {
            weights,
            max_rounds: max_rounds.map(|r| r.max(1)),
        }
    }
    
    pub fn max_rounds(&self) -> Option<usize> {
        self.max_rounds
    }
    
    /// Round cap applied to an input of this size.
    pub fn round_cap(&self, num_devices: usize, num_servers: usize) -> usize {
        self.max_rounds
            .unwrap_or_else(|| Self::round_bound(num_devices, num_servers))
    }
    
    /// Rounds needed in the worst case for an input of this size.
    pub fn round_bound(num_devices: usize, num_servers: usize) -> usize {
        2 * num_devices * num_servers + num_devices + 1
    }
}

impl Default for GameTheoreticAllocator {
    fn default() -> Self {
        Self::new(UtilityWeights::default(), None)
    }
}

/// Mutable negotiation state for one allocation call.
struct Negotiation<'a> {
    devices: &'a [Device],
    servers: &'a [Server],
    utility: UtilityModel<'a>,
    
    /// Server index -> tentatively accepted device indices
    tenants: Vec<Vec<usize>>,
    
    /// Server index -> load of baseline plus tenants
    loads: Vec<Resources>,
    
    /// Device index -> tentative server
    tentative: Vec<Option<usize>>,
    
    /// refused[d * servers + s]: server s turned device d away
    refused: Vec<bool>,
}

impl<'a> Negotiation<'a> {
    fn new(devices: &'a [Device], servers: &'a [Server], utility: UtilityModel<'a>) -> Self {
        Self {
            devices,
            servers,
            utility,
            tenants: vec![Vec::new(); servers.len()],
            loads: servers.iter().map(|s| s.load()).collect(),
            tentative: vec![None; devices.len()],
            refused: vec![false; devices.len() * servers.len()],
        }
    }
    
    fn is_refused(&self, device: usize, server: usize) -> bool {
        self.refused[device * self.servers.len() + server]
    }
    
    fn refuse(&mut self, device: usize, server: usize) {
        self.refused[device * self.servers.len() + server] = true;
    }
    
    /// Device's best feasible server at the given claimed loads.
    fn best_response(&self, device_idx: usize, claimed: &[Resources]) -> Option<usize> {
        let device = &self.devices[device_idx];
        let candidates = self.servers.iter().enumerate().filter_map(|(s, server)| {
            if self.is_refused(device_idx, s) {
                return None;
            }
            let utility = self
                .utility
                .device_utility(device_idx, device, s, server, claimed[s])?;
            Some(Candidate {
                server: s,
                utility,
                remaining: remaining(server, claimed[s]),
            })
        });
        best_candidate(candidates).map(|c| c.server)
    }
    
    /// Proposal phase. Returns server index -> proposing devices.
    fn propose(&self) -> Vec<Vec<usize>> {
        let mut proposals = vec![Vec::new(); self.servers.len()];
        let mut claimed = self.loads.clone();
        
        for d in 0..self.devices.len() {
            if self.tentative[d].is_some() {
                continue;
            }
            if let Some(s) = self.best_response(d, &claimed) {
                claimed[s] = claimed[s] + self.devices[d].request();
                proposals[s].push(d);
            }
        }
        proposals
    }
    
    /// Server ranking: trust desc, dominant share asc, setup order asc.
    fn rank(&self, server: &Server, a: usize, b: usize) -> Ordering {
        let (da, db) = (&self.devices[a], &self.devices[b]);
        let capacity = server.capacity();
        let share = |d: &Device| (d.cpu_request / capacity.cpu).max(d.ram_request / capacity.ram);
        db.trust()
            .total_cmp(&da.trust())
            .then_with(|| share(da).total_cmp(&share(db)))
            .then_with(|| a.cmp(&b))
    }
    
    /// Acceptance phase for one server.
    fn accept(&mut self, s: usize, proposers: Vec<usize>, baseline: Resources) {
        let (devices, servers) = (self.devices, self.servers);
        let server = &servers[s];
        let mut candidates = std::mem::take(&mut self.tenants[s]);
        candidates.extend(proposers);
        candidates.sort_by(|&a, &b| self.rank(server, a, b));
        
        let capacity = server.capacity();
        let mut load = baseline;
        let mut admitted = Vec::with_capacity(candidates.len());
        
        for d in candidates {
            let device = &devices[d];
            let request = device.request();
            let admit = fits(capacity, load, request)
                && self.utility.marginal_server_gain(device.trust(), capacity, load, request) > 0.0;
            
            if admit {
                load = load + request;
                admitted.push(d);
                self.tentative[d] = Some(s);
            } else {
                if self.tentative[d] == Some(s) {
                    self.tentative[d] = None;
                }
                self.refuse(d, s);
            }
        }
        
        self.tenants[s] = admitted;
        self.loads[s] = load;
    }
}

impl Allocator for GameTheoreticAllocator {
    fn name(&self) -> &'static str {
        "game_theory"
    }
    
    fn allocate(&mut self, devices: &[Device], servers: &[Server], costs: &CostMatrix) -> AllocationReport {
        let utility = UtilityModel::new(self.weights, costs);
        let mut state = Negotiation::new(devices, servers, utility);
        let baselines: Vec<Resources> = servers.iter().map(|s| s.load()).collect();
        let cap = self.round_cap(devices.len(), servers.len());
        
        let mut rounds = 0;
        let mut converged = false;
        
        while rounds < cap {
            rounds += 1;
            
            let proposals = state.propose();
            let proposal_count: usize = proposals.iter().map(|p| p.len()).sum();
            if proposal_count == 0 {
                converged = true;
                break;
            }
            
            for (s, proposers) in proposals.into_iter().enumerate() {
                if !proposers.is_empty() {
                    state.accept(s, proposers, baselines[s]);
                }
            }
            
            trace!(
                "best-response round {}: {} proposals, {} tentatively placed",
                rounds,
                proposal_count,
                state.tentative.iter().filter(|t| t.is_some()).count()
            );
        }
        
        if !converged {
            warn!(
                "Game-theoretic allocation hit round cap ({}) before stabilizing; using best assignment so far",
                cap
            );
        }
        
        AllocationReport {
            assignment: Assignment::from_slots(state.tentative),
            rounds,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{CostConfig, LinkCost};
    use proptest::prelude::*;
    
    fn flat_costs(devices: usize, servers: usize) -> CostMatrix {
        CostMatrix::uniform(CostConfig::default(), devices, servers, LinkCost { latency: 10.0, energy: 2.0 })
    }
    
    fn server_loads(assignment: &Assignment, devices: &[Device], servers: &[Server]) -> Vec<Resources> {
        let mut loads = vec![Resources::ZERO; servers.len()];
        for (d, s) in assignment.iter() {
            if let Some(s) = s {
                loads[s] = loads[s] + devices[d].request();
            }
        }
        loads
    }
    
    #[test]
    fn test_single_feasible_device() {
        let devices = vec![Device::new("module-0", 1.0, 1.0, 30.0)];
        let servers = vec![Server::new("edge-0", 4.0, 8.0)];
        let mut allocator = GameTheoreticAllocator::default();
        
        let report = allocator.allocate(&devices, &servers, &flat_costs(1, 1));
        
        assert!(report.converged);
        assert_eq!(report.assignment.server_of(0), Some(0));
    }
    
    #[test]
    fn test_oversized_device_is_unassigned() {
        let devices = vec![Device::new("module-0", 2.0, 2.0, 30.0)];
        let servers = vec![Server::new("edge-0", 1.0, 1.0)];
        let mut allocator = GameTheoreticAllocator::default();
        
        let report = allocator.allocate(&devices, &servers, &flat_costs(1, 1));
        
        assert!(report.converged);
        assert_eq!(report.rounds, 1);
        assert_eq!(report.assignment.server_of(0), None);
    }
    
    #[test]
    fn test_identical_devices_spread_evenly() {
        let devices: Vec<Device> = (0..30)
            .map(|i| Device::new(format!("module-{:02}", i), 1.0, 1.0, 30.0))
            .collect();
        let servers: Vec<Server> = (0..3).map(|i| Server::new(format!("edge-{}", i), 20.0, 20.0)).collect();
        let mut allocator = GameTheoreticAllocator::default();
        
        let report = allocator.allocate(&devices, &servers, &flat_costs(30, 3));
        let loads = server_loads(&report.assignment, &devices, &servers);
        
        assert!(report.converged);
        assert_eq!(report.assignment.assigned_count(), 30);
        for load in loads {
            assert_eq!(load.cpu, 10.0);
        }
    }
    
    #[test]
    fn test_low_trust_device_refused_by_busy_server() {
        let mut devices: Vec<Device> = (0..4)
            .map(|i| Device::new(format!("module-{}", i), 1.0, 1.0, 30.0))
            .collect();
        for d in devices.iter_mut().take(3) {
            d.set_trust(0.9);
        }
        devices[3].set_trust(0.05);
        let servers = vec![Server::new("edge-0", 4.0, 4.0)];
        let mut allocator = GameTheoreticAllocator::default();
        
        let report = allocator.allocate(&devices, &servers, &flat_costs(4, 1));
        
        assert_eq!(report.assignment.assigned_count(), 3);
        assert_eq!(report.assignment.server_of(3), None);
    }
    
    #[test]
    fn test_round_cap_is_respected() {
        let devices: Vec<Device> = (0..12)
            .map(|i| Device::new(format!("module-{}", i), 1.0, 1.0, 30.0))
            .collect();
        let servers = vec![Server::new("edge-0", 3.0, 3.0), Server::new("edge-1", 3.0, 3.0)];
        let mut allocator = GameTheoreticAllocator::new(UtilityWeights::default(), Some(1));
        
        let report = allocator.allocate(&devices, &servers, &flat_costs(12, 2));
        
        assert_eq!(report.rounds, 1);
        assert!(!report.converged);
        // Partial result still honors capacity
        for load in server_loads(&report.assignment, &devices, &servers) {
            assert!(load.cpu <= 3.0 && load.ram <= 3.0);
        }
    }
    
    #[test]
    fn test_default_cap_follows_input_size() {
        let allocator = GameTheoreticAllocator::default();
        
        assert_eq!(allocator.max_rounds(), None);
        assert_eq!(allocator.round_cap(200, 10), 4201);
        assert_eq!(GameTheoreticAllocator::new(UtilityWeights::default(), Some(0)).round_cap(200, 10), 1);
    }
    
    #[test]
    fn test_crowded_instance_converges_under_default_cap() {
        // 120 devices competing for 40 slots: many refusals before settling
        let mut devices: Vec<Device> = (0..120)
            .map(|i| Device::new(format!("module-{}", i), 0.5 + (i % 4) as f64 * 0.25, 0.5, 30.0))
            .collect();
        for (i, d) in devices.iter_mut().enumerate() {
            d.set_trust((i % 10) as f64 / 10.0);
        }
        let servers: Vec<Server> = (0..8).map(|i| Server::new(format!("edge-{}", i), 5.0, 5.0)).collect();
        let mut allocator = GameTheoreticAllocator::default();
        
        let report = allocator.allocate(&devices, &servers, &flat_costs(120, 8));
        
        assert!(report.converged);
        assert!(report.rounds <= GameTheoreticAllocator::round_bound(120, 8));
    }
    
    #[test]
    fn test_malice_label_does_not_change_allocation() {
        let honest: Vec<Device> = (0..6)
            .map(|i| Device::new(format!("module-{}", i), 1.0, 0.5, 30.0))
            .collect();
        let flagged: Vec<Device> = honest.iter().cloned().map(|d| d.with_malice(true)).collect();
        let servers = vec![Server::new("edge-0", 3.0, 3.0), Server::new("edge-1", 2.0, 4.0)];
        let costs = flat_costs(6, 2);
        
        let a = GameTheoreticAllocator::default().allocate(&honest, &servers, &costs);
        let b = GameTheoreticAllocator::default().allocate(&flagged, &servers, &costs);
        
        assert_eq!(a.assignment, b.assignment);
    }
    
    proptest! {
        #[test]
        fn prop_capacity_and_round_bound(
            requests in proptest::collection::vec((0.1f64..3.0, 0.1f64..3.0, 0.0f64..=1.0), 1..25),
            capacities in proptest::collection::vec((0.5f64..8.0, 0.5f64..8.0), 1..5),
        ) {
            let devices: Vec<Device> = requests.iter().enumerate().map(|(i, &(cpu, ram, trust))| {
                let mut d = Device::new(format!("module-{}", i), cpu, ram, 30.0);
                d.set_trust(trust);
                d
            }).collect();
            let servers: Vec<Server> = capacities.iter().enumerate()
                .map(|(i, &(cpu, ram))| Server::new(format!("edge-{}", i), cpu, ram))
                .collect();
            let costs = flat_costs(devices.len(), servers.len());
            let bound = GameTheoreticAllocator::round_bound(devices.len(), servers.len());
            let mut allocator = GameTheoreticAllocator::default();
            
            let report = allocator.allocate(&devices, &servers, &costs);
            
            prop_assert!(report.converged);
            prop_assert!(report.rounds <= bound);
            let loads = server_loads(&report.assignment, &devices, &servers);
            for (load, server) in loads.iter().zip(&servers) {
                prop_assert!(load.cpu <= server.capacity().cpu);
                prop_assert!(load.ram <= server.capacity().ram);
            }
        }
    }
}

//! Greedy baseline: one pass, no negotiation.
//!
//! Devices are visited largest request first (cpu + ram, ties by
//! setup order) and each takes the feasible server with the highest
//! immediate service utility at the loads placed so far.

use super::{best_candidate, remaining, AllocationReport, Allocator, Assignment, Candidate};
use crate::cost::CostMatrix;
use crate::entities::{Device, Resources, Server};
use crate::utility::{UtilityModel, UtilityWeights};

#[derive(Debug, Clone, Default)]
pub struct GreedyAllocator {
    weights: UtilityWeights,
}

impl GreedyAllocator {
    pub fn new(weights: UtilityWeights) -> Self {
        Self { weights }
    }
}

/// Device indices sorted by descending total request, then setup order.
pub(crate) fn largest_first(devices: &[Device]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..devices.len()).collect();
    order.sort_by(|&a, &b| {
        let (da, db) = (&devices[a], &devices[b]);
        (db.cpu_request + db.ram_request)
            .total_cmp(&(da.cpu_request + da.ram_request))
            .then_with(|| a.cmp(&b))
    });
    order
}

impl Allocator for GreedyAllocator {
    fn name(&self) -> &'static str {
        "greedy"
    }
    
    fn allocate(&mut self, devices: &[Device], servers: &[Server], costs: &CostMatrix) -> AllocationReport {
        let model = UtilityModel::new(self.weights, costs);
        let mut loads: Vec<Resources> = servers.iter().map(|s| s.load()).collect();
        let mut assignment = Assignment::unassigned(devices.len());
        
        for d in largest_first(devices) {
            let device = &devices[d];
            let candidates = servers.iter().enumerate().filter_map(|(s, server)| {
                let utility = model.service(d, device, s, server, loads[s])?;
                Some(Candidate {
                    server: s,
                    utility,
                    remaining: remaining(server, loads[s]),
                })
            });
            
            if let Some(best) = best_candidate(candidates) {
                loads[best.server] = loads[best.server] + device.request();
                assignment.set(d, Some(best.server));
            }
        }
        
        AllocationReport::single_pass(assignment)
    }
}

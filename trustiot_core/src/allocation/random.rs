//! Random baseline: each device takes a uniformly random feasible server.

use super::{AllocationReport, Allocator, Assignment};
use crate::cost::CostMatrix;
use crate::entities::{fits, Device, Resources, Server};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone)]
pub struct RandomAllocator {
    rng: ChaCha8Rng,
}

impl RandomAllocator {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self { rng }
    }
}

impl Allocator for RandomAllocator {
    fn name(&self) -> &'static str {
        "random"
    }
    
    fn allocate(&mut self, devices: &[Device], servers: &[Server], _costs: &CostMatrix) -> AllocationReport {
        let mut loads: Vec<Resources> = servers.iter().map(|s| s.load()).collect();
        let mut assignment = Assignment::unassigned(devices.len());
        let mut feasible = Vec::with_capacity(servers.len());
        
        for (d, device) in devices.iter().enumerate() {
            let request = device.request();
            feasible.clear();
            feasible.extend(
                servers
                    .iter()
                    .enumerate()
                    .filter(|(s, server)| fits(server.capacity(), loads[*s], request))
                    .map(|(s, _)| s),
            );
            
            if let Some(&s) = feasible.choose(&mut self.rng) {
                loads[s] = loads[s] + request;
                assignment.set(d, Some(s));
            }
        }
        
        AllocationReport::single_pass(assignment)
    }
}

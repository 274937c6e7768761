//! Memory accounting snapshots

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a worker's memory accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Sum of outstanding allocation sizes in bytes
    pub estimated_bytes: usize,
    /// Total allocations recorded over the tracker's lifetime
    pub allocations: u64,
    /// Total deallocations recorded over the tracker's lifetime
    pub deallocations: u64,
    /// Allocations lacking a matching deallocation, always
    /// `allocations - deallocations`
    pub leaked: u64,
    /// Highest value `estimated_bytes` has reached
    pub peak_bytes: usize,
}

impl MemoryStats {
    /// True when every allocation has been matched by a deallocation
    pub fn is_balanced(&self) -> bool {
        self.leaked == 0 && self.estimated_bytes == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_balanced() {
        assert!(MemoryStats::default().is_balanced());
    }

    #[test]
    fn outstanding_bytes_are_unbalanced() {
        let stats = MemoryStats {
            estimated_bytes: 128,
            allocations: 2,
            deallocations: 1,
            leaked: 1,
            peak_bytes: 256,
        };
        assert!(!stats.is_balanced());
    }
}

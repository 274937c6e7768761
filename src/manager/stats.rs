//! Pool-wide statistics

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Aggregate of every live worker's memory accounting plus worker counts
///
/// Computed on demand; never double-counts across workers since each owns
/// an independent tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Workers not yet terminated
    pub active_workers: usize,
    /// Workers that have terminated
    pub terminated_workers: usize,
    /// Sum of live workers' outstanding allocation bytes
    pub total_estimated_bytes: usize,
    /// Sum of live workers' allocation counts
    pub total_allocations: u64,
    /// Sum of live workers' deallocation counts
    pub total_deallocations: u64,
    /// Sum of live workers' leaked allocation counts
    pub total_leaked: u64,
    /// Sum of live workers' outstanding allocation records
    pub active_allocations: usize,
    /// Shared buffers currently registered
    pub shared_buffers: usize,
}

/// Lifetime counters for a pool manager
#[derive(Debug, Default)]
pub struct ManagerStats {
    /// Workers spawned over the manager's lifetime
    pub workers_spawned: AtomicUsize,
    /// Workers terminated through the manager or their handles
    pub workers_terminated: AtomicUsize,
    /// Shared buffers created through the manager
    pub buffers_created: AtomicUsize,
}

impl ManagerStats {
    /// Spawned minus terminated
    pub fn live_workers(&self) -> usize {
        let spawned = self.workers_spawned.load(Ordering::Relaxed);
        let terminated = self.workers_terminated.load(Ordering::Relaxed);
        spawned.saturating_sub(terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_workers_never_underflows() {
        let stats = ManagerStats::default();
        stats.workers_terminated.fetch_add(3, Ordering::Relaxed);
        assert_eq!(stats.live_workers(), 0);
    }
}

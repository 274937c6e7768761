//! Allocation/deallocation bookkeeping for a single worker

use std::{collections::HashMap, sync::Mutex, time::SystemTime};

use super::stats::MemoryStats;

/// Unique identifier for tracked allocations
pub type AllocationId = u64;

/// A single tracked allocation, owned exclusively by one tracker
#[derive(Debug, Clone)]
pub struct Allocation {
    /// Identifier handed back to the caller
    pub id: AllocationId,
    /// Requested size in bytes
    pub size_bytes: usize,
    /// Timestamp when the allocation was recorded
    pub allocated_at: SystemTime,
}

/// Interior state guarded by a single lock so that counters and the live
/// map can never be observed out of sync
#[derive(Debug, Default)]
struct TrackerInner {
    live: HashMap<AllocationId, Allocation>,
    estimated_bytes: usize,
    allocations: u64,
    deallocations: u64,
    peak_bytes: usize,
    next_id: AllocationId,
}

/// Per-worker allocation and leak accounting
///
/// `allocate` always succeeds; this layer only records, it does not bound.
/// Leaks are derived (`allocations - deallocations`) rather than stored,
/// so the figure cannot drift from the counters that define it.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    inner: Mutex<TrackerInner>,
}

impl MemoryTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an allocation of `size_bytes` and return its id
    pub fn allocate(&self, size_bytes: usize) -> AllocationId {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;

        inner.live.insert(
            id,
            Allocation {
                id,
                size_bytes,
                allocated_at: SystemTime::now(),
            },
        );
        inner.estimated_bytes += size_bytes;
        inner.allocations += 1;
        if inner.estimated_bytes > inner.peak_bytes {
            inner.peak_bytes = inner.estimated_bytes;
        }

        id
    }

    /// Remove a recorded allocation
    ///
    /// Returns false (and changes nothing) for unknown or already-freed ids.
    pub fn deallocate(&self, id: AllocationId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.live.remove(&id) {
            Some(allocation) => {
                inner.estimated_bytes -= allocation.size_bytes;
                inner.deallocations += 1;
                true
            }
            None => false,
        }
    }

    /// Snapshot the current accounting
    pub fn stats(&self) -> MemoryStats {
        let inner = self.inner.lock().unwrap();
        MemoryStats {
            estimated_bytes: inner.estimated_bytes,
            allocations: inner.allocations,
            deallocations: inner.deallocations,
            leaked: inner.allocations - inner.deallocations,
            peak_bytes: inner.peak_bytes,
        }
    }

    /// Ids of allocations still outstanding
    pub fn leaked_ids(&self) -> Vec<AllocationId> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<AllocationId> = inner.live.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of outstanding allocations
    pub fn active_allocations(&self) -> usize {
        self.inner.lock().unwrap().live.len()
    }

    /// Drop all records and zero the counters
    ///
    /// Used on worker termination, where outstanding allocations are
    /// conceptually released with the worker.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = TrackerInner::default();
    }
}

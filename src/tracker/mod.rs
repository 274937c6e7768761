//! Per-worker memory accounting
//!
//! Every worker owns exactly one [`MemoryTracker`]. The tracker records
//! allocations and deallocations, maintains the estimated outstanding byte
//! total and running peak, and derives leak counts instead of storing them.
//! Capacity bounding is not done at this layer; it is delegated to the
//! paged sandbox pool.

pub mod stats;
pub mod tracker;

pub use stats::MemoryStats;
pub use tracker::{Allocation, AllocationId, MemoryTracker};

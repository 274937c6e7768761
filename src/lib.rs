//! # Sandpool - Bounded-Memory Extraction Worker Pool
//!
//! Sandpool dispatches opaque extraction tasks to isolated workers running
//! inside fixed-capacity sandboxed memory. It is an in-process concurrency
//! primitive: worker lifecycle state machines, per-worker memory
//! accounting, a paged bounded allocator, and a cross-worker shared-buffer
//! registry with access auditing.
//!
//! ## Features
//!
//! - **Bounded FIFO workers**: per-worker message queues with a
//!   construction-time capacity and strict FIFO delivery
//! - **Fault-isolated dispatch**: a failing listener is routed to error
//!   listeners and never halts delivery or the worker
//! - **Per-worker accounting**: allocation/deallocation counters with
//!   derived leak figures that cannot desync
//! - **Paged sandbox allocator**: deterministic first-fit allocation over
//!   a fixed anonymous mapping, failing on fragmented-insufficient space
//! - **Shared buffers**: named raw regions visible to every worker, with
//!   an append-only cross-worker access log
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  PoolManager                     │
//! ├──────────────────────────┬───────────────────────┤
//! │  WorkerHandle (× N)      │  SharedBufferRegistry │
//! │  - lifecycle machine     │  - named raw regions  │
//! │  - bounded FIFO queue    │  - typed views        │
//! │  - MemoryTracker         │  - access log         │
//! │  - PagedPool (optional)  │                       │
//! └──────────────────────────┴───────────────────────┘
//! ```
//!
//! Delivery is asynchronous relative to `post_message`'s return and FIFO
//! per worker; across workers there is no ordering guarantee and no
//! shared lock between queues. The only genuinely shared resource is the
//! registry's raw buffers, which are mutated without pool-enforced
//! synchronization.

pub mod error;
pub mod manager;
pub mod paged;
pub mod shared;
pub mod tracker;
pub mod worker;

// Main API re-exports
pub use error::{PoolError, Result};
pub use manager::{ManagerStats, PoolConfig, PoolManager, PoolStats};
pub use paged::{PageRegion, PageView, PagedPool};
pub use shared::{
    AccessKind, AccessRecord, Element, ElementKind, RegistryStats, SharedBuffer,
    SharedBufferRegistry, TypedView,
};
pub use tracker::{Allocation, AllocationId, MemoryStats, MemoryTracker};
pub use worker::{
    DeliveryTicket, EventKind, ListenerId, MessageEvent, SandboxConfig, WorkerConfig, WorkerHandle,
    WorkerId, WorkerState,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants
pub mod config {
    /// Default per-worker message capacity
    pub const DEFAULT_WORKER_CAPACITY: usize = 64;

    /// Default allocation granule for sandbox pools (64KB)
    pub const DEFAULT_PAGE_SIZE: usize = 64 * 1024;

    /// Default sandbox pool capacity (16MB)
    pub const DEFAULT_SANDBOX_BYTES: usize = 16 * 1024 * 1024;
}

//! Worker lifecycle, bounded message queue, and event dispatch
//!
//! A [`WorkerHandle`] is one isolated execution unit: a dedicated delivery
//! thread draining a bounded FIFO queue, a private [`crate::tracker::MemoryTracker`],
//! and optionally a private sandbox [`crate::paged::PagedPool`]. Lifecycle
//! is Ready ⇄ Processing → Terminated, with Terminated absorbing.
//!
//! `post_message` validates synchronously and returns immediately;
//! delivery happens on the worker's own thread, strictly FIFO, one
//! message at a time. Listener failures are caught at the dispatch site
//! and surfaced to error listeners without stopping delivery.

pub mod config;
pub mod events;
pub mod handle;
pub mod state;

pub use config::{SandboxConfig, WorkerConfig};
pub use events::{EventKind, ListenerId, MessageEvent};
pub use handle::{DeliveryTicket, WorkerHandle};
pub use state::WorkerState;

/// Unique identifier for workers within a pool
pub type WorkerId = u32;

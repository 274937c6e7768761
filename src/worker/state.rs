//! Worker lifecycle state snapshots

use std::time::SystemTime;

use serde::Serialize;

/// Immutable snapshot of a worker's lifecycle state
///
/// Returned by value; never a live reference into the worker. Invariants
/// at rest: `terminated` is monotonic (once true, stays true),
/// `ready == !terminated`, and `processing` is true only while a message
/// is mid-delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerState {
    /// Worker construction completed
    pub initialized: bool,
    /// Accepting messages
    pub ready: bool,
    /// A message is currently mid-delivery
    pub processing: bool,
    /// Worker has been terminated (absorbing)
    pub terminated: bool,
    /// When the worker was spawned
    pub created_at: SystemTime,
    /// Last delivery completion (spawn time until the first delivery)
    pub last_activity: SystemTime,
    /// Messages in flight (queued plus mid-delivery)
    pub current_load: usize,
    /// Messages waiting in the queue
    pub queue_len: usize,
}

impl WorkerState {
    /// True when the worker is idle and accepting work
    pub fn is_idle(&self) -> bool {
        self.ready && !self.processing && self.current_load == 0
    }
}

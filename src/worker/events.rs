//! Event listener registration and dispatch tables

use std::{collections::HashMap, sync::Arc, time::SystemTime};

use crate::error::{PoolError, Result};

use super::WorkerId;

/// Event categories a listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A message was delivered to the worker
    Message,
    /// A listener failed during dispatch
    Error,
    /// The worker transitioned to Terminated
    Terminate,
}

/// Handle for unregistering a listener
pub type ListenerId = u64;

/// A delivered message as seen by message listeners
#[derive(Debug, Clone)]
pub struct MessageEvent {
    /// Worker the message was delivered on
    pub worker_id: WorkerId,
    /// Opaque payload; this core never inspects its contents
    pub payload: Arc<Vec<u8>>,
    /// When the message was enqueued
    pub arrival: SystemTime,
    /// FIFO sequence number, 1-based per worker
    pub sequence: u64,
}

pub(crate) type MessageListener = Arc<dyn Fn(&MessageEvent) -> Result<()> + Send + Sync>;
pub(crate) type ErrorListener = Arc<dyn Fn(&PoolError) + Send + Sync>;
pub(crate) type TerminateListener = Arc<dyn Fn(WorkerId) + Send + Sync>;

/// Tagged dispatch table: event kind to registered callbacks
///
/// Emission iterates a defensive snapshot, so a handler may unregister
/// mid-dispatch without corrupting the current delivery.
#[derive(Default)]
pub(crate) struct ListenerTable {
    next_id: ListenerId,
    message: HashMap<ListenerId, MessageListener>,
    error: HashMap<ListenerId, ErrorListener>,
    terminate: HashMap<ListenerId, TerminateListener>,
}

impl ListenerTable {
    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_message(&mut self, listener: MessageListener) -> ListenerId {
        let id = self.next_id();
        self.message.insert(id, listener);
        id
    }

    pub fn add_error(&mut self, listener: ErrorListener) -> ListenerId {
        let id = self.next_id();
        self.error.insert(id, listener);
        id
    }

    pub fn add_terminate(&mut self, listener: TerminateListener) -> ListenerId {
        let id = self.next_id();
        self.terminate.insert(id, listener);
        id
    }

    pub fn remove(&mut self, kind: EventKind, id: ListenerId) -> bool {
        match kind {
            EventKind::Message => self.message.remove(&id).is_some(),
            EventKind::Error => self.error.remove(&id).is_some(),
            EventKind::Terminate => self.terminate.remove(&id).is_some(),
        }
    }

    pub fn clear(&mut self) {
        self.message.clear();
        self.error.clear();
        self.terminate.clear();
    }

    /// Snapshot message listeners in registration order
    pub fn message_snapshot(&self) -> Vec<MessageListener> {
        Self::ordered(&self.message)
    }

    pub fn error_snapshot(&self) -> Vec<ErrorListener> {
        Self::ordered(&self.error)
    }

    pub fn terminate_snapshot(&self) -> Vec<TerminateListener> {
        Self::ordered(&self.terminate)
    }

    fn ordered<T: Clone>(table: &HashMap<ListenerId, T>) -> Vec<T> {
        let mut entries: Vec<(&ListenerId, &T)> = table.iter().collect();
        entries.sort_by_key(|(id, _)| **id);
        entries.into_iter().map(|(_, l)| l.clone()).collect()
    }
}

impl std::fmt::Debug for ListenerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerTable")
            .field("message", &self.message.len())
            .field("error", &self.error.len())
            .field("terminate", &self.terminate.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn snapshots_preserve_registration_order() {
        let mut table = ListenerTable::default();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for tag in 0..3u8 {
            let order = order.clone();
            table.add_message(Arc::new(move |_| {
                order.lock().unwrap().push(tag);
                Ok(())
            }));
        }

        let event = MessageEvent {
            worker_id: 0,
            payload: Arc::new(Vec::new()),
            arrival: SystemTime::now(),
            sequence: 1,
        };
        for listener in table.message_snapshot() {
            listener(&event).unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn remove_targets_the_right_kind() {
        let mut table = ListenerTable::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let id = table.add_error(Arc::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(!table.remove(EventKind::Message, id));
        assert!(table.remove(EventKind::Error, id));
        assert!(!table.remove(EventKind::Error, id));
        assert!(table.error_snapshot().is_empty());
    }
}

//! Registry of named shared buffers

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, RwLock,
    },
};

use log::{debug, trace};

use crate::{
    error::{PoolError, Result},
    worker::{WorkerHandle, WorkerId},
};

use super::{
    buffer::{AccessKind, AccessRecord, SharedBuffer},
    view::{Element, TypedView},
};

/// Registry-wide counters
#[derive(Debug, Default)]
pub struct RegistryStats {
    /// Buffers created over the registry's lifetime
    pub buffers_created: AtomicUsize,
    /// Buffers dropped (individually or via teardown)
    pub buffers_dropped: AtomicUsize,
    /// Access records appended across all buffers
    pub accesses_logged: AtomicU64,
    /// Bytes currently resident across all buffers
    pub resident_bytes: AtomicUsize,
    /// Peak resident bytes
    pub peak_resident_bytes: AtomicUsize,
}

impl RegistryStats {
    /// Current buffer count (created - dropped)
    pub fn active_buffers(&self) -> usize {
        let created = self.buffers_created.load(Ordering::Relaxed);
        let dropped = self.buffers_dropped.load(Ordering::Relaxed);
        created.saturating_sub(dropped)
    }

    fn add_resident(&self, bytes: usize) {
        let current = self.resident_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let mut peak = self.peak_resident_bytes.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_resident_bytes.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => peak = x,
            }
        }
    }

    fn sub_resident(&self, bytes: usize) {
        self.resident_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }
}

/// Named shared memory regions visible to every worker in a pool
///
/// Owned by the pool manager and handed to workers by reference at
/// registration time; never ambient global state.
#[derive(Debug, Default)]
pub struct SharedBufferRegistry {
    buffers: RwLock<HashMap<String, Arc<SharedBuffer>>>,
    stats: RegistryStats,
}

impl SharedBufferRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer under `name`, or return the existing one
    ///
    /// Creation is idempotent per name: a second call performs no second
    /// allocation and ignores `size_bytes`.
    pub fn create_buffer(&self, name: &str, size_bytes: usize) -> Result<Arc<SharedBuffer>> {
        {
            let buffers = self.buffers.read().unwrap();
            if let Some(existing) = buffers.get(name) {
                return Ok(existing.clone());
            }
        }

        let mut buffers = self.buffers.write().unwrap();
        // Racing creator may have won between the locks
        if let Some(existing) = buffers.get(name) {
            return Ok(existing.clone());
        }

        let buffer = Arc::new(SharedBuffer::new(name, size_bytes)?);
        buffers.insert(name.to_string(), buffer.clone());
        self.stats.buffers_created.fetch_add(1, Ordering::Relaxed);
        self.stats.add_resident(size_bytes);
        debug!("created shared buffer '{}' ({} bytes)", name, size_bytes);

        Ok(buffer)
    }

    /// Look up a buffer by name
    pub fn get(&self, name: &str) -> Result<Arc<SharedBuffer>> {
        let buffers = self.buffers.read().unwrap();
        buffers
            .get(name)
            .cloned()
            .ok_or_else(|| PoolError::buffer_not_found(name))
    }

    /// Hand `worker` a reference to the buffer's underlying region
    ///
    /// The worker receives the same region every other holder sees, not a
    /// copy. Fails with [`PoolError::WorkerTerminated`] for terminated
    /// workers.
    pub fn register_with_worker(
        &self,
        name: &str,
        worker: &WorkerHandle,
    ) -> Result<Arc<SharedBuffer>> {
        if worker.is_terminated() {
            return Err(PoolError::WorkerTerminated {
                worker_id: worker.id(),
            });
        }

        let buffer = self.get(name)?;
        buffer.register(worker.id());
        worker.attach_buffer(buffer.clone());
        trace!("registered buffer '{}' with worker {}", name, worker.id());
        Ok(buffer)
    }

    /// Remove a worker from every buffer's registration set
    pub fn unregister_worker(&self, worker_id: WorkerId) {
        let buffers = self.buffers.read().unwrap();
        for buffer in buffers.values() {
            buffer.unregister(worker_id);
        }
    }

    /// Construct a typed window over part of a buffer
    pub fn create_view<T: Element>(
        &self,
        name: &str,
        offset_bytes: usize,
        len: usize,
    ) -> Result<TypedView<T>> {
        let buffer = self.get(name)?;
        TypedView::new(buffer, offset_bytes, len)
    }

    /// Append an access record to a buffer's log
    pub fn log_access(&self, name: &str, worker_id: WorkerId, kind: AccessKind) -> Result<()> {
        let buffer = self.get(name)?;
        buffer.log_access(worker_id, kind);
        self.stats.accesses_logged.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Snapshot of a buffer's access log
    pub fn access_log(&self, name: &str) -> Result<Vec<AccessRecord>> {
        Ok(self.get(name)?.access_log())
    }

    /// Names of all registered buffers
    pub fn buffer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buffers.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered buffers
    pub fn len(&self) -> usize {
        self.buffers.read().unwrap().len()
    }

    /// True when no buffers are registered
    pub fn is_empty(&self) -> bool {
        self.buffers.read().unwrap().is_empty()
    }

    /// Drop every buffer; subsequent lookups fail with `BufferNotFound`
    pub fn tear_down(&self) {
        let mut buffers = self.buffers.write().unwrap();
        let dropped = buffers.len();
        for buffer in buffers.values() {
            self.stats.sub_resident(buffer.len());
        }
        buffers.clear();
        self.stats
            .buffers_dropped
            .fetch_add(dropped, Ordering::Relaxed);
        debug!("registry torn down, {} buffers dropped", dropped);
    }

    /// Registry-wide counters
    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_idempotent_per_name() {
        let registry = SharedBufferRegistry::new();
        let first = registry.create_buffer("x", 1024).unwrap();
        let second = registry.create_buffer("x", 4096).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 1024);
        assert_eq!(registry.stats().active_buffers(), 1);
    }

    #[test]
    fn unknown_names_fail() {
        let registry = SharedBufferRegistry::new();
        assert!(matches!(
            registry.get("missing"),
            Err(PoolError::BufferNotFound { .. })
        ));
        assert!(registry.access_log("missing").is_err());
        assert!(registry.create_view::<u8>("missing", 0, 1).is_err());
    }

    #[test]
    fn teardown_makes_buffers_unresolvable() {
        let registry = SharedBufferRegistry::new();
        registry.create_buffer("a", 64).unwrap();
        registry.create_buffer("b", 64).unwrap();
        assert_eq!(registry.len(), 2);

        registry.tear_down();
        assert!(registry.is_empty());
        assert!(registry.get("a").is_err());
        assert_eq!(registry.stats().active_buffers(), 0);
        assert_eq!(registry.stats().resident_bytes.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn peak_resident_bytes_survives_teardown() {
        let registry = SharedBufferRegistry::new();
        registry.create_buffer("a", 1000).unwrap();
        registry.create_buffer("b", 500).unwrap();
        registry.tear_down();
        assert!(
            registry
                .stats()
                .peak_resident_bytes
                .load(Ordering::Relaxed)
                >= 1500
        );
    }
}

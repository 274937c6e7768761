//! Pool manager: spawning, aggregation, coordinated termination

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, RwLock,
    },
};

use log::debug;

use crate::{
    error::{PoolError, Result},
    shared::{SharedBuffer, SharedBufferRegistry},
    worker::{DeliveryTicket, WorkerHandle, WorkerId},
};

use super::{
    config::PoolConfig,
    stats::{ManagerStats, PoolStats},
};

/// Owns a set of workers and the shared buffer registry
///
/// Workers are created only through the manager and destroyed only via
/// `terminate_worker`/`terminate_all`. The registry is owned here and
/// handed to workers by reference at registration time.
#[derive(Debug)]
pub struct PoolManager {
    config: PoolConfig,
    workers: RwLock<HashMap<WorkerId, Arc<WorkerHandle>>>,
    registry: Arc<SharedBufferRegistry>,
    next_worker_id: AtomicU32,
    stats: ManagerStats,
}

impl PoolManager {
    /// Create a manager with the given configuration
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            workers: RwLock::new(HashMap::new()),
            registry: Arc::new(SharedBufferRegistry::new()),
            next_worker_id: AtomicU32::new(1),
            stats: ManagerStats::default(),
        })
    }

    /// Create a manager with default configuration
    pub fn with_defaults() -> Self {
        Self::new(PoolConfig::default()).expect("default configuration is valid")
    }

    /// Eagerly spawn `size` workers, each Ready immediately
    pub fn initialize_pool(&self, size: usize) -> Result<Vec<WorkerId>> {
        let mut ids = Vec::with_capacity(size);
        for _ in 0..size {
            ids.push(self.spawn_worker()?.id());
        }
        debug!("pool initialized with {} workers", size);
        Ok(ids)
    }

    /// Spawn one worker and add it to the pool
    ///
    /// Late joiners receive every existing shared buffer when
    /// `auto_register_shared` is set.
    pub fn spawn_worker(&self) -> Result<Arc<WorkerHandle>> {
        let id = self.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let worker = WorkerHandle::spawn(id, &self.config.worker)?;
        worker.bind_registry(&self.registry);

        if self.config.auto_register_shared {
            for name in self.registry.buffer_names() {
                self.registry.register_with_worker(&name, &worker)?;
            }
        }

        self.workers.write().unwrap().insert(id, worker.clone());
        self.stats.workers_spawned.fetch_add(1, Ordering::Relaxed);
        Ok(worker)
    }

    /// Look up a worker by id
    pub fn worker(&self, id: WorkerId) -> Option<Arc<WorkerHandle>> {
        self.workers.read().unwrap().get(&id).cloned()
    }

    /// Ids of all workers the pool has ever spawned and still holds
    pub fn worker_ids(&self) -> Vec<WorkerId> {
        let mut ids: Vec<WorkerId> = self.workers.read().unwrap().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Count of non-terminated workers
    pub fn active_worker_count(&self) -> usize {
        self.workers
            .read()
            .unwrap()
            .values()
            .filter(|worker| !worker.is_terminated())
            .count()
    }

    /// Post a payload to a specific worker
    pub fn post_message(&self, id: WorkerId, payload: Vec<u8>) -> Result<DeliveryTicket> {
        let worker = self
            .worker(id)
            .ok_or(PoolError::WorkerNotFound { worker_id: id })?;
        worker.post_message(payload)
    }

    /// Terminate one worker; idempotent per worker
    pub fn terminate_worker(&self, id: WorkerId) -> Result<()> {
        let worker = self
            .worker(id)
            .ok_or(PoolError::WorkerNotFound { worker_id: id })?;
        if !worker.is_terminated() {
            worker.terminate();
            self.stats.workers_terminated.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Terminate every worker and tear down the shared buffer registry
    ///
    /// Buffers become unresolvable afterward.
    pub fn terminate_all(&self) {
        let workers: Vec<Arc<WorkerHandle>> =
            self.workers.read().unwrap().values().cloned().collect();
        for worker in workers {
            if !worker.is_terminated() {
                worker.terminate();
                self.stats.workers_terminated.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.registry.tear_down();
        debug!("pool terminated");
    }

    /// Aggregate memory statistics across every live worker
    ///
    /// O(workers); no cross-worker double counting since each worker owns
    /// an independent tracker.
    pub fn pool_memory_stats(&self) -> PoolStats {
        let workers = self.workers.read().unwrap();
        let mut stats = PoolStats {
            shared_buffers: self.registry.len(),
            ..PoolStats::default()
        };

        for worker in workers.values() {
            if worker.is_terminated() {
                stats.terminated_workers += 1;
                continue;
            }
            stats.active_workers += 1;

            let memory = worker.tracker().stats();
            stats.total_estimated_bytes += memory.estimated_bytes;
            stats.total_allocations += memory.allocations;
            stats.total_deallocations += memory.deallocations;
            stats.total_leaked += memory.leaked;
            stats.active_allocations += worker.tracker().active_allocations();
        }
        stats
    }

    /// Create a shared buffer and register it with every live worker
    pub fn create_shared_buffer(&self, name: &str, size_bytes: usize) -> Result<Arc<SharedBuffer>> {
        let buffer = self.registry.create_buffer(name, size_bytes)?;

        let workers: Vec<Arc<WorkerHandle>> =
            self.workers.read().unwrap().values().cloned().collect();
        for worker in workers {
            if !worker.is_terminated() {
                self.registry.register_with_worker(name, &worker)?;
            }
        }
        self.stats.buffers_created.fetch_add(1, Ordering::Relaxed);
        Ok(buffer)
    }

    /// The pool's shared buffer registry
    pub fn registry(&self) -> &Arc<SharedBufferRegistry> {
        &self.registry
    }

    /// The pool's configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Lifetime counters
    pub fn stats(&self) -> &ManagerStats {
        &self.stats
    }
}

impl Drop for PoolManager {
    fn drop(&mut self) {
        self.terminate_all();
    }
}

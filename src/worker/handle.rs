//! Worker handle: lifecycle state machine and asynchronous FIFO delivery

use std::{
    collections::{HashMap, VecDeque},
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex, Weak,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant, SystemTime},
};

use log::{debug, trace, warn};

use crate::{
    error::{PoolError, Result},
    paged::PagedPool,
    shared::{AccessKind, SharedBuffer, SharedBufferRegistry},
    tracker::MemoryTracker,
};

use super::{
    config::WorkerConfig,
    events::{EventKind, ListenerId, ListenerTable, MessageEvent},
    state::WorkerState,
    WorkerId,
};

/// Receipt for one enqueued message, usable with [`WorkerHandle::wait_for`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryTicket {
    /// Worker the message was posted to
    pub worker_id: WorkerId,
    /// FIFO sequence number of the message
    pub sequence: u64,
}

/// A message waiting in the delivery queue
struct QueuedMessage {
    payload: Arc<Vec<u8>>,
    arrival: SystemTime,
    sequence: u64,
}

/// Queue state guarded by one lock: load and contents move together
struct DeliveryQueue {
    queue: VecDeque<QueuedMessage>,
    /// Messages in flight: queued plus mid-delivery
    load: usize,
    next_sequence: u64,
    shutdown: bool,
}

/// Delivery progress, separate from the queue so waiters never contend
/// with the posting path
struct Progress {
    delivered: u64,
}

struct WorkerInner {
    id: WorkerId,
    queue: Mutex<DeliveryQueue>,
    queue_cv: Condvar,
    progress: Mutex<Progress>,
    progress_cv: Condvar,
    terminated: AtomicBool,
    processing: AtomicBool,
    last_activity: Mutex<SystemTime>,
    listeners: Mutex<ListenerTable>,
    buffers: Mutex<HashMap<String, Arc<SharedBuffer>>>,
    registry: Mutex<Option<Weak<SharedBufferRegistry>>>,
}

/// One isolated execution unit with a bounded FIFO message queue
///
/// Owns a private [`MemoryTracker`] and, when configured, a private
/// sandbox [`PagedPool`]. Delivery runs on a dedicated thread, strictly
/// FIFO, one message at a time.
pub struct WorkerHandle {
    id: WorkerId,
    capacity: usize,
    created_at: SystemTime,
    tracker: Arc<MemoryTracker>,
    sandbox: Option<Arc<PagedPool>>,
    inner: Arc<WorkerInner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerHandle {
    /// Spawn a worker with its delivery thread; the worker is Ready on return
    pub fn spawn(id: WorkerId, config: &WorkerConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let sandbox = match &config.sandbox {
            Some(sandbox) => Some(Arc::new(PagedPool::new(
                sandbox.total_bytes,
                sandbox.page_size,
            )?)),
            None => None,
        };

        let now = SystemTime::now();
        let inner = Arc::new(WorkerInner {
            id,
            queue: Mutex::new(DeliveryQueue {
                queue: VecDeque::new(),
                load: 0,
                next_sequence: 0,
                shutdown: false,
            }),
            queue_cv: Condvar::new(),
            progress: Mutex::new(Progress { delivered: 0 }),
            progress_cv: Condvar::new(),
            terminated: AtomicBool::new(false),
            processing: AtomicBool::new(false),
            last_activity: Mutex::new(now),
            listeners: Mutex::new(ListenerTable::default()),
            buffers: Mutex::new(HashMap::new()),
            registry: Mutex::new(None),
        });

        let loop_inner = inner.clone();
        let thread = thread::Builder::new()
            .name(format!("sandpool-worker-{}", id))
            .spawn(move || delivery_loop(loop_inner))
            .map_err(|e| PoolError::from_io(e, "Failed to spawn worker thread"))?;

        debug!("worker {} spawned (capacity {})", id, config.capacity);
        Ok(Arc::new(Self {
            id,
            capacity: config.capacity,
            created_at: now,
            tracker: Arc::new(MemoryTracker::new()),
            sandbox,
            inner,
            thread: Mutex::new(Some(thread)),
        }))
    }

    /// Worker id
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Construction-time message capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// This worker's private memory tracker
    pub fn tracker(&self) -> &Arc<MemoryTracker> {
        &self.tracker
    }

    /// This worker's private sandbox pool, when configured
    pub fn sandbox(&self) -> Option<&Arc<PagedPool>> {
        self.sandbox.as_ref()
    }

    /// True once the worker has terminated
    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::Acquire)
    }

    /// Messages in flight (queued plus mid-delivery)
    pub fn current_load(&self) -> usize {
        self.inner.queue.lock().unwrap().load
    }

    /// Messages waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.inner.queue.lock().unwrap().queue.len()
    }

    /// Enqueue a payload for asynchronous FIFO delivery
    ///
    /// Validates synchronously and returns immediately; fails with
    /// [`PoolError::WorkerTerminated`] on a terminated worker and
    /// [`PoolError::CapacityExceeded`] when the load is at capacity.
    pub fn post_message(&self, payload: Vec<u8>) -> Result<DeliveryTicket> {
        if self.is_terminated() {
            return Err(PoolError::WorkerTerminated { worker_id: self.id });
        }

        let sequence = {
            let mut q = self.inner.queue.lock().unwrap();
            if q.shutdown {
                return Err(PoolError::WorkerTerminated { worker_id: self.id });
            }
            if q.load >= self.capacity {
                return Err(PoolError::CapacityExceeded {
                    worker_id: self.id,
                    capacity: self.capacity,
                });
            }
            q.load += 1;
            q.next_sequence += 1;
            let sequence = q.next_sequence;
            q.queue.push_back(QueuedMessage {
                payload: Arc::new(payload),
                arrival: SystemTime::now(),
                sequence,
            });
            sequence
        };
        self.inner.queue_cv.notify_one();

        trace!("worker {} enqueued message #{}", self.id, sequence);
        Ok(DeliveryTicket {
            worker_id: self.id,
            sequence,
        })
    }

    /// Block until the ticketed message has been delivered, or the
    /// caller-side deadline elapses
    ///
    /// Expiry is local bookkeeping: the pool has no cancellation and the
    /// message is still delivered.
    pub fn wait_for(&self, ticket: DeliveryTicket, timeout: Duration) -> Result<()> {
        if ticket.worker_id != self.id {
            return Err(PoolError::invalid_parameter(
                "ticket",
                "Ticket belongs to a different worker",
            ));
        }

        let deadline = Instant::now() + timeout;
        let mut progress = self.inner.progress.lock().unwrap();
        while progress.delivered < ticket.sequence {
            let now = Instant::now();
            if now >= deadline {
                return Err(PoolError::Timeout {
                    worker_id: self.id,
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            let (guard, _) = self
                .inner
                .progress_cv
                .wait_timeout(progress, deadline - now)
                .unwrap();
            progress = guard;
        }
        Ok(())
    }

    /// Register a message listener; returns a handle for [`Self::off`]
    ///
    /// Registration after termination is accepted but never fires.
    pub fn on_message<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&MessageEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .lock()
            .unwrap()
            .add_message(Arc::new(listener))
    }

    /// Register an error listener
    pub fn on_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PoolError) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .lock()
            .unwrap()
            .add_error(Arc::new(listener))
    }

    /// Register a terminate listener
    pub fn on_terminate<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(WorkerId) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .lock()
            .unwrap()
            .add_terminate(Arc::new(listener))
    }

    /// Unregister a listener; returns false for unknown handles
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.inner.listeners.lock().unwrap().remove(kind, id)
    }

    /// Immutable snapshot of the lifecycle state
    pub fn state(&self) -> WorkerState {
        let terminated = self.is_terminated();
        let (current_load, queue_len) = {
            let q = self.inner.queue.lock().unwrap();
            (q.load, q.queue.len())
        };
        WorkerState {
            initialized: true,
            ready: !terminated,
            processing: self.inner.processing.load(Ordering::Acquire),
            terminated,
            created_at: self.created_at,
            last_activity: *self.inner.last_activity.lock().unwrap(),
            current_load,
            queue_len,
        }
    }

    /// Terminate the worker; idempotent
    ///
    /// On the transition: clears the queue and load, resets memory
    /// accounting, detaches from every shared buffer, emits the terminate
    /// event exactly once, clears listener registrations, and stops the
    /// delivery thread.
    pub fn terminate(&self) {
        if self.inner.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("worker {} terminating", self.id);

        {
            let mut q = self.inner.queue.lock().unwrap();
            q.queue.clear();
            q.load = 0;
            q.shutdown = true;
        }
        self.inner.queue_cv.notify_all();

        self.tracker.reset();
        if let Some(sandbox) = &self.sandbox {
            sandbox.reset();
        }

        self.inner.buffers.lock().unwrap().clear();
        let registry = self.inner.registry.lock().unwrap().clone();
        if let Some(registry) = registry.and_then(|weak| weak.upgrade()) {
            registry.unregister_worker(self.id);
        }

        // Terminate fires exactly once, on the transition
        let terminate_listeners = self.inner.listeners.lock().unwrap().terminate_snapshot();
        for listener in terminate_listeners {
            let _ = catch_unwind(AssertUnwindSafe(|| listener(self.id)));
        }
        self.inner.listeners.lock().unwrap().clear();

        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        self.inner.progress_cv.notify_all();
    }

    /// Look up a shared buffer this worker is registered with
    pub fn shared_buffer(&self, name: &str) -> Option<Arc<SharedBuffer>> {
        self.inner.buffers.lock().unwrap().get(name).cloned()
    }

    /// Names of the shared buffers this worker holds
    pub fn shared_buffer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.buffers.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Append an access record to a held buffer's log under this worker's id
    pub fn access_shared(&self, name: &str, kind: AccessKind) -> Result<()> {
        if self.is_terminated() {
            return Err(PoolError::WorkerTerminated { worker_id: self.id });
        }
        let buffer = self
            .shared_buffer(name)
            .ok_or_else(|| PoolError::buffer_not_found(name))?;
        buffer.log_access(self.id, kind);
        Ok(())
    }

    /// Hand this worker a shared buffer reference (registry plumbing)
    pub(crate) fn attach_buffer(&self, buffer: Arc<SharedBuffer>) {
        if self.is_terminated() {
            return;
        }
        self.inner
            .buffers
            .lock()
            .unwrap()
            .insert(buffer.name().to_string(), buffer);
    }

    /// Bind the registry so termination can unregister this worker
    pub(crate) fn bind_registry(&self, registry: &Arc<SharedBufferRegistry>) {
        *self.inner.registry.lock().unwrap() = Some(Arc::downgrade(registry));
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Drain the queue until shutdown, delivering one message at a time
fn delivery_loop(inner: Arc<WorkerInner>) {
    loop {
        let message = {
            let mut q = inner.queue.lock().unwrap();
            loop {
                if q.shutdown {
                    return;
                }
                if let Some(message) = q.queue.pop_front() {
                    break message;
                }
                q = inner.queue_cv.wait(q).unwrap();
            }
        };
        deliver(&inner, message);
    }
}

/// Dispatch one message to a snapshot of the registered listeners
///
/// A listener that fails or panics is surfaced to error listeners and
/// never stops delivery to the remaining listeners or the worker itself.
fn deliver(inner: &WorkerInner, message: QueuedMessage) {
    inner.processing.store(true, Ordering::Release);

    let event = MessageEvent {
        worker_id: inner.id,
        payload: message.payload,
        arrival: message.arrival,
        sequence: message.sequence,
    };
    let listeners = inner.listeners.lock().unwrap().message_snapshot();
    for listener in listeners {
        match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => emit_error(inner, PoolError::listener(inner.id, err.to_string())),
            Err(panic) => emit_error(inner, PoolError::listener(inner.id, panic_message(&panic))),
        }
    }

    inner.processing.store(false, Ordering::Release);
    *inner.last_activity.lock().unwrap() = SystemTime::now();
    {
        let mut q = inner.queue.lock().unwrap();
        q.load = q.load.saturating_sub(1);
    }
    {
        let mut progress = inner.progress.lock().unwrap();
        progress.delivered = message.sequence;
    }
    inner.progress_cv.notify_all();
}

fn emit_error(inner: &WorkerInner, err: PoolError) {
    warn!("worker {}: {}", inner.id, err);
    let listeners = inner.listeners.lock().unwrap().error_snapshot();
    for listener in listeners {
        let _ = catch_unwind(AssertUnwindSafe(|| listener(&err)));
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked".to_string()
    }
}

//! Named raw memory regions shared across workers

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::{Instant, SystemTime},
};

use memmap2::MmapMut;
use serde::{Deserialize, Serialize};

use crate::{
    error::{PoolError, Result},
    worker::WorkerId,
};

/// Kind of operation recorded in a buffer's access log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessKind {
    Read,
    Write,
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessKind::Read => write!(f, "read"),
            AccessKind::Write => write!(f, "write"),
        }
    }
}

/// One entry in a buffer's append-only access log
///
/// Timestamps are nanoseconds on a monotonic clock relative to buffer
/// creation and are taken under the log lock, so the merged log across
/// all workers is non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    pub worker_id: WorkerId,
    pub kind: AccessKind,
    pub timestamp_ns: u64,
}

/// A named raw memory region shared by every registered worker
///
/// All holders reference the same underlying mapping; mutation through
/// one worker's view is visible to all others. The bytes themselves are
/// unsynchronized by design, so data-plane coordination belongs to the
/// caller.
#[derive(Debug)]
pub struct SharedBuffer {
    name: String,
    backing: MmapMut,
    size_bytes: usize,
    created_at: SystemTime,
    epoch: Instant,
    registered: Mutex<HashSet<WorkerId>>,
    log: Mutex<Vec<AccessRecord>>,
    views: AtomicUsize,
}

impl SharedBuffer {
    /// Allocate a zeroed region of `size_bytes` under `name`
    pub(crate) fn new(name: impl Into<String>, size_bytes: usize) -> Result<Self> {
        let name = name.into();
        if size_bytes == 0 {
            return Err(PoolError::invalid_parameter(
                "size_bytes",
                "Shared buffer size cannot be zero",
            ));
        }

        let backing = MmapMut::map_anon(size_bytes)
            .map_err(|e| PoolError::from_io(e, "Failed to map shared buffer"))?;

        Ok(Self {
            name,
            backing,
            size_bytes,
            created_at: SystemTime::now(),
            epoch: Instant::now(),
            registered: Mutex::new(HashSet::new()),
            log: Mutex::new(Vec::new()),
            views: AtomicUsize::new(0),
        })
    }

    /// Buffer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Region size in bytes
    pub fn len(&self) -> usize {
        self.size_bytes
    }

    /// True for zero-length buffers (never constructed by the registry)
    pub fn is_empty(&self) -> bool {
        self.size_bytes == 0
    }

    /// Creation timestamp
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Raw read pointer to the region
    pub fn as_ptr(&self) -> *const u8 {
        self.backing.as_ptr()
    }

    /// Raw write pointer to the region
    ///
    /// Writes through this pointer are unsynchronized shared-memory
    /// semantics; concurrent writers race unless the caller coordinates.
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.backing.as_ptr() as *mut u8
    }

    /// Copy `data` into the region at `offset`
    pub fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.as_mut_ptr().add(offset), data.len());
        }
        Ok(())
    }

    /// Copy `len` bytes out of the region starting at `offset`
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        self.check_range(offset, len)?;
        let mut out = vec![0u8; len];
        unsafe {
            std::ptr::copy_nonoverlapping(self.as_ptr().add(offset), out.as_mut_ptr(), len);
        }
        Ok(out)
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| PoolError::invalid_parameter("offset", "Range overflows"))?;
        if end > self.size_bytes {
            return Err(PoolError::insufficient_space(end, self.size_bytes));
        }
        Ok(())
    }

    /// Record a worker as a holder of this buffer
    pub(crate) fn register(&self, worker_id: WorkerId) {
        self.registered.lock().unwrap().insert(worker_id);
    }

    /// Drop a worker's registration; returns false if it was not registered
    pub(crate) fn unregister(&self, worker_id: WorkerId) -> bool {
        self.registered.lock().unwrap().remove(&worker_id)
    }

    /// True when the worker currently holds a registration
    pub fn is_registered(&self, worker_id: WorkerId) -> bool {
        self.registered.lock().unwrap().contains(&worker_id)
    }

    /// Ids of all currently registered workers
    pub fn registered_workers(&self) -> Vec<WorkerId> {
        let mut ids: Vec<WorkerId> = self.registered.lock().unwrap().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Append an access record under the log lock
    ///
    /// The timestamp is taken while holding the lock, which is what keeps
    /// the merged cross-worker log non-decreasing.
    pub(crate) fn log_access(&self, worker_id: WorkerId, kind: AccessKind) {
        let mut log = self.log.lock().unwrap();
        let timestamp_ns = self.epoch.elapsed().as_nanos() as u64;
        log.push(AccessRecord {
            worker_id,
            kind,
            timestamp_ns,
        });
    }

    /// Snapshot of the access log in append order
    pub fn access_log(&self) -> Vec<AccessRecord> {
        self.log.lock().unwrap().clone()
    }

    /// Number of access records
    pub fn access_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    /// Number of live typed views over this buffer
    pub fn view_count(&self) -> usize {
        self.views.load(Ordering::Acquire)
    }

    pub(crate) fn view_opened(&self) {
        self.views.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn view_closed(&self) {
        self.views.fetch_sub(1, Ordering::AcqRel);
    }
}

// The mapping is plain anonymous memory; unsynchronized mutation through
// raw pointers is the documented contract of this type.
unsafe impl Send for SharedBuffer {}
unsafe impl Sync for SharedBuffer {}

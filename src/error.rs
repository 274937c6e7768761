//! Error types and handling for the sandpool worker pool

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Error taxonomy for the worker pool core
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Operation attempted on a terminated worker
    #[error("Worker {worker_id} is terminated")]
    WorkerTerminated { worker_id: u32 },

    /// Worker message queue is at its construction-time capacity
    #[error("Worker {worker_id} at capacity: {capacity} messages in flight")]
    CapacityExceeded { worker_id: u32, capacity: usize },

    /// Shared buffer name is not registered (or the registry was torn down)
    #[error("Shared buffer not found: {name}")]
    BufferNotFound { name: String },

    /// Unknown worker id
    #[error("Worker not found: {worker_id}")]
    WorkerNotFound { worker_id: u32 },

    /// Caller-side deadline elapsed while waiting on a delivery.
    /// The underlying message is still delivered; this is local bookkeeping.
    #[error("Timed out waiting on worker {worker_id} after {waited_ms}ms")]
    Timeout { worker_id: u32, waited_ms: u64 },

    /// A registered listener failed during dispatch. Routed to error
    /// listeners; never halts delivery or terminates the worker.
    #[error("Listener failure on worker {worker_id}: {message}")]
    Listener { worker_id: u32, message: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Insufficient space for allocation (including fragmented-insufficient
    /// space in the paged pool)
    #[error("Insufficient space: requested {requested}, available {available}")]
    InsufficientSpace { requested: usize, available: usize },

    /// I/O related errors (anonymous mapping failures)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl PoolError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create an invalid-parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an insufficient-space error
    pub fn insufficient_space(requested: usize, available: usize) -> Self {
        Self::InsufficientSpace {
            requested,
            available,
        }
    }

    /// Create a listener-failure error
    pub fn listener(worker_id: u32, message: impl Into<String>) -> Self {
        Self::Listener {
            worker_id,
            message: message.into(),
        }
    }

    /// Create a buffer-not-found error
    pub fn buffer_not_found(name: impl Into<String>) -> Self {
        Self::BufferNotFound { name: name.into() }
    }

    /// True for errors a caller can retry on another worker or after backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. } | Self::Timeout { .. })
    }
}

//! Worker configuration

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};

/// Configuration of a worker's private sandbox pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Total sandbox capacity in bytes
    pub total_bytes: usize,
    /// Allocation granule in bytes
    pub page_size: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            total_bytes: crate::config::DEFAULT_SANDBOX_BYTES,
            page_size: crate::config::DEFAULT_PAGE_SIZE,
        }
    }
}

impl SandboxConfig {
    /// Validate the sandbox parameters
    pub fn validate(&self) -> Result<()> {
        if self.total_bytes == 0 {
            return Err(PoolError::invalid_parameter(
                "total_bytes",
                "Sandbox capacity cannot be zero",
            ));
        }
        if self.page_size == 0 {
            return Err(PoolError::invalid_parameter(
                "page_size",
                "Page size cannot be zero",
            ));
        }
        if self.page_size > self.total_bytes {
            return Err(PoolError::invalid_parameter(
                "page_size",
                "Page size cannot exceed sandbox capacity",
            ));
        }
        Ok(())
    }
}

/// Configuration for a single worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum messages in flight (queued plus mid-delivery)
    pub capacity: usize,
    /// Optional private paged sandbox pool
    pub sandbox: Option<SandboxConfig>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            capacity: crate::config::DEFAULT_WORKER_CAPACITY,
            sandbox: None,
        }
    }
}

impl WorkerConfig {
    /// Create a configuration with the default capacity
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the message capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Give the worker a private sandbox pool
    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(PoolError::invalid_parameter(
                "capacity",
                "Worker capacity cannot be zero",
            ));
        }
        if let Some(sandbox) = &self.sandbox {
            sandbox.validate()?;
        }
        Ok(())
    }
}

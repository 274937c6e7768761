//! Pool configuration

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    worker::{SandboxConfig, WorkerConfig},
};

/// Configuration for a worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Configuration applied to every spawned worker
    pub worker: WorkerConfig,
    /// Register existing shared buffers with workers that join the pool
    /// after buffer creation
    pub auto_register_shared: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            auto_register_shared: true,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-worker message capacity
    pub fn with_worker_capacity(mut self, capacity: usize) -> Self {
        self.worker.capacity = capacity;
        self
    }

    /// Give every worker a private sandbox pool
    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.worker.sandbox = Some(sandbox);
        self
    }

    /// Control late-join buffer registration
    pub fn with_auto_register_shared(mut self, auto: bool) -> Self {
        self.auto_register_shared = auto;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.worker.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PoolConfig::default().validate().is_ok());
    }

    #[test]
    fn worker_validation_propagates() {
        assert!(PoolConfig::new().with_worker_capacity(0).validate().is_err());
    }
}

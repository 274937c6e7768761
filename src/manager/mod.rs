//! Pool management: worker spawning, aggregation, coordinated teardown
//!
//! The [`PoolManager`] owns a set of workers and composes the shared
//! buffer registry. It eagerly spawns Ready workers, aggregates pool-wide
//! memory statistics without double counting (each worker owns an
//! independent tracker), and drives coordinated termination.

pub mod config;
pub mod manager;
pub mod stats;

pub use config::PoolConfig;
pub use manager::PoolManager;
pub use stats::{ManagerStats, PoolStats};

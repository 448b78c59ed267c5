//! Host pool module
//!
//! Bookkeeping for the database servers a client may talk to:
//! - Explicit host registration (no discovery)
//! - Available/disabled partition guarded by a single mutex
//! - Lazy, time-based recovery of disabled hosts at selection time

pub mod host;
pub mod host_pool;

pub use host::{Host, HostState};
pub use host_pool::{HostPool, PoolError, DEFAULT_FAILOVER_TIMEOUT};

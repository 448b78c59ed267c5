use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::host::{Host, HostState};

/// Default time a host stays disabled before it is retried
pub const DEFAULT_FAILOVER_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Error types for host pool operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Invalid host {address:?}:{port}: {reason}")]
    InvalidHost {
        address: String,
        port: u16,
        reason: &'static str,
    },

    #[error("Host already registered: {0}")]
    DuplicateHost(String),

    #[error("No hosts available")]
    NoHostsAvailable,
}

struct PoolInner {
    /// Every registered host, in registration order
    hosts: Vec<Host>,

    /// Cooldown before a disabled host becomes eligible again
    failover_timeout: Duration,
}

impl PoolInner {
    /// Re-enable every disabled host whose cooldown has elapsed
    fn recover_expired(&mut self, now: Instant) -> usize {
        let timeout = self.failover_timeout;
        let mut recovered = 0;

        for host in self.hosts.iter_mut() {
            let Some(disabled_at) = host.disabled_at else {
                continue;
            };
            if now.saturating_duration_since(disabled_at) >= timeout {
                host.mark_available();
                recovered += 1;
                info!(
                    host = %host,
                    failover_timeout_ms = timeout.as_millis() as u64,
                    "host re-enabled"
                );
            }
        }

        recovered
    }

    fn snapshot(&self, state: HostState) -> Vec<Host> {
        self.hosts
            .iter()
            .filter(|h| h.state == state)
            .cloned()
            .collect()
    }
}

/// Registry of database hosts partitioned into available and disabled sets.
///
/// Each host record carries exactly one state, so the two sets can never
/// overlap and always cover the full registration list. All reads and writes
/// go through one mutex; callers only ever see copies.
///
/// Disabled hosts are not recovered by a timer. [`HostPool::next_available`]
/// re-checks every cooldown before answering, so recovery is observed by the
/// first selection that happens after the timeout expires.
pub struct HostPool {
    inner: Mutex<PoolInner>,
}

impl HostPool {
    /// Create an empty pool with the given failover timeout
    pub fn new(failover_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                hosts: Vec::new(),
                failover_timeout,
            }),
        }
    }

    /// Register a host in the available set.
    ///
    /// Registering the same address/port pair twice is rejected with
    /// [`PoolError::DuplicateHost`]; the existing record is left untouched.
    pub fn add_host(&self, address: impl Into<String>, port: u16) -> Result<Host, PoolError> {
        let address = address.into();
        let trimmed = address.trim();

        if trimmed.is_empty() {
            return Err(PoolError::InvalidHost {
                address,
                port,
                reason: "address is empty",
            });
        }
        if port == 0 {
            return Err(PoolError::InvalidHost {
                address,
                port,
                reason: "port must be non-zero",
            });
        }

        let host = Host::new(trimmed, port);
        let mut inner = self.inner.lock();

        if inner.hosts.iter().any(|h| h.same_endpoint(&host)) {
            return Err(PoolError::DuplicateHost(host.to_string()));
        }

        debug!(host = %host, "registering host");
        inner.hosts.push(host.clone());
        Ok(host)
    }

    /// Move a host to the disabled set, stamping the current time.
    ///
    /// Returns `true` if the host transitioned. Disabling an already
    /// disabled (or unknown) host is a no-op and keeps the first stamp.
    pub fn disable(&self, host: &Host) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        match inner
            .hosts
            .iter_mut()
            .find(|h| h.same_endpoint(host))
        {
            Some(entry) if entry.is_available() => {
                entry.mark_disabled(now);
                true
            }
            _ => false,
        }
    }

    /// Snapshot of the available hosts, in registration order
    pub fn list_available(&self) -> Vec<Host> {
        self.inner.lock().snapshot(HostState::Available)
    }

    /// Snapshot of the disabled hosts, in registration order
    pub fn list_disabled(&self) -> Vec<Host> {
        self.inner.lock().snapshot(HostState::Disabled)
    }

    /// Recover expired hosts, then return the available set.
    ///
    /// Fails with [`PoolError::NoHostsAvailable`] if nothing is eligible even
    /// after recovery.
    pub fn next_available(&self) -> Result<Vec<Host>, PoolError> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        inner.recover_expired(now);

        let available = inner.snapshot(HostState::Available);
        if available.is_empty() {
            return Err(PoolError::NoHostsAvailable);
        }
        Ok(available)
    }

    /// Current failover timeout
    pub fn failover_timeout(&self) -> Duration {
        self.inner.lock().failover_timeout
    }

    /// Change the failover timeout.
    ///
    /// Hosts that are already disabled are measured against the new value on
    /// their next recovery check.
    pub fn set_failover_timeout(&self, timeout: Duration) {
        self.inner.lock().failover_timeout = timeout;
    }

    /// Number of registered hosts
    pub fn len(&self) -> usize {
        self.inner.lock().hosts.len()
    }

    /// Check if no host has been registered
    pub fn is_empty(&self) -> bool {
        self.inner.lock().hosts.is_empty()
    }
}

impl Default for HostPool {
    fn default() -> Self {
        Self::new(DEFAULT_FAILOVER_TIMEOUT)
    }
}

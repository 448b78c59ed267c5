use std::fmt;
use tokio::time::Instant;

/// Availability of a registered host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Eligible for traffic
    Available,
    /// Demoted after a transport failure, waiting for the failover timeout
    Disabled,
}

/// A single database server endpoint.
///
/// Values handed out by the pool are snapshots: mutating one has no effect
/// on the pool it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    /// Host name or IP address (e.g., "influx-1.example.com")
    pub address: String,

    /// TCP port of the HTTP API
    pub port: u16,

    /// Current availability
    pub state: HostState,

    /// When the host was last disabled, if it currently is
    pub disabled_at: Option<Instant>,
}

impl Host {
    /// Create a new available host
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            state: HostState::Available,
            disabled_at: None,
        }
    }

    /// Check if the host is currently eligible for traffic
    pub fn is_available(&self) -> bool {
        self.state == HostState::Available
    }

    /// Check whether two snapshots refer to the same endpoint
    pub fn same_endpoint(&self, other: &Host) -> bool {
        self.matches(&other.address, other.port)
    }

    pub(crate) fn matches(&self, address: &str, port: u16) -> bool {
        self.port == port && self.address.eq_ignore_ascii_case(address)
    }

    /// `host:port` authority, bracketing IPv6 literals
    pub fn authority(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }

    pub(crate) fn mark_disabled(&mut self, now: Instant) {
        self.state = HostState::Disabled;
        self.disabled_at = Some(now);
    }

    pub(crate) fn mark_available(&mut self) {
        self.state = HostState::Available;
        self.disabled_at = None;
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}

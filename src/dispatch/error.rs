use hyper::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::pool::{Host, PoolError};

/// Failure to complete an HTTP exchange with one host
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Body error: {0}")]
    Body(String),

    #[error("Request build error: {0}")]
    Build(#[from] hyper::http::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),
}

impl TransportError {
    /// Whether the failure should be blamed on the host it was sent to.
    ///
    /// Build and TLS setup errors happen before anything reaches the network,
    /// so demoting the host for them would be wrong.
    pub fn is_host_failure(&self) -> bool {
        !matches!(self, TransportError::Build(_) | TransportError::Tls(_))
    }
}

impl From<hyper_util::client::legacy::Error> for TransportError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Coarse classification of a [`DispatchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoHostsAvailable,
    ApplicationFailure,
    AllHostsExhausted,
    Cancelled,
    InvalidRequest,
}

/// Outcome of a failed dispatch
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No hosts available")]
    NoHostsAvailable,

    #[error("{host} responded {status}: {body}")]
    Application {
        host: Host,
        status: StatusCode,
        body: String,
    },

    #[error("All hosts exhausted after {attempts} attempt(s), last tried {host}: {source}")]
    AllHostsExhausted {
        attempts: u32,
        host: Host,
        #[source]
        source: TransportError,
    },

    #[error("Dispatch cancelled")]
    Cancelled,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::NoHostsAvailable => ErrorKind::NoHostsAvailable,
            DispatchError::Application { .. } => ErrorKind::ApplicationFailure,
            DispatchError::AllHostsExhausted { .. } => ErrorKind::AllHostsExhausted,
            DispatchError::Cancelled => ErrorKind::Cancelled,
            DispatchError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// HTTP status of an application failure
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DispatchError::Application { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<PoolError> for DispatchError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::NoHostsAvailable => DispatchError::NoHostsAvailable,
            other => DispatchError::InvalidRequest(other.to_string()),
        }
    }
}

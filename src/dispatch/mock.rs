//! Scripted transport for dispatcher and database client tests

use bytes::Bytes;
use hyper::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use std::collections::HashMap;

use super::error::TransportError;
use super::request::{HttpRequest, HttpResponse};
use super::transport::Transport;

/// What a scripted host does when it receives a request
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Answer with this status and body
    Status(u16, &'static str),
    /// Refuse the connection
    Refuse,
    /// Never answer
    Hang,
}

#[derive(Default)]
pub struct MockTransport {
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a host; unscripted hosts refuse connections
    pub fn set(&self, host: impl Into<String>, behavior: Behavior) {
        self.behaviors.lock().insert(host.into(), behavior);
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().clone()
    }

    /// Host names in the order they were called
    pub fn hosts_called(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| c.uri.host().map(str::to_string))
            .collect()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let host = request.uri.host().unwrap_or_default().to_string();
        self.calls.lock().push(request);

        let behavior = self
            .behaviors
            .lock()
            .get(&host)
            .copied()
            .unwrap_or(Behavior::Refuse);

        match behavior {
            Behavior::Status(code, body) => Ok(HttpResponse {
                status: StatusCode::from_u16(code)
                    .map_err(|e| TransportError::Request(e.to_string()))?,
                headers: HeaderMap::new(),
                body: Bytes::from_static(body.as_bytes()),
            }),
            Behavior::Refuse => Err(TransportError::Connect(format!(
                "tcp connect error: Connection refused ({})",
                host
            ))),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

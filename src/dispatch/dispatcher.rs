use hyper::header::{HeaderValue, CONNECTION};
use hyper::Method;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{DispatchError, TransportError};
use super::request::{HttpRequest, HttpResponse, RequestDescriptor, Response, Scheme};
use super::transport::{HyperTransport, Transport};
use crate::pool::{Host, HostPool, PoolError, DEFAULT_FAILOVER_TIMEOUT};

/// Default number of extra hosts tried after the first transport failure
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Dispatcher tunables
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How long a failed host stays disabled
    pub failover_timeout: Duration,
    /// Deadline applied to each attempt; `None` leaves it to the transport
    pub request_timeout: Option<Duration>,
    /// Extra hosts to try after the first transport failure
    pub max_retries: u32,
    /// Scheme used to build host URLs
    pub scheme: Scheme,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            failover_timeout: DEFAULT_FAILOVER_TIMEOUT,
            request_timeout: None,
            max_retries: DEFAULT_MAX_RETRIES,
            scheme: Scheme::Http,
        }
    }
}

/// Per-dispatch copy of the mutable settings
#[derive(Debug, Clone, Copy)]
struct Settings {
    request_timeout: Option<Duration>,
    max_retries: u32,
    scheme: Scheme,
}

/// Host failover request dispatcher.
///
/// Sends each request to one host of the pool and fails over to the next
/// host on transport errors, disabling the host that failed. Non-2xx
/// responses are returned as-is: the server was reachable and evaluated the
/// request, so another replica would answer the same.
///
/// Share it across tasks behind an `Arc`.
pub struct Dispatcher<T: Transport = HyperTransport> {
    pool: Arc<HostPool>,
    transport: T,
    settings: RwLock<Settings>,
    /// Round-robin cursor; each dispatch takes one starting offset
    cursor: AtomicUsize,
}

impl Dispatcher<HyperTransport> {
    /// Create a dispatcher backed by the hyper transport
    pub fn new(config: DispatcherConfig) -> Result<Self, TransportError> {
        Ok(Self::with_transport(config, HyperTransport::new()?))
    }
}

impl<T: Transport> Dispatcher<T> {
    pub fn with_transport(config: DispatcherConfig, transport: T) -> Self {
        Self {
            pool: Arc::new(HostPool::new(config.failover_timeout)),
            transport,
            settings: RwLock::new(Settings {
                request_timeout: config.request_timeout,
                max_retries: config.max_retries,
                scheme: config.scheme,
            }),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Register a host with the pool
    pub fn add_host(&self, address: impl Into<String>, port: u16) -> Result<Host, PoolError> {
        self.pool.add_host(address, port)
    }

    /// Shared handle to the underlying pool
    pub fn pool(&self) -> &Arc<HostPool> {
        &self.pool
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Snapshot of the hosts currently eligible for traffic
    pub fn hosts_available(&self) -> Vec<Host> {
        self.pool.list_available()
    }

    /// Snapshot of the hosts currently disabled
    pub fn hosts_disabled(&self) -> Vec<Host> {
        self.pool.list_disabled()
    }

    /// Set the per-attempt deadline for dispatches started from now on
    pub fn set_request_timeout(&self, timeout: Option<Duration>) {
        self.settings.write().request_timeout = timeout;
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.settings.read().request_timeout
    }

    /// Set how long failed hosts stay disabled
    pub fn set_failover_timeout(&self, timeout: Duration) {
        self.pool.set_failover_timeout(timeout);
    }

    pub fn failover_timeout(&self) -> Duration {
        self.pool.failover_timeout()
    }

    pub fn set_max_retries(&self, max_retries: u32) {
        self.settings.write().max_retries = max_retries;
    }

    pub fn max_retries(&self) -> u32 {
        self.settings.read().max_retries
    }

    /// Dispatch `descriptor` as a GET request
    pub async fn get(&self, descriptor: RequestDescriptor) -> Result<Response, DispatchError> {
        self.execute(&descriptor.method(Method::GET)).await
    }

    /// Dispatch `descriptor` as a POST request
    pub async fn post(&self, descriptor: RequestDescriptor) -> Result<Response, DispatchError> {
        self.execute(&descriptor.method(Method::POST)).await
    }

    pub async fn get_with_cancel(
        &self,
        descriptor: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Response, DispatchError> {
        self.execute_with_cancel(&descriptor.method(Method::GET), cancel)
            .await
    }

    pub async fn post_with_cancel(
        &self,
        descriptor: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Response, DispatchError> {
        self.execute_with_cancel(&descriptor.method(Method::POST), cancel)
            .await
    }

    /// Run one logical request to completion
    pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<Response, DispatchError> {
        self.dispatch(descriptor, None).await
    }

    /// Like [`execute`](Self::execute), but gives up with
    /// [`DispatchError::Cancelled`] as soon as `cancel` fires. The in-flight
    /// attempt is dropped and its host is not disabled.
    pub async fn execute_with_cancel(
        &self,
        descriptor: &RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Response, DispatchError> {
        self.dispatch(descriptor, Some(cancel)).await
    }

    async fn dispatch(
        &self,
        descriptor: &RequestDescriptor,
        cancel: Option<&CancellationToken>,
    ) -> Result<Response, DispatchError> {
        let settings = *self.settings.read();
        let timeout = descriptor.timeout.or(settings.request_timeout);

        self.pool.next_available()?;

        let offset = self.cursor.fetch_add(1, Ordering::Relaxed);
        let mut attempts: u32 = 0;
        let mut last_failure: Option<(Host, TransportError)> = None;
        // Hosts that failed during this dispatch are never picked again by it
        let mut failed: Vec<Host> = Vec::new();

        while attempts <= settings.max_retries {
            // Recovery runs on every selection, so a host may come back mid-loop
            let available: Vec<Host> = match self.pool.next_available() {
                Ok(hosts) => hosts
                    .into_iter()
                    .filter(|h| !failed.iter().any(|f| f.same_endpoint(h)))
                    .collect(),
                Err(_) => break,
            };
            if available.is_empty() {
                break;
            }
            let host = available[offset % available.len()].clone();
            let request = build_request(settings.scheme, &host, descriptor)?;

            debug!(
                method = %request.method,
                uri = %request.uri,
                attempt = attempts + 1,
                "dispatch_attempt"
            );

            let outcome = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(host = %host, "dispatch_cancelled");
                        return Err(DispatchError::Cancelled);
                    }
                    outcome = self.send(request, timeout) => outcome,
                },
                None => self.send(request, timeout).await,
            };

            match outcome {
                Ok(response) if response.status.is_success() => {
                    return Ok(Response {
                        host,
                        status: response.status,
                        headers: response.headers,
                        body: response.body,
                        attempts: attempts + 1,
                    });
                }
                Ok(response) => {
                    debug!(
                        host = %host,
                        status = response.status.as_u16(),
                        "application_failure"
                    );
                    return Err(DispatchError::Application {
                        host,
                        status: response.status,
                        body: String::from_utf8_lossy(&response.body).into_owned(),
                    });
                }
                Err(e) if !e.is_host_failure() => {
                    return Err(DispatchError::InvalidRequest(e.to_string()));
                }
                Err(e) => {
                    attempts += 1;
                    if self.pool.disable(&host) {
                        warn!(
                            host = %host,
                            error = %e,
                            attempt = attempts,
                            "host disabled"
                        );
                    }
                    failed.push(host.clone());
                    last_failure = Some((host, e));
                }
            }
        }

        match last_failure {
            Some((host, source)) => {
                warn!(attempts = attempts, last_host = %host, "all_hosts_exhausted");
                Err(DispatchError::AllHostsExhausted {
                    attempts,
                    host,
                    source,
                })
            }
            None => Err(DispatchError::NoHostsAvailable),
        }
    }

    /// One exchange, bounded by `timeout` if set
    async fn send(
        &self,
        request: HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.send(request))
                .await
                .unwrap_or(Err(TransportError::Timeout(limit))),
            None => self.transport.send(request).await,
        }
    }
}

fn build_request(
    scheme: Scheme,
    host: &Host,
    descriptor: &RequestDescriptor,
) -> Result<HttpRequest, DispatchError> {
    let uri = descriptor
        .uri_for(scheme, host)
        .map_err(|e| DispatchError::InvalidRequest(format!("bad URI for {}: {}", host, e)))?;

    let mut headers = descriptor.headers.clone();
    if descriptor.reuse_connection == Some(false) {
        headers.insert(CONNECTION, HeaderValue::from_static("close"));
    }

    Ok(HttpRequest {
        method: descriptor.method.clone(),
        uri,
        headers,
        body: descriptor.body.clone(),
    })
}

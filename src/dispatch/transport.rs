//! HTTP transport used by the dispatcher
//!
//! Tuned along the same lines as a long-lived API client:
//! - HTTP/1.1 keep-alive connection pool shared by all clones
//! - TCP_NODELAY and TCP keepalive
//! - native-tls (OpenSSL) for `https` hosts
//! - bounded connect and response deadlines so a dead or silent host never
//!   blocks a dispatch forever

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use std::future::Future;
use std::time::Duration;

use super::error::TransportError;
use super::request::{HttpRequest, HttpResponse};

/// Something that can perform one HTTP exchange.
///
/// The dispatcher owns retry, timeout and host selection; a transport only
/// reports what happened on the wire.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// Connection settings for [`HyperTransport`]
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Upper bound on one whole exchange (connect, headers and body)
    pub response_timeout: Duration,
    /// How long idle pooled connections are kept
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections kept per host
    pub pool_max_idle_per_host: usize,
    /// Skip certificate and hostname verification
    pub insecure_tls: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            insecure_tls: false,
        }
    }
}

/// hyper-based transport with a shared connection pool.
///
/// Clone is cheap - the underlying HTTP client uses Arc internally.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
    response_timeout: Duration,
}

impl HyperTransport {
    /// Create a transport with default options
    pub fn new() -> Result<Self, TransportError> {
        Self::with_options(TransportOptions::default())
    }

    pub fn with_options(options: TransportOptions) -> Result<Self, TransportError> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(options.connect_timeout));
        http.set_keepalive(Some(Duration::from_secs(90)));

        let tls = if options.insecure_tls {
            tracing::warn!("INSECURE TLS MODE ENABLED: Certificate verification is disabled!");
            TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()?
        } else {
            TlsConnector::new()?
        };

        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(options.pool_idle_timeout)
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .set_host(true)
            .build(https);

        Ok(Self {
            client,
            response_timeout: options.response_timeout,
        })
    }

    async fn exchange(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            uri,
            headers,
            body,
        } = request;

        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(body))?;
        *request.headers_mut() = headers;

        let response = self.client.request(request).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .collect()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?
            .to_bytes();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for HyperTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let limit = self.response_timeout;
        tokio::time::timeout(limit, self.exchange(request))
            .await
            .unwrap_or(Err(TransportError::Timeout(limit)))
    }
}

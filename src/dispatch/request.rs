//! Request descriptors and responses handled by the dispatcher

use bytes::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::time::Duration;

use crate::pool::Host;

/// Hex lookup table for URI encoding
static HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// URL scheme used to reach the hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// One logical request, independent of the host it ends up on
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path relative to the host root (e.g., "query" or "/write")
    pub path: String,
    /// Query parameters, encoded in insertion order
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Overrides the dispatcher's request timeout for this call
    pub timeout: Option<Duration>,
    /// `Some(false)` asks the transport not to keep the connection alive
    pub reuse_connection: Option<bool>,
}

impl RequestDescriptor {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body along with its content type
    pub fn json_body(self, body: impl Into<Bytes>) -> Self {
        self.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn reuse_connection(mut self, reuse: bool) -> Self {
        self.reuse_connection = Some(reuse);
        self
    }

    /// Build the absolute URI of this request on `host`
    pub fn uri_for(&self, scheme: Scheme, host: &Host) -> Result<Uri, hyper::http::uri::InvalidUri> {
        let path = encode_path(self.path.trim_start_matches('/'));
        let mut url = String::with_capacity(16 + path.len() + self.query.len() * 16);
        url.push_str(scheme.as_str());
        url.push_str("://");
        url.push_str(&host.authority());
        url.push('/');
        url.push_str(&path);

        for (i, (key, value)) in self.query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url_encode_into(&mut url, key);
            url.push('=');
            url_encode_into(&mut url, value);
        }

        url.parse()
    }
}

/// Plain HTTP request handed to a [`Transport`](super::Transport)
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Plain HTTP response returned by a [`Transport`](super::Transport)
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Successful (2xx) dispatch result
#[derive(Debug, Clone)]
pub struct Response {
    /// Host that served the request
    pub host: Host,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Number of hosts tried, including the one that succeeded
    pub attempts: u32,
}

impl Response {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Encode a path, preserving forward slashes.
/// Returns Cow::Borrowed when no encoding is needed.
fn encode_path(path: &str) -> Cow<'_, str> {
    let needs_encoding = path.bytes().any(|b| !is_unreserved(b) && b != b'/');
    if !needs_encoding {
        return Cow::Borrowed(path);
    }

    let mut result = String::with_capacity(path.len() + 16);
    for byte in path.bytes() {
        if is_unreserved(byte) || byte == b'/' {
            result.push(byte as char);
        } else {
            push_escaped(&mut result, byte);
        }
    }
    Cow::Owned(result)
}

/// Encode a query component (RFC 3986) directly into `buf`
fn url_encode_into(buf: &mut String, s: &str) {
    for byte in s.bytes() {
        if is_unreserved(byte) {
            buf.push(byte as char);
        } else {
            push_escaped(buf, byte);
        }
    }
}

fn is_unreserved(byte: u8) -> bool {
    matches!(byte, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~')
}

fn push_escaped(buf: &mut String, byte: u8) {
    buf.push('%');
    buf.push(HEX_UPPER[(byte >> 4) as usize] as char);
    buf.push(HEX_UPPER[(byte & 0xf) as usize] as char);
}

//! Request dispatch with host failover
//!
//! This module provides:
//! - [`Dispatcher`]: selects a host, sends the request, demotes failing hosts
//!   and retries on the next one
//! - [`RequestDescriptor`] / [`Response`]: one logical request and its 2xx result
//! - [`Transport`] / [`HyperTransport`]: the HTTP exchange itself
//!
//! # Failure handling
//!
//! | Outcome                          | Host demoted | Retried | Returned as                          |
//! |----------------------------------|--------------|---------|--------------------------------------|
//! | connect error, timeout, reset    | yes          | yes     | `AllHostsExhausted` once out of hosts |
//! | HTTP status outside 200..300     | no           | no      | `Application`                        |
//! | empty pool at dispatch start     | -            | -       | `NoHostsAvailable`                   |
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use influxpool::dispatch::{Dispatcher, DispatcherConfig, RequestDescriptor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::new(DispatcherConfig::default())?;
//! dispatcher.add_host("influx-1.example.com", 8086)?;
//! dispatcher.add_host("influx-2.example.com", 8086)?;
//!
//! let response = dispatcher
//!     .get(RequestDescriptor::new("query").query("q", "show databases"))
//!     .await?;
//! println!("{} answered: {}", response.host, response.text());
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod error;
pub mod request;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use dispatcher::{Dispatcher, DispatcherConfig, DEFAULT_MAX_RETRIES};
pub use error::{DispatchError, ErrorKind, TransportError};
pub use request::{HttpRequest, HttpResponse, RequestDescriptor, Response, Scheme};
pub use transport::{HyperTransport, Transport, TransportOptions};

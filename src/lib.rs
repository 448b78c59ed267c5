//! influxpool - InfluxDB HTTP client with multi-host failover

pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod dispatch;
pub mod pool;

pub use config::Config;
pub use core::Core;
pub use db::InfluxDb;
pub use dispatch::{DispatchError, Dispatcher, DispatcherConfig, RequestDescriptor, Response};
pub use pool::{Host, HostPool};

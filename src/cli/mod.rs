//! CLI module for influxpool
//!
//! Small command set over the failover client:
//!
//! ```bash
//! # Run a query against the first healthy host
//! influxpool query "show measurements" --database metrics
//!
//! # Write a point
//! influxpool write cpu_load value=0.64 --tag host=server01 --database metrics
//!
//! # Manage databases
//! influxpool create-db metrics
//! influxpool drop-db metrics
//! influxpool databases
//!
//! # Inspect the host pool after a probe query
//! influxpool hosts --probe
//! ```

pub mod commands;

pub use commands::{parse_fields, parse_tags};

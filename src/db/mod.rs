//! InfluxDB operations
//!
//! This module provides:
//! - [`InfluxDb`]: query, write and administration helpers
//! - Option and payload types for those operations
//! - [`parse_result`] for legacy columnar results

pub mod client;
pub mod types;

pub use client::{ClientSettings, DbError, InfluxDb, Result};
pub use types::{parse_result, Point, QueryOptions, SeriesBatch, WriteOptions, WritePayload};

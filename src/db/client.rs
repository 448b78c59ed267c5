//! Database operations on top of the failover dispatcher
//!
//! Every operation is a thin mapping onto `GET query` or `POST write`:
//! credentials and time precision travel as query parameters, writes carry a
//! JSON body, and any non-2xx answer becomes [`DbError::Server`].

use hyper::StatusCode;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::types::{Point, QueryOptions, SeriesBatch, WriteOptions, WritePayload};
use crate::dispatch::{
    DispatchError, Dispatcher, HyperTransport, RequestDescriptor, Response, Transport,
};
use crate::pool::Host;

/// Database client errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Server error: {status} - {body}")]
    Server { status: StatusCode, body: String },

    #[error(transparent)]
    Dispatch(DispatchError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No database given and no default database configured")]
    MissingDatabase,
}

impl From<DispatchError> for DbError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Application { status, body, .. } => DbError::Server { status, body },
            other => DbError::Dispatch(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Connection-independent client settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub username: String,
    pub password: String,
    /// Database used when an operation does not name one
    pub database: Option<String>,
    /// Precision of timestamps (`s`, `ms`, `u`, ...)
    pub time_precision: String,
    pub retention_policy: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            username: "root".to_string(),
            password: "root".to_string(),
            database: None,
            time_precision: "ms".to_string(),
            retention_policy: "default".to_string(),
        }
    }
}

/// InfluxDB client.
///
/// Clone is cheap - clones share the dispatcher and its host pool.
pub struct InfluxDb<T: Transport = HyperTransport> {
    dispatcher: Arc<Dispatcher<T>>,
    settings: ClientSettings,
}

impl<T: Transport> Clone for InfluxDb<T> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            settings: self.settings.clone(),
        }
    }
}

impl<T: Transport> InfluxDb<T> {
    pub fn new(dispatcher: Arc<Dispatcher<T>>, settings: ClientSettings) -> Self {
        Self {
            dispatcher,
            settings,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<T>> {
        &self.dispatcher
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Descriptor for `path` carrying credentials and time precision
    fn descriptor(&self, path: &str) -> RequestDescriptor {
        RequestDescriptor::new(path)
            .query("u", self.settings.username.as_str())
            .query("p", self.settings.password.as_str())
            .query("time_precision", self.settings.time_precision.as_str())
    }

    /// Run a raw query and return the parsed JSON response
    pub async fn query(&self, query: &str, options: &QueryOptions) -> Result<Value> {
        let mut descriptor = self.descriptor("query").query("q", query);
        if let Some(db) = options
            .database
            .as_deref()
            .or(self.settings.database.as_deref())
        {
            descriptor = descriptor.query("db", db);
        }
        if let Some(timeout) = options.timeout {
            descriptor = descriptor.timeout(timeout);
        }

        debug!(query = %query, "influx_query");
        let response = self.dispatcher.get(descriptor).await?;
        parse_json(&response)
    }

    pub async fn create_database(&self, name: &str) -> Result<Value> {
        self.query(&format!("create database {}", name), &QueryOptions::default())
            .await
    }

    pub async fn drop_database(&self, name: &str) -> Result<Value> {
        self.query(&format!("drop database {}", name), &QueryOptions::default())
            .await
    }

    pub async fn get_databases(&self) -> Result<Value> {
        self.query("show databases", &QueryOptions::default()).await
    }

    pub async fn get_measurements(&self, options: &QueryOptions) -> Result<Value> {
        self.query(&with_filter("show measurements", options), options)
            .await
    }

    pub async fn get_series(&self, options: &QueryOptions) -> Result<Value> {
        self.query(&with_filter("show series", options), options).await
    }

    pub async fn get_users(&self) -> Result<Value> {
        self.query("show users", &QueryOptions::default()).await
    }

    pub async fn create_user(&self, username: &str, password: &str) -> Result<Value> {
        let statement = format!(
            "create user {} with password '{}'",
            username,
            password.replace('\'', "\\'")
        );
        self.query(&statement, &QueryOptions::default()).await
    }

    pub async fn drop_series(&self, series: &str, options: &QueryOptions) -> Result<Value> {
        self.query(&with_filter(&format!("drop {}", series), options), options)
            .await
    }

    pub async fn get_continuous_queries(&self, options: &QueryOptions) -> Result<Value> {
        self.query("show continuous queries", options).await
    }

    pub async fn drop_continuous_query(&self, id: &str, options: &QueryOptions) -> Result<Value> {
        self.query(&format!("drop continuous query {}", id), options)
            .await
    }

    /// Write a batch of points with shared tags
    pub async fn write_series(
        &self,
        series: &SeriesBatch,
        tags: &BTreeMap<String, String>,
        options: &WriteOptions,
    ) -> Result<Response> {
        let database = options
            .database
            .as_deref()
            .or(self.settings.database.as_deref())
            .ok_or(DbError::MissingDatabase)?;
        let retention_policy = options
            .retention_policy
            .as_deref()
            .unwrap_or(&self.settings.retention_policy);

        let body = serde_json::to_vec(&WritePayload {
            database,
            retention_policy,
            tags,
            points: &series.points,
        })?;

        let mut descriptor = self
            .descriptor("write")
            .query_pairs(options.query.iter().cloned())
            .json_body(body);
        if let Some(timeout) = options.timeout {
            descriptor = descriptor.timeout(timeout);
        }
        if let Some(reuse) = options.reuse_connection {
            descriptor = descriptor.reuse_connection(reuse);
        }

        debug!(
            database = %database,
            points = series.points.len(),
            "influx_write"
        );
        Ok(self.dispatcher.post(descriptor).await?)
    }

    /// Write a single point of `series_name`
    pub async fn write_point(
        &self,
        series_name: &str,
        values: Map<String, Value>,
        tags: &BTreeMap<String, String>,
        options: &WriteOptions,
    ) -> Result<Response> {
        let batch = SeriesBatch {
            points: vec![Point::from_fields(series_name, values)],
        };
        self.write_series(&batch, tags, options).await
    }

    /// Write several points of `series_name`
    pub async fn write_points(
        &self,
        series_name: &str,
        points: Vec<Map<String, Value>>,
        tags: &BTreeMap<String, String>,
        options: &WriteOptions,
    ) -> Result<Response> {
        let batch = SeriesBatch {
            points: points
                .into_iter()
                .map(|fields| Point::from_fields(series_name, fields))
                .collect(),
        };
        self.write_series(&batch, tags, options).await
    }

    pub fn hosts_available(&self) -> Vec<Host> {
        self.dispatcher.hosts_available()
    }

    pub fn hosts_disabled(&self) -> Vec<Host> {
        self.dispatcher.hosts_disabled()
    }

    pub fn set_request_timeout(&self, timeout: Option<Duration>) {
        self.dispatcher.set_request_timeout(timeout);
    }

    pub fn set_failover_timeout(&self, timeout: Duration) {
        self.dispatcher.set_failover_timeout(timeout);
    }
}

fn with_filter(statement: &str, options: &QueryOptions) -> String {
    match options.filter.as_deref().map(str::trim) {
        Some(filter) if !filter.is_empty() => format!("{} {}", statement, filter),
        _ => statement.to_string(),
    }
}

fn parse_json(response: &Response) -> Result<Value> {
    if response.body.is_empty() {
        return Ok(Value::Null);
    }
    Ok(response.json()?)
}

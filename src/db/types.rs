//! Database client option and payload types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Options accepted by query-style operations
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Database to run against (defaults to the client's database)
    pub database: Option<String>,
    /// Clause appended to SHOW/DROP statements (e.g., `from cpu where host='a'`)
    pub filter: Option<String>,
    /// Per-call request timeout
    pub timeout: Option<Duration>,
}

impl QueryOptions {
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Options accepted by write operations
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Target database (defaults to the client's database)
    pub database: Option<String>,
    /// Retention policy (defaults to the client's retention policy)
    pub retention_policy: Option<String>,
    /// Extra query parameters sent with the write
    pub query: Vec<(String, String)>,
    /// Per-call request timeout
    pub timeout: Option<Duration>,
    /// `Some(false)` closes the connection after the write
    pub reuse_connection: Option<bool>,
}

impl WriteOptions {
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn retention_policy(mut self, policy: impl Into<String>) -> Self {
        self.retention_policy = Some(policy.into());
        self
    }
}

/// A single point of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Measurement name
    pub name: String,
    /// Field values
    pub fields: Map<String, Value>,
    /// Point-level tags, merged with the batch tags by the server
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Explicit timestamp in the client's time precision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Point {
    pub fn new(name: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            fields,
            tags: BTreeMap::new(),
            timestamp: None,
        }
    }

    /// Build a point from a field map, letting a string `name` field
    /// override the measurement name.
    pub fn from_fields(default_name: &str, mut fields: Map<String, Value>) -> Self {
        let name = match fields.remove("name") {
            Some(Value::String(name)) => name,
            Some(other) => {
                fields.insert("name".to_string(), other);
                default_name.to_string()
            }
            None => default_name.to_string(),
        };
        Self::new(name, fields)
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Points to be written in one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesBatch {
    pub points: Vec<Point>,
}

/// JSON body of a write request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WritePayload<'a> {
    pub database: &'a str,
    pub retention_policy: &'a str,
    pub tags: &'a BTreeMap<String, String>,
    pub points: &'a [Point],
}

/// Turn a columnar result (`{"columns": [...], "points": [[...], ...]}`)
/// into one object per row.
pub fn parse_result(result: &Value) -> Vec<Map<String, Value>> {
    let columns: Vec<&str> = result
        .get("columns")
        .and_then(Value::as_array)
        .map(|cols| cols.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(points) = result.get("points").and_then(Value::as_array) else {
        return Vec::new();
    };

    points
        .iter()
        .filter_map(Value::as_array)
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(n, name)| (name.to_string(), row.get(n).cloned().unwrap_or(Value::Null)))
                .collect()
        })
        .collect()
}

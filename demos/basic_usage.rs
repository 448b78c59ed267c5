//! Basic usage example for influxpool
//!
//! Connects to an InfluxDB cluster, writes a couple of points and reads them
//! back.
//!
//! Run with:
//! ```
//! cargo run --example basic_usage
//! ```

use serde_json::{json, Map};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use influxpool::db::{ClientSettings, DbError, QueryOptions, WriteOptions};
use influxpool::{Dispatcher, DispatcherConfig, InfluxDb};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dispatcher = Dispatcher::new(DispatcherConfig {
        request_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    })?;
    dispatcher.add_host("influx-1.example.com", 8086)?;
    dispatcher.add_host("influx-2.example.com", 8086)?;

    let db = InfluxDb::new(
        Arc::new(dispatcher),
        ClientSettings {
            database: Some("metrics".to_string()),
            ..Default::default()
        },
    );

    println!("influxpool - Basic Usage Example");
    println!("================================\n");

    // Example 1: Create the database (already existing is fine)
    println!("1. Creating database...");
    match db.create_database("metrics").await {
        Ok(_) => println!("   Created\n"),
        Err(DbError::Server { status, body }) => println!("   Server said {}: {}\n", status, body),
        Err(e) => return Err(e.into()),
    }

    // Example 2: Write points
    println!("2. Writing points...");
    let mut tags = BTreeMap::new();
    tags.insert("region".to_string(), "eu-west".to_string());

    let points: Vec<Map<_, _>> = [0.42, 0.58]
        .iter()
        .map(|load| {
            let mut fields = Map::new();
            fields.insert("value".to_string(), json!(load));
            fields
        })
        .collect();
    let response = db
        .write_points("cpu_load", points, &tags, &WriteOptions::default())
        .await?;
    println!("   Written via {}\n", response.host);

    // Example 3: Query them back
    println!("3. Querying...");
    let result = db
        .query("select * from cpu_load", &QueryOptions::default())
        .await?;
    println!("   {}\n", serde_json::to_string_pretty(&result)?);

    // Example 4: Pool state
    println!("4. Host pool:");
    for host in db.hosts_available() {
        println!("   available: {}", host);
    }
    for host in db.hosts_disabled() {
        println!("   disabled:  {}", host);
    }

    Ok(())
}

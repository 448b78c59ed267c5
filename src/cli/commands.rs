use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::core::Core;
use crate::db::{QueryOptions, WriteOptions};
use crate::pool::Host;

/// Run a raw query and print the JSON result
pub async fn cmd_query(core: &Core, query: &str, database: Option<&str>) -> Result<()> {
    let mut options = QueryOptions::default();
    if let Some(db) = database {
        options = options.database(db);
    }

    let result = core.db().query(query, &options).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Write one point built from `field=value` arguments
pub async fn cmd_write(
    core: &Core,
    measurement: &str,
    fields: &[String],
    tags: &[String],
    database: Option<&str>,
) -> Result<()> {
    let fields = parse_fields(fields)?;
    let tags = parse_tags(tags)?;

    let mut options = WriteOptions::default();
    if let Some(db) = database {
        options = options.database(db);
    }

    let response = core
        .db()
        .write_point(measurement, fields, &tags, &options)
        .await?;
    println!("Wrote 1 point to {} via {}", measurement, response.host);
    Ok(())
}

pub async fn cmd_create_db(core: &Core, name: &str) -> Result<()> {
    core.db().create_database(name).await?;
    println!("Database `{}` created", name);
    Ok(())
}

pub async fn cmd_drop_db(core: &Core, name: &str) -> Result<()> {
    core.db().drop_database(name).await?;
    println!("Database `{}` dropped", name);
    Ok(())
}

pub async fn cmd_databases(core: &Core) -> Result<()> {
    let result = core.db().get_databases().await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Show the host pool, optionally after a probe query
pub async fn cmd_hosts(core: &Core, probe: bool) -> Result<()> {
    if probe {
        if let Err(e) = core.db().get_databases().await {
            eprintln!("Probe failed: {}", e);
        }
    }

    print_hosts("Available", &core.dispatcher.hosts_available());
    print_hosts("Disabled", &core.dispatcher.hosts_disabled());
    Ok(())
}

fn print_hosts(label: &str, hosts: &[Host]) {
    println!("{} ({}):", label, hosts.len());
    for host in hosts {
        match host.disabled_at {
            Some(at) => println!("  {}  (disabled {}s ago)", host, at.elapsed().as_secs()),
            None => println!("  {}", host),
        }
    }
}

fn split_pair(arg: &str) -> Result<(&str, &str)> {
    let (key, value) = arg
        .split_once('=')
        .context(format!("Expected key=value, got '{}'", arg))?;
    if key.is_empty() {
        anyhow::bail!("Empty key in '{}'", arg);
    }
    Ok((key, value))
}

/// Parse `key=value` field arguments, inferring JSON types.
///
/// Integers, floats and booleans become numbers/booleans; quoted or other
/// values stay strings.
pub fn parse_fields(args: &[String]) -> Result<Map<String, Value>> {
    if args.is_empty() {
        anyhow::bail!("At least one field is required");
    }

    args.iter()
        .map(|arg| {
            let (key, raw) = split_pair(arg)?;
            Ok((key.to_string(), parse_field_value(raw)))
        })
        .collect()
}

fn parse_field_value(raw: &str) -> Value {
    if let Some(quoted) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        return Value::String(quoted.to_string());
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Parse `key=value` tag arguments
pub fn parse_tags(args: &[String]) -> Result<BTreeMap<String, String>> {
    args.iter()
        .map(|arg| {
            let (key, value) = split_pair(arg)?;
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

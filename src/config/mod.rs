use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::db::ClientSettings;
use crate::dispatch::{DispatcherConfig, Scheme};

/// One entry of a profile's host list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    /// Host name or IP address
    pub host: String,

    /// Port (default: the profile's port)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl HostEntry {
    /// Parse `host`, `host:port` or `[v6]:port`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .context(format!("Unterminated IPv6 literal: {}", s))?;
            let port = match tail.strip_prefix(':') {
                Some(p) => Some(p.parse().context(format!("Invalid port in {}", s))?),
                None => None,
            };
            return Ok(Self {
                host: host.to_string(),
                port,
            });
        }

        match s.rsplit_once(':') {
            // A bare IPv6 address has several colons and no port
            Some((host, port)) if !host.contains(':') => Ok(Self {
                host: host.to_string(),
                port: Some(port.parse().context(format!("Invalid port in {}", s))?),
            }),
            _ => Ok(Self {
                host: s.to_string(),
                port: None,
            }),
        }
    }
}

/// Connection profile: where the servers are and how to authenticate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Single host, used only when `hosts` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Host list for failover
    #[serde(default)]
    pub hosts: Vec<HostEntry>,

    /// Default port (default: 8086)
    #[serde(default = "default_port")]
    pub port: u16,

    /// `http` or `https` (default: http)
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default = "default_credential")]
    pub username: String,

    #[serde(default = "default_credential")]
    pub password: String,

    /// Default database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Timestamp precision (default: ms)
    #[serde(default = "default_time_precision")]
    pub time_precision: String,

    /// Retention policy for writes (default: "default")
    #[serde(default = "default_retention_policy")]
    pub retention_policy: String,
}

fn default_port() -> u16 {
    8086
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_credential() -> String {
    "root".to_string()
}

fn default_time_precision() -> String {
    "ms".to_string()
}

fn default_retention_policy() -> String {
    "default".to_string()
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            host: None,
            hosts: Vec::new(),
            port: default_port(),
            protocol: default_protocol(),
            username: default_credential(),
            password: default_credential(),
            database: None,
            time_precision: default_time_precision(),
            retention_policy: default_retention_policy(),
        }
    }
}

impl Profile {
    /// Resolve the `(address, port)` pairs to register, in order.
    ///
    /// `hosts` wins over `host`; entries without a port use the profile port.
    pub fn endpoints(&self) -> Vec<(String, u16)> {
        if self.hosts.is_empty() {
            return self
                .host
                .iter()
                .map(|h| (h.clone(), self.port))
                .collect();
        }

        self.hosts
            .iter()
            .map(|h| (h.host.clone(), h.port.unwrap_or(self.port)))
            .collect()
    }

    pub fn scheme(&self) -> Result<Scheme> {
        match self.protocol.to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => anyhow::bail!("Unsupported protocol '{}' (expected http or https)", other),
        }
    }

    /// Settings for the database client
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            username: self.username.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            time_precision: self.time_precision.clone(),
            retention_policy: self.retention_policy.clone(),
        }
    }
}

/// Failover settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// How long a failed host stays disabled, in milliseconds
    #[serde(default = "default_failover_timeout_ms")]
    pub failover_timeout_ms: u64,

    /// Per-request deadline in milliseconds (unset = transport default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,

    /// Extra hosts tried after a transport failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure_tls: bool,
}

fn default_failover_timeout_ms() -> u64 {
    60_000
}

fn default_max_retries() -> u32 {
    2
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            failover_timeout_ms: default_failover_timeout_ms(),
            request_timeout_ms: None,
            max_retries: default_max_retries(),
            insecure_tls: false,
        }
    }
}

impl FailoverConfig {
    /// Dispatcher configuration for hosts reached over `scheme`
    pub fn dispatcher_config(&self, scheme: Scheme) -> DispatcherConfig {
        DispatcherConfig {
            failover_timeout: Duration::from_millis(self.failover_timeout_ms),
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
            max_retries: self.max_retries,
            scheme,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Named connection profiles
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,

    /// Profile used when none is requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    /// Failover settings
    #[serde(default)]
    pub failover: FailoverConfig,
}

impl Config {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a profile by name, or the default profile if not specified.
    ///
    /// Without a name or `default_profile`, only a lone profile is picked;
    /// several profiles give `None` rather than an arbitrary one.
    pub fn get_profile(&self, name: Option<&str>) -> Option<&Profile> {
        if let Some(name) = name {
            self.profiles.get(name)
        } else if let Some(default) = &self.default_profile {
            self.profiles.get(default)
        } else if self.profiles.len() == 1 {
            self.profiles.values().next()
        } else {
            None
        }
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config =
        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

    Ok(config)
}

/// Load configuration from environment variables
///
/// - INFLUX_HOSTS (comma-separated `host[:port]` list)
/// - INFLUX_PORT (optional, defaults to 8086)
/// - INFLUX_PROTOCOL (optional, http or https)
/// - INFLUX_USERNAME / INFLUX_PASSWORD (optional, default root/root)
/// - INFLUX_DATABASE (optional)
/// - INFLUX_FAILOVER_TIMEOUT_MS, INFLUX_REQUEST_TIMEOUT_MS, INFLUX_MAX_RETRIES (optional)
pub fn load_from_env() -> Result<Config> {
    // Try to load .env file if it exists (don't fail if it doesn't)
    let _ = dotenvy::dotenv();

    let mut config = Config::new();
    let mut profile = Profile::default();

    let hosts_str =
        std::env::var("INFLUX_HOSTS").context("INFLUX_HOSTS environment variable not set")?;

    profile.hosts = hosts_str
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(HostEntry::parse)
        .collect::<Result<_>>()?;

    if profile.hosts.is_empty() {
        anyhow::bail!("INFLUX_HOSTS contains no valid hosts");
    }

    if let Ok(port) = std::env::var("INFLUX_PORT") {
        profile.port = port.parse().context("INFLUX_PORT is not a valid port")?;
    }
    if let Ok(protocol) = std::env::var("INFLUX_PROTOCOL") {
        profile.protocol = protocol;
    }
    if let Ok(username) = std::env::var("INFLUX_USERNAME") {
        profile.username = username;
    }
    if let Ok(password) = std::env::var("INFLUX_PASSWORD") {
        profile.password = password;
    }
    profile.database = std::env::var("INFLUX_DATABASE").ok();

    config.profiles.insert("default".to_string(), profile);
    config.default_profile = Some("default".to_string());

    if let Ok(timeout) = std::env::var("INFLUX_FAILOVER_TIMEOUT_MS") {
        config.failover.failover_timeout_ms = timeout
            .parse()
            .context("INFLUX_FAILOVER_TIMEOUT_MS is not a valid number of milliseconds")?;
    }

    if let Ok(timeout) = std::env::var("INFLUX_REQUEST_TIMEOUT_MS") {
        config.failover.request_timeout_ms = Some(
            timeout
                .parse()
                .context("INFLUX_REQUEST_TIMEOUT_MS is not a valid number of milliseconds")?,
        );
    }

    if let Ok(retries) = std::env::var("INFLUX_MAX_RETRIES") {
        config.failover.max_retries = retries
            .parse()
            .context("INFLUX_MAX_RETRIES is not a valid retry count")?;
    }

    Ok(config)
}

/// Load configuration from file or environment
///
/// Tries the YAML file first, then falls back to environment variables if no
/// file is specified.
///
/// # Arguments
/// * `config_path` - Optional path to YAML config file
/// * `profile_name` - Optional profile name to use (only relevant for YAML configs)
pub fn load_config(config_path: Option<&str>, profile_name: Option<&str>) -> Result<Config> {
    if let Some(path) = config_path {
        let mut config = load_from_yaml(path)?;

        // If a specific profile is requested, make it the default
        if let Some(name) = profile_name {
            if !config.profiles.contains_key(name) {
                anyhow::bail!("Profile '{}' not found in config file", name);
            }
            config.default_profile = Some(name.to_string());
        }

        Ok(config)
    } else {
        load_from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
profiles:
  production:
    hosts:
      - host: influx-1.example.com
      - host: influx-2.example.com
        port: 8087
    username: admin
    password: secret
    database: metrics
    time_precision: s

failover:
  failover_timeout_ms: 30000
  request_timeout_ms: 5000
  max_retries: 1

default_profile: production
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.profiles.len(), 1);
        let profile = config.get_profile(None).unwrap();
        assert_eq!(
            profile.endpoints(),
            vec![
                ("influx-1.example.com".to_string(), 8086),
                ("influx-2.example.com".to_string(), 8087),
            ]
        );
        assert_eq!(profile.username, "admin");
        assert_eq!(profile.database.as_deref(), Some("metrics"));
        assert_eq!(profile.time_precision, "s");
        assert_eq!(profile.retention_policy, "default");

        let dispatcher = config.failover.dispatcher_config(Scheme::Http);
        assert_eq!(dispatcher.failover_timeout, Duration::from_secs(30));
        assert_eq!(dispatcher.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(dispatcher.max_retries, 1);
    }

    #[test]
    fn test_get_profile_needs_a_choice_among_several() {
        let mut config = Config::new();
        config.profiles.insert("a".to_string(), Profile::default());
        assert!(config.get_profile(None).is_some());

        config.profiles.insert("b".to_string(), Profile::default());
        assert!(config.get_profile(None).is_none());
        assert!(config.get_profile(Some("b")).is_some());

        config.default_profile = Some("a".to_string());
        assert!(config.get_profile(None).is_some());
    }

    #[test]
    fn test_default_values() {
        let yaml = r#"
profiles:
  minimal:
    host: localhost
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let profile = config.profiles.get("minimal").unwrap();

        assert_eq!(profile.endpoints(), vec![("localhost".to_string(), 8086)]);
        assert_eq!(profile.username, "root");
        assert_eq!(profile.password, "root");
        assert_eq!(profile.scheme().unwrap(), Scheme::Http);

        assert_eq!(config.failover.failover_timeout_ms, 60_000);
        assert_eq!(config.failover.request_timeout_ms, None);
        assert_eq!(config.failover.max_retries, 2);
    }

    #[test]
    fn test_hosts_take_precedence_over_host() {
        let profile = Profile {
            host: Some("ignored".to_string()),
            hosts: vec![HostEntry::parse("a:9000").unwrap()],
            ..Default::default()
        };
        assert_eq!(profile.endpoints(), vec![("a".to_string(), 9000)]);

        assert!(Profile::default().endpoints().is_empty());
    }

    #[test]
    fn test_host_entry_parse() {
        assert_eq!(
            HostEntry::parse("influx-1").unwrap(),
            HostEntry { host: "influx-1".to_string(), port: None }
        );
        assert_eq!(
            HostEntry::parse(" influx-1:8087 ").unwrap(),
            HostEntry { host: "influx-1".to_string(), port: Some(8087) }
        );
        assert_eq!(
            HostEntry::parse("[::1]:8086").unwrap(),
            HostEntry { host: "::1".to_string(), port: Some(8086) }
        );
        assert_eq!(
            HostEntry::parse("fe80::1").unwrap(),
            HostEntry { host: "fe80::1".to_string(), port: None }
        );
        assert!(HostEntry::parse("influx-1:http").is_err());
        assert!(HostEntry::parse("[::1").is_err());
    }

    #[test]
    fn test_scheme_parsing() {
        let mut profile = Profile::default();
        profile.protocol = "HTTPS".to_string();
        assert_eq!(profile.scheme().unwrap(), Scheme::Https);

        profile.protocol = "udp".to_string();
        assert!(profile.scheme().is_err());
    }
}

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::db::InfluxDb;
use crate::dispatch::{Dispatcher, HyperTransport, TransportOptions};

/// Core shared by the CLI and library users
///
/// Owns one dispatcher (and so one host pool and one HTTP connection pool);
/// clones share it.
#[derive(Clone)]
pub struct Core {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    db: InfluxDb,
}

impl Core {
    /// Build the dispatcher and client for a profile (default profile if `None`).
    ///
    /// Host registration errors (bad or duplicate entries, no hosts at all)
    /// fail here, before any request is made.
    pub fn new(config: Config, profile_name: Option<&str>) -> Result<Self> {
        let config = Arc::new(config);

        let profile = config
            .get_profile(profile_name)
            .ok_or_else(|| {
                anyhow::anyhow!("No profile selected; pass --profile or set default_profile")
            })?;

        let endpoints = profile.endpoints();
        if endpoints.is_empty() {
            anyhow::bail!("Profile has no hosts configured");
        }

        let transport = HyperTransport::with_options(TransportOptions {
            insecure_tls: config.failover.insecure_tls,
            ..Default::default()
        })
        .context("Failed to build HTTP transport")?;

        let dispatcher = Dispatcher::with_transport(
            config.failover.dispatcher_config(profile.scheme()?),
            transport,
        );

        for (address, port) in &endpoints {
            dispatcher
                .add_host(address.as_str(), *port)
                .context(format!("Invalid host entry {}:{}", address, port))?;
        }

        info!(
            hosts = endpoints.len(),
            failover_timeout_ms = config.failover.failover_timeout_ms,
            max_retries = config.failover.max_retries,
            "dispatcher ready"
        );

        let dispatcher = Arc::new(dispatcher);
        let db = InfluxDb::new(Arc::clone(&dispatcher), profile.client_settings());

        Ok(Self {
            config,
            dispatcher,
            db,
        })
    }

    /// Database client sharing this core's dispatcher
    pub fn db(&self) -> &InfluxDb {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HostEntry, Profile};

    fn config_with_hosts(hosts: &[&str]) -> Config {
        let mut config = Config::new();
        let profile = Profile {
            hosts: hosts.iter().map(|h| HostEntry::parse(h).unwrap()).collect(),
            database: Some("metrics".to_string()),
            ..Default::default()
        };
        config.profiles.insert("test".to_string(), profile);
        config
    }

    #[tokio::test]
    async fn test_core_registers_hosts() {
        let core = Core::new(config_with_hosts(&["a", "b:8087"]), None).unwrap();

        let hosts = core.dispatcher.hosts_available();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[1].port, 8087);
        assert_eq!(core.db().settings().database.as_deref(), Some("metrics"));
        assert_eq!(core.dispatcher.max_retries(), 2);
    }

    #[tokio::test]
    async fn test_core_rejects_duplicate_hosts() {
        let Err(err) = Core::new(config_with_hosts(&["a", "a:8086"]), None) else {
            panic!("duplicate hosts must be rejected");
        };
        assert!(format!("{:#}", err).contains("already registered"));
    }

    #[tokio::test]
    async fn test_core_requires_hosts() {
        assert!(Core::new(config_with_hosts(&[]), None).is_err());
        assert!(Core::new(config_with_hosts(&["a"]), Some("missing")).is_err());
    }
}

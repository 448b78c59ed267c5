//! Example demonstrating host failover
//!
//! This example shows how to:
//! 1. Register several hosts, some of them unreachable
//! 2. Watch requests fail over and hosts get disabled
//! 3. Cancel a dispatch
//!
//! Run with:
//! ```
//! RUST_LOG=influxpool=debug cargo run --example failover
//! ```

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use influxpool::dispatch::{ErrorKind, RequestDescriptor};
use influxpool::{Dispatcher, DispatcherConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let dispatcher = Dispatcher::new(DispatcherConfig {
        failover_timeout: Duration::from_secs(10),
        request_timeout: Some(Duration::from_secs(2)),
        max_retries: 2,
        ..Default::default()
    })?;

    // Port 9 (discard) is usually closed, so the first two hosts refuse
    dispatcher.add_host("127.0.0.1", 9)?;
    dispatcher.add_host("localhost", 9)?;
    dispatcher.add_host("127.0.0.1", 8086)?;

    for i in 0..5 {
        let descriptor = RequestDescriptor::new("ping");
        match dispatcher.get(descriptor).await {
            Ok(response) => info!(
                request = i,
                host = %response.host,
                attempts = response.attempts,
                "ok"
            ),
            Err(e) if e.kind() == ErrorKind::ApplicationFailure => {
                info!(request = i, error = %e, "server answered with an error")
            }
            Err(e) => warn!(request = i, error = %e, "request failed"),
        }

        info!(
            available = dispatcher.hosts_available().len(),
            disabled = dispatcher.hosts_disabled().len(),
            "pool state"
        );
    }

    // A cancelled dispatch returns immediately and leaves the pool untouched
    let token = CancellationToken::new();
    token.cancel();
    let result = dispatcher
        .get_with_cancel(RequestDescriptor::new("ping"), &token)
        .await;
    if let Err(e) = result {
        info!(error = %e, "cancelled");
    }

    Ok(())
}

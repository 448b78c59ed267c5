use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use influxpool::cli::commands;
use influxpool::config;
use influxpool::core::Core;

#[derive(Parser)]
#[command(name = "influxpool")]
#[command(version, about = "InfluxDB client with multi-host failover", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<String>,

    /// Profile to use from config
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query
    Query {
        /// Query text
        query: String,

        /// Database to query (defaults to the profile's database)
        #[arg(long)]
        database: Option<String>,
    },

    /// Write a single point
    Write {
        /// Measurement name
        measurement: String,

        /// Fields as key=value
        #[arg(required = true)]
        fields: Vec<String>,

        /// Tags as key=value (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Target database (defaults to the profile's database)
        #[arg(long)]
        database: Option<String>,
    },

    /// Create a database
    CreateDb {
        /// Database name
        name: String,
    },

    /// Drop a database
    DropDb {
        /// Database name
        name: String,
    },

    /// List databases
    Databases,

    /// Show available and disabled hosts
    Hosts {
        /// Send a probe query first so failing hosts get disabled
        #[arg(long)]
        probe: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Each invocation is a handful of sequential requests
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // load_config promotes --profile to the default profile
    let config = config::load_config(cli.config.as_deref(), cli.profile.as_deref())?;
    let core = Core::new(config, None)?;

    match cli.command {
        Commands::Query { query, database } => {
            commands::cmd_query(&core, &query, database.as_deref()).await?;
        }
        Commands::Write {
            measurement,
            fields,
            tags,
            database,
        } => {
            commands::cmd_write(&core, &measurement, &fields, &tags, database.as_deref()).await?;
        }
        Commands::CreateDb { name } => {
            commands::cmd_create_db(&core, &name).await?;
        }
        Commands::DropDb { name } => {
            commands::cmd_drop_db(&core, &name).await?;
        }
        Commands::Databases => {
            commands::cmd_databases(&core).await?;
        }
        Commands::Hosts { probe } => {
            commands::cmd_hosts(&core, probe).await?;
        }
    }

    Ok(())
}

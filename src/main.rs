// QuotaGuard - Main Entry Point
//
// Runs the access gate as an HTTP service, or performs one gate operation
// against the configured counter store and prints the result as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quotaguard::config::{Config, LoggingConfig};
use quotaguard::rate_limit::AccessGate;
use quotaguard::server::{self, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// QuotaGuard: rate limits and daily quotas for metered model calls
#[derive(Parser, Debug)]
#[command(name = "quotaguard")]
#[command(author = "QuotaGuard Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Rate limit and daily quota gate for metered model calls", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the gate over HTTP
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Check whether a call may proceed
    Acquire {
        /// Metered resource, e.g. a model code
        #[arg(long)]
        resource: String,

        /// Caller identifier (anonymous if omitted)
        #[arg(long)]
        caller: Option<String>,

        /// Daily limit, 0 or less for unlimited
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        daily_limit: i64,
    },
    /// Record a successful call against today's quota
    Record {
        /// Metered resource
        #[arg(long)]
        resource: String,

        /// Caller identifier (anonymous if omitted)
        #[arg(long)]
        caller: Option<String>,
    },
    /// Show counters for a caller and resource
    Status {
        /// Metered resource
        #[arg(long)]
        resource: String,

        /// Caller identifier (anonymous if omitted)
        #[arg(long)]
        caller: Option<String>,

        /// Daily limit, 0 or less for unlimited
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        daily_limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&config.logging, args.verbose)?;

    let Some(command) = args.command else {
        info!("No command specified. Use \"quotaguard --help\" for usage.");
        return Ok(());
    };

    let store = config
        .store
        .connect()
        .await
        .context("Failed to set up counter store")?;
    if store.backend() == "memory" && !matches!(command, Commands::Serve { .. }) {
        warn!("Using the in-memory store; counters do not outlive this process");
    }
    let gate = AccessGate::new(store, &config.rate_limit);

    match command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            let addr: SocketAddr = format!("{}:{}", config.server.host, port)
                .parse()
                .context("Invalid server address")?;
            let state = AppState::new(Arc::new(gate), config.metrics.enabled);
            server::serve(addr, state).await?;
        }
        Commands::Acquire {
            resource,
            caller,
            daily_limit,
        } => {
            let decision = gate.check(caller.as_deref(), &resource, daily_limit).await;
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Commands::Record { resource, caller } => {
            // Failures are only logged; stdout stays empty
            gate.record_usage(caller.as_deref(), &resource).await;
        }
        Commands::Status {
            resource,
            caller,
            daily_limit,
        } => {
            let snapshot = gate.snapshot(caller.as_deref(), &resource, daily_limit).await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}

/// Initialize the global tracing subscriber
fn init_tracing(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))?
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    // Logs go to stderr so one-shot commands keep stdout as clean JSON
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }

    Ok(())
}

//! Time fold explorer backend.
//!
//! # Architecture Overview
//!
//! ```text
//!   datasets.toml (local | s3 | gs | http)
//!          │
//!          ▼
//!   ┌──────────────┐   fingerprint    ┌──────────────┐
//!   │ source reader│ ───────────────▶ │ config store │ ◀── file watcher
//!   └──────────────┘                  └──────┬───────┘
//!                                            │ snapshot
//!   query params ──▶ resolver ──┐            ▼
//!                               │     ┌──────────────┐     ┌─────────────────┐
//!                               └───▶ │ dataset cache│ ──▶ │ loader registry │
//!                                     └──────┬───────┘     │ file | gen | …  │
//!                                            │             └─────────────────┘
//!                                            ▼
//!                                       HTTP (JSON)
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use time_fold_explorer::config;
use time_fold_explorer::http::HttpServer;
use time_fold_explorer::lifecycle::{self, signals, Shutdown};
use time_fold_explorer::loaders::LoaderCatalog;
use time_fold_explorer::observability::{logging, metrics};
use time_fold_explorer::source::SourceReader;

#[derive(Debug, Parser)]
#[command(name = "time-fold-explorer", version, about = "Dataset backend for the time fold explorer")]
struct Cli {
    /// Settings file (TOML). Environment variables override its values.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Bind address, overriding settings.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut settings = config::load(cli.settings.as_deref())?;
    if let Some(bind) = cli.bind {
        settings.server.bind_address = bind;
        config::validate_settings(&settings).map_err(config::SettingsError::Validation)?;
    }

    logging::init_logging(&settings.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "time-fold-explorer starting");

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let reader = Arc::new(SourceReader::new(settings.datasets.source_timeout())?);
    let catalog = LoaderCatalog::builtin(reader.clone());
    let bind_address = settings.server.bind_address.clone();

    let services = lifecycle::bootstrap(settings, &catalog, reader).await?;
    let shutdown = Shutdown::new();
    let _watcher = lifecycle::start_background_tasks(&services, &shutdown)?;
    signals::spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new(&services).run(listener, shutdown.wait()).await?;

    shutdown.trigger();
    tracing::info!("Shutdown complete");
    Ok(())
}

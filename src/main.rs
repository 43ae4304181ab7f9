//! Main entry point for the collection-downloader CLI

use clap::Parser;
use collection_downloader::cli::{Cli, Commands};
use collection_downloader::metrics;
use collection_downloader::shutdown::{self, ShutdownCoordinator};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("collection_downloader=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(addr) = cli.metrics_addr {
        metrics::init_metrics(addr)?;
        info!(addr = %addr, "Prometheus exporter listening");
    }

    // Install global shutdown coordinator and Ctrl+C handler
    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing current batch and flushing results...");
                shutdown.request_shutdown();
            }
        }
    });

    match &cli.command {
        Commands::Listing(args) => args.execute(&cli, shutdown).await?,
        Commands::Snapshot(args) => args.execute(&cli, shutdown).await?,
        Commands::Download(args) => args.execute(&cli, shutdown).await?,
    };
    Ok(())
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine; every option also has a flag
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}

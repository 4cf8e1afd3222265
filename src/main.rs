//! Multi-worker reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌───────────────────────── coordinator ─────────────────────────┐
//!                 │                                                               │
//!  Client ───────▶│  http::server ──▶ coordinator::pool ──▶ pending[id]           │
//!  Request        │   (axum)            (random worker)        (oneshot)          │
//!                 │                          │                    ▲               │
//!                 └──────────────────────────┼────────────────────┼───────────────┘
//!                                   NDJSON   │ stdin       stdout │  NDJSON
//!                 ┌──────────────────────────▼────────────────────┼───────────────┐
//!                 │  worker::runtime ──▶ routing::Router ──▶ worker::upstream ────┼──▶ Upstream
//!                 │                   (first prefix match)       (GET, full body) │    Service
//!                 └──────────────────────────────── worker × N ───────────────────┘
//! ```
//!
//! The same executable runs as coordinator (default) or as a worker
//! (`worker` subcommand, spawned by the coordinator).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cluster_proxy::config::load_config;
use cluster_proxy::coordinator::WorkerMode;
use cluster_proxy::lifecycle::{self, signals, Shutdown, StartupOptions};
use cluster_proxy::observability::{logging, metrics};
use cluster_proxy::worker;

#[derive(Parser)]
#[command(name = "cluster-proxy")]
#[command(about = "Reverse proxy dispatching requests to a pool of workers", long_about = None)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON).
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Port to listen on, overriding `server.listen`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of workers, overriding `server.workers`.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Run workers as tasks in this process instead of child processes.
    #[arg(long)]
    in_process: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Worker process entry point (started by the coordinator)
    #[command(hide = true)]
    Worker,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Commands::Worker) = cli.command {
        let config = worker::config_from_env()?;
        logging::init(&config.observability.log_level);
        worker::run_process(config).await?;
        return Ok(());
    }

    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.listen = port;
    }
    if let Some(workers) = cli.workers {
        config.server.workers = Some(workers);
    }

    logging::init(&config.observability.log_level);
    tracing::info!(
        config = %cli.config.display(),
        listen = config.server.listen,
        workers = config.server.worker_count(),
        rules = config.server.rules.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mode = if cli.in_process {
        WorkerMode::Task
    } else {
        WorkerMode::current_exe()?
    };

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        trigger.trigger();
    });

    lifecycle::run(StartupOptions::from_config(config, mode), &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

//! havocd — the havoc chaos daemon.
//!
//! Loads a havoc.toml, builds the engine against an instance inventory, and
//! runs chaos cycles until Ctrl-C or the configured max runtime.
//!
//! # Usage
//!
//! ```text
//! havocd run --config havoc.toml --inventory inventory.json --metrics-address 127.0.0.1:9090
//! havocd check --config havoc.toml
//! ```

mod server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use havoc_cluster::{MemoryCluster, NoopNotifier, Notifier, WebhookNotifier};
use havoc_engine::{ChaosEngine, Configuration};
use havoc_metrics::ChaosMetrics;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "havocd", about = "havoc chaos daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the chaos loop.
    Run {
        /// Path to havoc.toml.
        #[arg(long)]
        config: PathBuf,

        /// JSON inventory of namespaces and instances.
        #[arg(long)]
        inventory: PathBuf,

        /// Force dry-run, whatever the config says.
        #[arg(long, conflicts_with = "no_dry_run")]
        dry_run: bool,

        /// Force live terminations, whatever the config says.
        #[arg(long)]
        no_dry_run: bool,

        /// Serve /healthz and /metrics on this address.
        #[arg(long)]
        metrics_address: Option<SocketAddr>,

        /// Seed the random source for reproducible victim selection.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Validate a config file and print the compiled settings.
    Check {
        #[arg(long)]
        config: PathBuf,
    },
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,havoc=debug"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run {
            config,
            inventory,
            dry_run,
            no_dry_run,
            metrics_address,
            seed,
        } => {
            let dry_run = match (dry_run, no_dry_run) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            run(config, inventory, dry_run, metrics_address, seed).await
        }
        Command::Check { config } => {
            let compiled = Configuration::load(&config)
                .with_context(|| format!("invalid config {}", config.display()))?;
            println!("{compiled}");
            Ok(())
        }
    }
}

async fn run(
    config_path: PathBuf,
    inventory: PathBuf,
    dry_run: Option<bool>,
    metrics_address: Option<SocketAddr>,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let mut config = Configuration::load(&config_path)
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    if let Some(dry_run) = dry_run {
        config.dry_run = dry_run;
    }
    if !config.dry_run {
        warn!("dry run disabled, victims will be terminated");
    }

    // ── Collaborators ──────────────────────────────────────────

    let cluster = Arc::new(
        MemoryCluster::from_inventory_file(&inventory)
            .with_context(|| format!("failed to load inventory {}", inventory.display()))?,
    );

    let notifier: Arc<dyn Notifier> = match &config.webhook {
        Some(hook) => {
            info!(url = %hook.url, "webhook notifier enabled");
            Arc::new(WebhookNotifier::new(&hook.url, hook.timeout)?)
        }
        None => Arc::new(NoopNotifier::new()),
    };

    let metrics = Arc::new(ChaosMetrics::new());
    let mut engine = ChaosEngine::new(config, cluster, notifier).with_metrics(metrics.clone());
    if let Some(seed) = seed {
        engine = engine.with_seed(seed);
    }

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = signal_tx.send(true);
        }
    });

    // ── Health and metrics server ──────────────────────────────

    let server_handle = match metrics_address {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!(%addr, "metrics server starting");

            let mut server_shutdown = shutdown_rx.clone();
            let router = server::build_router(metrics.clone());
            Some(tokio::spawn(async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        let _ = server_shutdown.wait_for(|stop| *stop).await;
                    })
                    .await
            }))
        }
        None => None,
    };

    // ── Chaos loop ─────────────────────────────────────────────

    engine.run(shutdown_rx).await;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = server_handle {
        handle.await??;
    }

    info!("havocd stopped");
    Ok(())
}

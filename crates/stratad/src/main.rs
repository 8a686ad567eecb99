//! stratad — the Strata autoscaler daemon.
//!
//! Single binary that assembles the control loop:
//! - Configuration (strata.toml)
//! - Metrics source (cluster HTTP API)
//! - Job dispatcher (HTTP job runner)
//! - Control loop
//!
//! # Usage
//!
//! ```text
//! stratad run --config strata.toml \
//!     --cluster-addr 10.0.0.5:9600 \
//!     --executor-addr 10.0.0.6:9700
//! stratad check-config --config strata.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use strata_controller::ControlLoop;
use strata_core::{StrataConfig, TierRegistry};
use strata_dispatch::{Executor, HttpExecutor, JobDispatcher, NoopExecutor};
use strata_metrics::{HttpBackend, MetricsSource};

#[derive(Parser)]
#[command(name = "stratad", about = "Strata tier autoscaler daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the autoscaling control loop.
    Run {
        /// Path to the strata.toml configuration file.
        #[arg(long)]
        config: PathBuf,

        /// Authority of the storage cluster's metrics API.
        #[arg(long)]
        cluster_addr: String,

        /// Authority of the job runner; without it, operations are
        /// logged but not executed.
        #[arg(long)]
        executor_addr: Option<String>,

        /// Log decisions without submitting anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate a configuration file and print the effective policies.
    CheckConfig {
        /// Path to the strata.toml configuration file.
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stratad=debug,strata=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            cluster_addr,
            executor_addr,
            dry_run,
        } => run(config, cluster_addr, executor_addr, dry_run).await,
        Command::CheckConfig { config } => check_config(config),
    }
}

async fn run(
    config_path: PathBuf,
    cluster_addr: String,
    executor_addr: Option<String>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let mut settings = StrataConfig::from_file(&config_path)?.resolve()?;
    settings.dry_run |= dry_run;
    info!(config = ?config_path, tiers = settings.tiers.len(), "configuration loaded");

    // ── Assemble subsystems ────────────────────────────────────

    let backend = Arc::new(HttpBackend::new(cluster_addr.clone()));
    let metrics = MetricsSource::new(backend, settings.metrics_timeout);
    info!(%cluster_addr, "metrics source initialized");

    let executor: Arc<dyn Executor> = match &executor_addr {
        Some(addr) => {
            info!(executor_addr = %addr, "job runner executor initialized");
            Arc::new(HttpExecutor::new(addr.clone()))
        }
        None => {
            if !settings.dry_run {
                warn!("no executor address given, forcing dry run");
                settings.dry_run = true;
            }
            Arc::new(NoopExecutor::new())
        }
    };

    let registry = Arc::new(TierRegistry::from_policies(&settings.tiers));
    let dispatcher = JobDispatcher::new(executor, registry.clone())
        .with_dry_run(settings.dry_run)
        .with_submit_timeout(settings.submit_timeout)
        .with_operation_timeout(settings.operation_timeout);

    let control = Arc::new(ControlLoop::new(settings, metrics, dispatcher, registry));

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let loop_handle = {
        let control = control.clone();
        tokio::spawn(async move { control.run(shutdown_rx).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = loop_handle.await;
    info!("stratad stopped");
    Ok(())
}

fn check_config(config_path: PathBuf) -> anyhow::Result<()> {
    let settings = StrataConfig::from_file(&config_path)?.resolve()?;

    println!("configuration ok: {} tier(s)", settings.tiers.len());
    println!(
        "poll every {:?}; unreachable safety fraction {}",
        settings.poll_interval, settings.max_unreachable_fraction
    );
    for tier in &settings.tiers {
        println!(
            "  {}: drain <{}% (trigger {}, remove {}), grow when headroom <{} at {}% (add {}), \
             cooldown {:?}, zones {:?} (floor {})",
            tier.tier,
            tier.down_threshold_percent,
            tier.down_trigger_count,
            tier.decommission_count,
            tier.headroom_min_count,
            tier.up_threshold_percent,
            tier.provision_count,
            tier.cooldown,
            tier.zones,
            tier.min_per_zone,
        );
    }
    Ok(())
}

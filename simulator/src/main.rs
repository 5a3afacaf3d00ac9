//! PointLedger Simulator
//!
//! Runs concurrency scenarios against an in-process point service and checks
//! the balance invariants afterwards.

use std::time::{Duration, Instant};

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pointledger_server::{LockStrategy, ReadConsistency, ServiceConfig};

mod controller;
mod metrics;
mod scenario;

use controller::SimulationController;
use scenario::Scenario;

/// PointLedger Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "point-simulator")]
#[command(about = "Concurrency simulator for the PointLedger point service")]
struct Args {
    /// Scenario to run (built-in name or path to a JSON scenario)
    #[arg(short, long, default_value = "concurrent-charge")]
    scenario: String,

    /// Run every built-in scenario
    #[arg(long)]
    all: bool,

    /// Artificial store latency in milliseconds
    #[arg(long, default_value = "0")]
    store_latency_ms: u64,

    /// Lock wait bound in milliseconds
    #[arg(long, default_value = "5000")]
    lock_timeout_ms: u64,

    /// Use a striped lock pool of this size instead of per-user locks
    #[arg(long)]
    stripes: Option<usize>,

    /// Take the user lock for reads as well
    #[arg(long)]
    locked_reads: bool,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn service_config(&self) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.store_latency = Duration::from_millis(self.store_latency_ms);
        config.lock_config.acquire_timeout = Duration::from_millis(self.lock_timeout_ms);
        if let Some(stripes) = self.stripes {
            config.lock_config.strategy = LockStrategy::Striped { stripes };
        }
        if self.locked_reads {
            config.read_consistency = ReadConsistency::Locked;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.service_config();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let names: Vec<String> = if args.all {
        Scenario::builtin_names().iter().map(|n| n.to_string()).collect()
    } else {
        vec![args.scenario.clone()]
    };

    info!("Starting PointLedger Simulator");
    info!("Lock strategy: {:?}", config.lock_config.strategy);
    info!("Store latency: {}ms", args.store_latency_ms);

    for name in names {
        let scenario = Scenario::load(&name)?;
        let controller = SimulationController::new(&config, args.seed);

        let started = Instant::now();
        controller.run_scenario(&scenario).await?;
        let elapsed = started.elapsed();

        let metrics = controller.get_metrics().await;
        let service_metrics = controller.service().metrics().snapshot();
        info!("Scenario {} complete in {:?}", scenario.name, elapsed);
        info!("Total operations: {}", metrics.total_operations);
        info!("Successful: {}", metrics.successful_operations);
        info!("Rejected: {}", metrics.rejected_operations);
        info!("Failed: {}", metrics.failed_operations);
        info!("Success rate: {:.2}", metrics.success_rate());
        info!("Throughput: {:.1} ops/s", metrics.throughput(elapsed));
        info!(
            "Latency avg/p50/p99: {}/{}/{}us",
            metrics.average_latency_us(),
            metrics.p50_latency_us(),
            metrics.p99_latency_us()
        );
        info!(
            "Locks acquired: {}, timeouts: {}",
            service_metrics.locks_acquired, service_metrics.locks_timeout
        );
    }

    Ok(())
}

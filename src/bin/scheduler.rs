//! Periodic notification dispatcher and stale-event purger.

use std::path::PathBuf;

use anyhow::Context;
use calendar::{
    config::{self, SchedulerConfig},
    logging,
    runtime::{Scheduler, shutdown_channel},
    storage::connect_storage,
    transport::{Producer, QueueProducer},
    types::STORE_CONNECT_TIMEOUT,
};
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "calendar-scheduler", version, about = "Publishes due event notifications")]
struct Cli {
    /// Path to the TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg: SchedulerConfig = match &cli.config {
        Some(path) => config::load(path)?,
        None => SchedulerConfig::default(),
    };
    logging::init(&cfg.logger.level);

    let storage = connect_storage(cfg.storage.db, &cfg.storage.dsn, STORE_CONNECT_TIMEOUT)
        .await
        .with_context(|| format!("failed to open {:?} storage", cfg.storage.db))?;

    let mut producer = QueueProducer::new(&cfg.broker.url);
    producer
        .connect()
        .await
        .with_context(|| format!("failed to open queue {}", cfg.broker.url))?;

    let scheduler = Scheduler::new(storage, Box::new(producer), cfg.scheduler.period);
    scheduler
        .run(shutdown_channel())
        .await
        .context("scheduler stopped on error")?;

    info!("scheduler stopped");
    Ok(())
}

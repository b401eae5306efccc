//! Notification consumer that marks delivered events as notified.

use std::path::PathBuf;

use anyhow::Context;
use calendar::{
    config::{self, SenderConfig},
    logging,
    runtime::{Sender, shutdown_channel},
    storage::connect_storage,
    transport::{Consumer, QueueConsumer},
    types::STORE_CONNECT_TIMEOUT,
};
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "calendar-sender", version, about = "Consumes event notifications")]
struct Cli {
    /// Path to the TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg: SenderConfig = match &cli.config {
        Some(path) => config::load(path)?,
        None => SenderConfig::default(),
    };
    logging::init(&cfg.logger.level);

    let storage = connect_storage(cfg.storage.db, &cfg.storage.dsn, STORE_CONNECT_TIMEOUT)
        .await
        .with_context(|| format!("failed to open {:?} storage", cfg.storage.db))?;

    let mut consumer = QueueConsumer::new(&cfg.broker.url, cfg.broker.poll_interval);
    consumer
        .connect()
        .await
        .with_context(|| format!("failed to open queue {}", cfg.broker.url))?;

    let acked = Sender::new(storage, Box::new(consumer))
        .run(shutdown_channel())
        .await
        .context("sender stopped on error")?;

    info!(acked, "sender stopped");
    Ok(())
}

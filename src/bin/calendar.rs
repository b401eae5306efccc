//! HTTP front of the calendar service.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use calendar::{
    calendar::CalendarService,
    config::{self, CalendarConfig},
    http, logging,
    runtime::shutdown_signal,
    storage::connect_storage,
    types::{HTTP_DRAIN_TIMEOUT, STORE_CONNECT_TIMEOUT},
};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "calendar", version, about = "Calendar service over HTTP")]
struct Cli {
    /// Path to the TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg: CalendarConfig = match &cli.config {
        Some(path) => config::load(path)?,
        None => CalendarConfig::default(),
    };
    logging::init(&cfg.logger.level);

    let storage = connect_storage(cfg.storage.db, &cfg.storage.dsn, STORE_CONNECT_TIMEOUT)
        .await
        .with_context(|| format!("failed to open {:?} storage", cfg.storage.db))?;
    let service = Arc::new(CalendarService::new(storage));

    let addr = cfg.http.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "calendar listening");

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let app = http::router(Arc::clone(&service));
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.changed().await;
            })
            .await
    });

    tokio::select! {
        res = &mut server => {
            res.context("server task panicked")?.context("server error")?;
        }
        _ = shutdown_signal() => {
            let _ = stop_tx.send(true);
            match tokio::time::timeout(HTTP_DRAIN_TIMEOUT, &mut server).await {
                Ok(res) => res.context("server task panicked")?.context("server error")?,
                Err(_) => {
                    warn!("in-flight requests did not drain in time");
                    server.abort();
                }
            }
        }
    }

    service.close().await.context("failed to close storage")?;
    info!("calendar stopped");
    Ok(())
}

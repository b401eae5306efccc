use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Months, TimeDelta, Utc};
use tokio::{
    sync::watch,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, error, info, warn};

use crate::{
    storage::{Storage, StorageError},
    transport::{Producer, TransportError},
};

use super::stop_requested;

const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("send notification: {0}")]
    Transport(#[from] TransportError),
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub sent: u64,
    pub deleted: u64,
}

/// Periodic dispatcher of due notifications and purger of stale events.
pub struct Scheduler {
    storage: Arc<dyn Storage>,
    producer: Box<dyn Producer>,
    period: Duration,
}

impl Scheduler {
    pub fn new(storage: Arc<dyn Storage>, producer: Box<dyn Producer>, period: Duration) -> Self {
        Self {
            storage,
            producer,
            period: period.max(MIN_PERIOD),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Publishes every due, unnotified event and returns how many went out.
    ///
    /// The first publish failure aborts the batch. Nothing is marked here;
    /// the sender marks events once it has consumed their messages.
    pub async fn send_notification(&self, now: DateTime<Utc>) -> Result<u64, SchedulerError> {
        let events = self.storage.list_events_due_for_notice(now).await?;
        let mut sent = 0u64;
        for event in &events {
            self.producer.send_notification(event).await?;
            sent += 1;
        }
        Ok(sent)
    }

    pub async fn delete_events_older_date(&self, cutoff: DateTime<Utc>) -> Result<u64, SchedulerError> {
        Ok(self.storage.delete_events_older_than(cutoff).await?)
    }

    /// One notification pass followed by one purge pass.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, SchedulerError> {
        debug!("starting notification pass");
        let sent = self.send_notification(now).await?;
        debug!(sent, "notifications sent");

        let deleted = self.delete_events_older_date(purge_cutoff(now)).await?;
        debug!(deleted, "stale events deleted");

        Ok(TickReport { sent, deleted })
    }

    /// Ticks every period until `shutdown` reads `true` or a tick fails.
    ///
    /// Either way the producer and then the storage are closed before
    /// returning. A failed tick is returned, not retried. Dropping the
    /// shutdown sender does not stop the loop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), SchedulerError> {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period = ?self.period, "scheduler started");

        let outcome = loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => {
                    info!("scheduler shutdown requested");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    match self.tick(Utc::now()).await {
                        Ok(report) => {
                            info!(sent = report.sent, deleted = report.deleted, "scheduler tick finished");
                        }
                        Err(err) => {
                            error!(error = %err, "scheduler tick failed, stopping");
                            break Err(err);
                        }
                    }
                }
            }
        };

        drop(ticker);
        self.stop().await;
        outcome
    }

    async fn stop(&mut self) {
        if let Err(err) = self.producer.close().await {
            warn!(error = %err, "failed to close producer");
        } else {
            debug!("producer closed");
        }
        if let Err(err) = self.storage.close().await {
            warn!(error = %err, "failed to close storage");
        } else {
            debug!("storage closed");
        }
    }
}

/// Events ending before this instant are purged: one calendar year before `now`.
pub fn purge_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(12))
        .unwrap_or(now - TimeDelta::days(365))
}

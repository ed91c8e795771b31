//! Notification delivery worker.
//!
//! Each job invocation owns a [`DeliveryAttempt`] and a tick timer. The timer
//! lives inside the invocation future, so it is released on every exit path:
//! success, blacklist rejection, or the future being dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};

use herald_common::config::AppConfig;
use herald_common::error::Result;
use herald_common::types::NotificationData;
use herald_queue::{JobContext, QueueProcessor};

use crate::blacklist::Blacklist;
use crate::delivery::{DEFAULT_WORK_UNITS, DeliveryAttempt, TickOutcome};
use crate::dispatch::{Dispatcher, LogDispatcher};
use crate::error::DeliveryError;

/// Default delay between delivery ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Delivers push notification jobs. Cheap to clone; clones share the
/// read-only blacklist and dispatcher.
#[derive(Clone)]
pub struct NotificationWorker {
    blacklist: Arc<Blacklist>,
    dispatcher: Arc<dyn Dispatcher>,
    tick_interval: Duration,
    work_units: u32,
}

impl NotificationWorker {
    pub fn new(blacklist: Blacklist) -> Self {
        Self {
            blacklist: Arc::new(blacklist),
            dispatcher: Arc::new(LogDispatcher),
            tick_interval: DEFAULT_TICK_INTERVAL,
            work_units: DEFAULT_WORK_UNITS,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Blacklist::from_config(config))
            .with_tick_interval(Duration::from_millis(config.tick_interval_ms))
            .with_work_units(config.work_units)
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_work_units(mut self, work_units: u32) -> Self {
        self.work_units = work_units;
        self
    }

    /// Register on `category` and process jobs until the processor shuts down.
    pub async fn run(
        &self,
        processor: &QueueProcessor,
        category: &str,
        concurrency: usize,
    ) -> Result<()> {
        tracing::info!(
            category,
            concurrency,
            blacklisted = self.blacklist.len(),
            "Notification worker started"
        );

        let worker = self.clone();
        processor
            .process(category, concurrency, move |ctx: JobContext| {
                let worker = worker.clone();
                async move { worker.handle(&ctx).await }
            })
            .await
    }

    /// Handle one notification job.
    pub async fn handle(&self, ctx: &JobContext) -> std::result::Result<(), DeliveryError> {
        let notification: NotificationData = ctx
            .job()
            .payload()
            .map_err(|e| DeliveryError::InvalidPayload(e.to_string()))?;

        self.send_notification(&notification, ctx).await
    }

    /// Run the delivery countdown for one notification.
    pub async fn send_notification(
        &self,
        notification: &NotificationData,
        ctx: &JobContext,
    ) -> std::result::Result<(), DeliveryError> {
        let job_id = ctx.job().id;
        let mut attempt = DeliveryAttempt::new(self.work_units);

        // First tick fires one interval after start, not immediately.
        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let blacklisted = self.blacklist.contains(&notification.phone_number);
            let report = attempt.tick(blacklisted);

            if let Some(progress) = report.progress {
                if let Err(e) = ctx.progress(progress.current, progress.total).await {
                    tracing::warn!(job_id = %job_id, error = %e, "Failed to report progress");
                }
            }

            if report.send {
                self.dispatcher.dispatch(notification);
            }

            match report.outcome {
                Some(TickOutcome::Delivered) => {
                    tracing::info!(
                        job_id = %job_id,
                        phone_number = %notification.phone_number,
                        "Notification delivered"
                    );
                    return Ok(());
                }
                Some(TickOutcome::Blacklisted) => {
                    tracing::warn!(
                        job_id = %job_id,
                        phone_number = %notification.phone_number,
                        "Recipient is blacklisted"
                    );
                    return Err(DeliveryError::RecipientBlacklisted {
                        phone_number: notification.phone_number.clone(),
                    });
                }
                None => {}
            }
        }
    }
}

//! Bounded-concurrency job processor.
//!
//! One dequeue loop per [`QueueProcessor::process`] call. Each dequeued job
//! runs in its own task while holding a semaphore permit, so at most
//! `concurrency` handlers are in flight. The handler's return value (or its
//! panic) is turned into exactly one `complete` / `fail` call on the queue.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;

use herald_common::error::{AppError, Result};
use herald_common::types::Job;

use crate::queue::JobQueue;

/// What a handler gets for one job invocation.
pub struct JobContext {
    job: Job,
    queue: Arc<dyn JobQueue>,
}

impl JobContext {
    pub fn new(job: Job, queue: Arc<dyn JobQueue>) -> Self {
        Self { job, queue }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Report progress for this job to the queue.
    pub async fn progress(&self, current: u32, total: u32) -> Result<()> {
        self.queue.progress(self.job.id, current, total).await
    }
}

/// Snapshot of processor counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessorMetrics {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

/// Runs handlers over a queue category. Cheap to clone; clones share the
/// shutdown signal and counters.
#[derive(Clone)]
pub struct QueueProcessor {
    queue: Arc<dyn JobQueue>,
    poll_timeout: Duration,
    shutdown_tx: Arc<watch::Sender<bool>>,
    counters: Arc<Counters>,
}

impl QueueProcessor {
    /// `poll_timeout` bounds how long a dequeue blocks, and therefore how
    /// quickly [`shutdown`](Self::shutdown) is noticed.
    pub fn new(queue: Arc<dyn JobQueue>, poll_timeout: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            queue,
            poll_timeout,
            shutdown_tx: Arc::new(shutdown_tx),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Process jobs from `category` until shutdown, then wait for in-flight
    /// jobs to finish.
    pub async fn process<H, Fut, E>(
        &self,
        category: &str,
        concurrency: usize,
        handler: H,
    ) -> Result<()>
    where
        H: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        if concurrency == 0 {
            return Err(AppError::Config("concurrency must be at least 1".to_string()));
        }

        tracing::info!(category, concurrency, "Processing queue");

        let handler = Arc::new(handler);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut tasks = JoinSet::new();

        loop {
            while let Some(finished) = tasks.try_join_next() {
                if let Err(e) = finished {
                    tracing::error!(error = %e, "Job task aborted");
                }
            }

            if *shutdown_rx.borrow_and_update() {
                break;
            }

            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => permit
                    .map_err(|_| AppError::Internal("job semaphore closed".to_string()))?,
                _ = shutdown_rx.changed() => break,
            };

            // Not raced against shutdown: dropping a dequeue mid-flight could
            // strand a job that was already moved to the active list.
            let job = match self.queue.dequeue(category, self.poll_timeout).await {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(category, error = %e, "Dequeue failed");
                    drop(permit);
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_timeout) => {}
                        _ = shutdown_rx.changed() => {}
                    }
                    continue;
                }
            };

            let queue = self.queue.clone();
            let handler = handler.clone();
            let counters = self.counters.clone();

            counters.active.fetch_add(1, Ordering::SeqCst);
            tasks.spawn(async move {
                run_job(queue, handler, &counters, job).await;
                counters.active.fetch_sub(1, Ordering::SeqCst);
                drop(permit);
            });
        }

        tracing::info!(category, in_flight = tasks.len(), "Draining in-flight jobs");
        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                tracing::error!(error = %e, "Job task aborted");
            }
        }

        tracing::info!(category, "Queue processing stopped");
        Ok(())
    }

    /// Stop dequeuing. In-flight jobs still run to completion.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn metrics(&self) -> ProcessorMetrics {
        ProcessorMetrics {
            active: self.counters.active.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }
}

/// Run one handler invocation and write its single terminal report.
async fn run_job<H, Fut, E>(
    queue: Arc<dyn JobQueue>,
    handler: Arc<H>,
    counters: &Counters,
    job: Job,
) where
    H: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let job_id = job.id;
    tracing::debug!(job_id = %job_id, category = %job.category, "Job started");

    let ctx = JobContext::new(job, queue.clone());

    // The handler is called inside the task too, so a panic while building
    // the future is caught the same way as a panic while polling it.
    let outcome = match tokio::spawn(async move { handler(ctx).await }).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("handler panicked: {}", e)),
    };

    let report = match &outcome {
        Ok(()) => {
            counters.completed.fetch_add(1, Ordering::SeqCst);
            tracing::info!(job_id = %job_id, "Job completed");
            queue.complete(job_id).await
        }
        Err(error) => {
            counters.failed.fetch_add(1, Ordering::SeqCst);
            tracing::warn!(job_id = %job_id, error = %error, "Job failed");
            queue.fail(job_id, error).await
        }
    };

    if let Err(e) = report {
        tracing::error!(job_id = %job_id, error = %e, "Failed to record job outcome");
    }
}

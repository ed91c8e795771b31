//! In-process job queue.
//!
//! Same contract as the Redis queue, plus an audit trail (every progress
//! report and every terminal report) so callers can check what a handler did.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use herald_common::error::{AppError, Result};
use herald_common::types::{Job, JobProgress, JobStatus};

use crate::queue::JobQueue;

#[derive(Default)]
struct MemoryState {
    waiting: HashMap<String, VecDeque<Uuid>>,
    jobs: HashMap<Uuid, Job>,
    progress_log: HashMap<Uuid, Vec<JobProgress>>,
    terminal_reports: HashMap<Uuid, usize>,
}

/// In-memory implementation of [`JobQueue`].
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<MemoryState>,
    available: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("memory queue lock poisoned".to_string()))
    }

    fn try_pop(&self, category: &str) -> Result<Option<Job>> {
        let mut state = self.lock()?;

        let Some(job_id) = state
            .waiting
            .get_mut(category)
            .and_then(|ids| ids.pop_front())
        else {
            return Ok(None);
        };

        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))?;
        job.status = JobStatus::Active;
        Ok(Some(job.clone()))
    }

    fn finish(&self, job_id: Uuid, status: JobStatus, error: Option<&str>) -> Result<()> {
        let mut state = self.lock()?;

        *state.terminal_reports.entry(job_id).or_default() += 1;

        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))?;

        if job.status.is_terminal() {
            return Err(AppError::Internal(format!(
                "job {} already finished as {}",
                job_id, job.status
            )));
        }

        job.status = status;
        job.error = error.map(str::to_string);
        Ok(())
    }

    /// Every progress report recorded for a job, in order.
    pub fn progress_history(&self, job_id: Uuid) -> Vec<JobProgress> {
        self.lock()
            .map(|state| state.progress_log.get(&job_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// How many times `complete` or `fail` was called for a job.
    pub fn terminal_report_count(&self, job_id: Uuid) -> usize {
        self.lock()
            .map(|state| state.terminal_reports.get(&job_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of jobs still waiting on a category.
    pub fn waiting_count(&self, category: &str) -> usize {
        self.lock()
            .map(|state| state.waiting.get(category).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, category: &str, data: serde_json::Value) -> Result<Job> {
        let job = Job::new(category, data);
        {
            let mut state = self.lock()?;
            state
                .waiting
                .entry(category.to_string())
                .or_default()
                .push_back(job.id);
            state.jobs.insert(job.id, job.clone());
        }
        self.available.notify_one();

        tracing::debug!(job_id = %job.id, category, "Job enqueued");
        Ok(job)
    }

    async fn dequeue(&self, category: &str, timeout: Duration) -> Result<Option<Job>> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Register interest before checking so an enqueue in between is not missed.
            let notified = self.available.notified();

            if let Some(job) = self.try_pop(category)? {
                return Ok(Some(job));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn progress(&self, job_id: Uuid, current: u32, total: u32) -> Result<()> {
        let mut state = self.lock()?;
        let progress = JobProgress { current, total };

        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))?;
        job.progress = Some(progress);

        state.progress_log.entry(job_id).or_default().push(progress);
        Ok(())
    }

    async fn complete(&self, job_id: Uuid) -> Result<()> {
        self.finish(job_id, JobStatus::Complete, None)
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        self.finish(job_id, JobStatus::Failed, Some(error))
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.lock()?.jobs.get(&job_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fifo_per_category() {
        let queue = MemoryQueue::new();
        let first = queue.enqueue("sms", json!({ "n": 1 })).await.unwrap();
        let second = queue.enqueue("sms", json!({ "n": 2 })).await.unwrap();
        queue.enqueue("email", json!({ "n": 3 })).await.unwrap();

        let timeout = Duration::from_millis(10);
        let a = queue.dequeue("sms", timeout).await.unwrap().unwrap();
        let b = queue.dequeue("sms", timeout).await.unwrap().unwrap();
        assert_eq!(a.id, first.id);
        assert_eq!(b.id, second.id);
        assert_eq!(a.status, JobStatus::Active);
        assert_eq!(queue.waiting_count("email"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dequeue_times_out_when_empty() {
        let queue = MemoryQueue::new();
        let job = queue.dequeue("sms", Duration::from_secs(1)).await.unwrap();
        assert!(job.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dequeue_wakes_on_enqueue() {
        let queue = std::sync::Arc::new(MemoryQueue::new());

        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            producer.enqueue("sms", json!({})).await.unwrap();
        });

        let job = queue.dequeue("sms", Duration::from_secs(5)).await.unwrap();
        assert!(job.is_some());
    }

    #[tokio::test]
    async fn test_progress_is_recorded() {
        let queue = MemoryQueue::new();
        let job = queue.enqueue("sms", json!({})).await.unwrap();

        queue.progress(job.id, 1, 2).await.unwrap();

        let stored = queue.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.progress, Some(JobProgress { current: 1, total: 2 }));
        assert_eq!(queue.progress_history(job.id).len(), 1);
    }

    #[tokio::test]
    async fn test_second_terminal_report_is_rejected() {
        let queue = MemoryQueue::new();
        let job = queue.enqueue("sms", json!({})).await.unwrap();

        queue.fail(job.id, "nope").await.unwrap();
        assert!(queue.complete(job.id).await.is_err());

        let stored = queue.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("nope"));
        assert_eq!(queue.terminal_report_count(job.id), 2);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let queue = MemoryQueue::new();
        assert!(queue.complete(Uuid::new_v4()).await.is_err());
        assert!(queue.progress(Uuid::new_v4(), 0, 1).await.is_err());
        assert!(queue.get_job(Uuid::new_v4()).await.unwrap().is_none());
    }
}

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use herald_common::error::Result;
use herald_common::types::Job;

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Store a new job and make it available on `category`.
    async fn enqueue(&self, category: &str, data: serde_json::Value) -> Result<Job>;

    /// Take the next waiting job, blocking up to `timeout`.
    ///
    /// The job is marked active before it is returned. `None` means nothing
    /// arrived within the timeout.
    async fn dequeue(&self, category: &str, timeout: Duration) -> Result<Option<Job>>;

    /// Record handler progress for an active job.
    async fn progress(&self, job_id: Uuid, current: u32, total: u32) -> Result<()>;

    /// Mark a job as successfully finished.
    async fn complete(&self, job_id: Uuid) -> Result<()>;

    /// Mark a job as failed with a terminal error message.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// Look up a job by ID.
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>>;
}

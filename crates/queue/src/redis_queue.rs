//! Redis-backed job queue.
//!
//! Layout:
//! - `q:{category}:wait`   list of job IDs waiting to run (LPUSH / BRPOPLPUSH)
//! - `q:{category}:active` list of job IDs currently held by a worker
//! - `q:job:{id}`          hash with the job fields
//!
//! Dequeue uses `BRPOPLPUSH` so a job is never only in a worker's memory: it
//! moves atomically from the wait list to the active list and leaves the active
//! list only when a terminal status is written. Ids left behind by a crashed
//! worker are put back on the wait list by [`RedisQueue::recover`].

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use herald_common::error::{AppError, Result};
use herald_common::redis_pool::create_redis_pool;
use herald_common::types::{Job, JobProgress, JobStatus};

use crate::queue::JobQueue;

/// Redis implementation of [`JobQueue`].
#[derive(Clone)]
pub struct RedisQueue {
    /// Short commands (HSET, LPUSH, LREM, ...).
    redis: ConnectionManager,
    /// Blocking dequeue only, so a pending BRPOPLPUSH never delays progress writes.
    blocking: ConnectionManager,
}

impl RedisQueue {
    pub fn new(redis: ConnectionManager, blocking: ConnectionManager) -> Self {
        Self { redis, blocking }
    }

    /// Open both connections against `redis_url`.
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let redis = create_redis_pool(redis_url).await?;
        let blocking = create_redis_pool(redis_url).await?;
        Ok(Self::new(redis, blocking))
    }

    fn wait_key(category: &str) -> String {
        format!("q:{}:wait", category)
    }

    fn active_key(category: &str) -> String {
        format!("q:{}:active", category)
    }

    fn job_key(job_id: Uuid) -> String {
        format!("q:job:{}", job_id)
    }

    async fn category_of(&self, job_id: Uuid) -> Result<String> {
        let mut conn = self.redis.clone();
        let category: Option<String> = conn.hget(Self::job_key(job_id), "category").await?;
        category.ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))
    }

    /// Write a terminal status and release the job from the active list.
    /// A job that already has a terminal status is left untouched.
    async fn finish(&self, job_id: Uuid, status: JobStatus, error: Option<&str>) -> Result<()> {
        let category = self.category_of(job_id).await?;
        let mut conn = self.redis.clone();

        let mut invocation = FINISH_SCRIPT.key(Self::job_key(job_id));
        invocation
            .key(Self::active_key(&category))
            .arg(job_id.to_string())
            .arg(status.to_string());
        if let Some(error) = error {
            invocation.arg(error);
        }

        let code: i64 = invocation.invoke_async(&mut conn).await?;
        finish_result(job_id, code)
    }

    /// Fail a job that was popped but could not be handed to a worker, and
    /// release it from the active list.
    async fn reject(&self, category: &str, job_id: Uuid, reason: &str) -> Result<()> {
        let mut conn = self.redis.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.hset_multiple(
            Self::job_key(job_id),
            &[("status", JobStatus::Failed.to_string()), ("error", reason.to_string())],
        )
        .ignore();
        pipe.lrem(Self::active_key(category), 1, job_id.to_string())
            .ignore();
        let _: () = pipe.query_async(&mut conn).await?;

        tracing::warn!(job_id = %job_id, category, reason, "Dequeued job rejected");
        Ok(())
    }

    /// Load a popped job and mark it active. `None` if its hash is gone.
    async fn activate(&self, job_id: Uuid) -> Result<Option<Job>> {
        let mut conn = self.redis.clone();
        let fields: HashMap<String, String> = conn.hgetall(Self::job_key(job_id)).await?;

        let Some(mut job) = job_from_fields(job_id, fields)? else {
            return Ok(None);
        };

        let _: () = conn
            .hset(Self::job_key(job_id), "status", JobStatus::Active.to_string())
            .await?;
        job.status = JobStatus::Active;
        Ok(Some(job))
    }

    /// Move every job left in the active list back onto the wait list.
    ///
    /// Jobs stay in the active list while a worker holds them, so anything
    /// found there at startup was abandoned by a worker that died mid-job.
    /// Call this before any worker on `category` starts dequeuing.
    pub async fn recover(&self, category: &str) -> Result<usize> {
        let mut conn = self.redis.clone();
        let mut recovered = 0;

        loop {
            let moved: Option<String> = conn
                .rpoplpush(Self::active_key(category), Self::wait_key(category))
                .await?;
            let Some(raw_id) = moved else {
                break;
            };

            if let Ok(job_id) = Uuid::parse_str(&raw_id) {
                let exists: bool = conn.exists(Self::job_key(job_id)).await?;
                if exists {
                    let _: () = conn
                        .hset(Self::job_key(job_id), "status", JobStatus::Waiting.to_string())
                        .await?;
                }
            }
            recovered += 1;
        }

        if recovered > 0 {
            tracing::info!(category, recovered, "Requeued abandoned jobs");
        }
        Ok(recovered)
    }
}

/// Sets the terminal status only if the job exists and is not already
/// finished. Returns 1 when written, 0 when the job is missing, -1 when it
/// already has a terminal status.
static FINISH_SCRIPT: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
        local job_key = KEYS[1]
        local active_key = KEYS[2]
        local status = redis.call('HGET', job_key, 'status')
        if not status then
            return 0
        end
        if status == 'complete' or status == 'failed' then
            return -1
        end
        redis.call('HSET', job_key, 'status', ARGV[2])
        if ARGV[3] then
            redis.call('HSET', job_key, 'error', ARGV[3])
        end
        redis.call('LREM', active_key, 1, ARGV[1])
        return 1
        ",
    )
});

fn finish_result(job_id: Uuid, code: i64) -> Result<()> {
    match code {
        1 => Ok(()),
        0 => Err(AppError::NotFound(format!("job {}", job_id))),
        _ => Err(AppError::Internal(format!("job {} already finished", job_id))),
    }
}

/// Rebuild a job from its hash fields. An empty hash means the job is gone.
fn job_from_fields(job_id: Uuid, fields: HashMap<String, String>) -> Result<Option<Job>> {
    if fields.is_empty() {
        return Ok(None);
    }

    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| AppError::Internal(format!("job {} is missing field {}", job_id, name)))
    };

    let progress = match (fields.get("progress_current"), fields.get("progress_total")) {
        (Some(current), Some(total)) => Some(JobProgress {
            current: current
                .parse()
                .map_err(|_| AppError::Internal(format!("bad progress on job {}", job_id)))?,
            total: total
                .parse()
                .map_err(|_| AppError::Internal(format!("bad progress on job {}", job_id)))?,
        }),
        _ => None,
    };

    let created_at = DateTime::parse_from_rfc3339(field("created_at")?)
        .map_err(|e| AppError::Internal(format!("bad created_at on job {}: {}", job_id, e)))?
        .with_timezone(&Utc);

    Ok(Some(Job {
        id: job_id,
        category: field("category")?.clone(),
        data: serde_json::from_str(field("data")?)?,
        status: field("status")?.parse()?,
        progress,
        error: fields.get("error").cloned(),
        created_at,
    }))
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, category: &str, data: serde_json::Value) -> Result<Job> {
        let job = Job::new(category, data);
        let mut conn = self.redis.clone();

        let fields = [
            ("category", job.category.clone()),
            ("data", serde_json::to_string(&job.data)?),
            ("status", job.status.to_string()),
            ("created_at", job.created_at.to_rfc3339()),
        ];

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.hset_multiple(Self::job_key(job.id), &fields).ignore();
        pipe.lpush(Self::wait_key(category), job.id.to_string())
            .ignore();
        let _: () = pipe.query_async(&mut conn).await?;

        tracing::info!(job_id = %job.id, category, "Job enqueued");
        Ok(job)
    }

    async fn dequeue(&self, category: &str, timeout: Duration) -> Result<Option<Job>> {
        let mut blocking = self.blocking.clone();

        // BRPOPLPUSH treats 0 as "block forever"; never pass it.
        let timeout_secs = timeout.as_secs().max(1);
        let popped: Option<String> = redis::cmd("BRPOPLPUSH")
            .arg(Self::wait_key(category))
            .arg(Self::active_key(category))
            .arg(timeout_secs)
            .query_async(&mut blocking)
            .await?;

        let Some(raw_id) = popped else {
            return Ok(None);
        };

        let Ok(job_id) = Uuid::parse_str(&raw_id) else {
            tracing::warn!(raw_id = %raw_id, category, "Dequeued malformed job id, dropping");
            let mut conn = self.redis.clone();
            let _: () = conn.lrem(Self::active_key(category), 1, &raw_id).await?;
            return Ok(None);
        };

        match self.activate(job_id).await {
            Ok(Some(job)) => Ok(Some(job)),
            Ok(None) => {
                tracing::warn!(job_id = %job_id, category, "Dequeued job has no data, dropping");
                let mut conn = self.redis.clone();
                let _: () = conn
                    .lrem(Self::active_key(category), 1, job_id.to_string())
                    .await?;
                Ok(None)
            }
            // If the rejection fails too, the id stays in the active list
            // until the next `recover`.
            Err(e) => {
                self.reject(category, job_id, &e.to_string()).await?;
                Ok(None)
            }
        }
    }

    async fn progress(&self, job_id: Uuid, current: u32, total: u32) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: () = conn
            .hset_multiple(
                Self::job_key(job_id),
                &[("progress_current", current), ("progress_total", total)],
            )
            .await?;

        tracing::debug!(job_id = %job_id, current, total, "Job progress");
        Ok(())
    }

    async fn complete(&self, job_id: Uuid) -> Result<()> {
        self.finish(job_id, JobStatus::Complete, None).await
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        self.finish(job_id, JobStatus::Failed, Some(error)).await
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        let mut conn = self.redis.clone();
        let fields: HashMap<String, String> = conn.hgetall(Self::job_key(job_id)).await?;
        job_from_fields(job_id, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_fields() -> HashMap<String, String> {
        HashMap::from([
            ("category".to_string(), "push_notification_code_2".to_string()),
            (
                "data".to_string(),
                r#"{"phoneNumber":"5551234567","message":"Hello"}"#.to_string(),
            ),
            ("status".to_string(), "waiting".to_string()),
            ("created_at".to_string(), "2024-01-01T00:00:00+00:00".to_string()),
        ])
    }

    #[test]
    fn test_keys() {
        let id = Uuid::nil();
        assert_eq!(RedisQueue::wait_key("sms"), "q:sms:wait");
        assert_eq!(RedisQueue::active_key("sms"), "q:sms:active");
        assert_eq!(
            RedisQueue::job_key(id),
            "q:job:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_job_from_fields() {
        let id = Uuid::new_v4();
        let job = job_from_fields(id, base_fields()).unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.category, "push_notification_code_2");
        assert_eq!(job.data["phoneNumber"], "5551234567");
        assert_eq!(job.status, JobStatus::Waiting);
        assert_eq!(job.progress, None);
        assert_eq!(job.error, None);
    }

    #[test]
    fn test_job_from_fields_with_progress_and_error() {
        let mut fields = base_fields();
        fields.insert("status".to_string(), "failed".to_string());
        fields.insert("progress_current".to_string(), "1".to_string());
        fields.insert("progress_total".to_string(), "2".to_string());
        fields.insert("error".to_string(), "boom".to_string());

        let job = job_from_fields(Uuid::new_v4(), fields).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, Some(JobProgress { current: 1, total: 2 }));
        assert_eq!(job.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_empty_hash_is_missing_job() {
        assert!(job_from_fields(Uuid::new_v4(), HashMap::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_finish_result_codes() {
        let id = Uuid::new_v4();
        assert!(finish_result(id, 1).is_ok());
        assert!(matches!(finish_result(id, 0), Err(AppError::NotFound(_))));
        assert!(matches!(finish_result(id, -1), Err(AppError::Internal(_))));
    }

    #[test]
    fn test_corrupt_status_is_an_error() {
        let mut fields = base_fields();
        fields.insert("status".to_string(), "stuck".to_string());
        assert!(job_from_fields(Uuid::new_v4(), fields).is_err());
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let mut fields = base_fields();
        fields.remove("data");
        assert!(job_from_fields(Uuid::new_v4(), fields).is_err());
    }
}

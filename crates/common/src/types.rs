use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
    Complete,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "waiting"),
            JobStatus::Active => write!(f, "active"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = crate::error::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobStatus::Waiting),
            "active" => Ok(JobStatus::Active),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            other => Err(crate::error::AppError::Internal(format!(
                "unknown job status: {}",
                other
            ))),
        }
    }
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// Progress as last reported by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub current: u32,
    pub total: u32,
}

/// A unit of work on a named queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Queue category the job was enqueued on.
    pub category: String,
    /// Handler-specific JSON payload.
    pub data: serde_json::Value,
    pub status: JobStatus,
    pub progress: Option<JobProgress>,
    /// Terminal error message, set only for failed jobs.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(category: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            category: category.into(),
            data,
            status: JobStatus::Waiting,
            progress: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Deserialize the payload into a handler-specific type.
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> crate::error::Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Payload of a push notification job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub phone_number: String,
    pub message: String,
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Job-level lifecycle state. Stored as TEXT in Postgres; parsed at the
/// boundary rather than relying on a custom `sqlx::Type` mapping, matching
/// the teacher's convention of keeping persisted enums as plain strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    DownloadingData,
    Running,
    Completed,
    Partial,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::DownloadingData => "downloading_data",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Partial => "partial",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Partial | JobStatus::Failed)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::DownloadingData | JobStatus::Running)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "downloading_data" => Ok(JobStatus::DownloadingData),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "partial" => Ok(JobStatus::Partial),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Per (date, model) execution state within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobDetailStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl JobDetailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobDetailStatus::Pending => "pending",
            JobDetailStatus::Running => "running",
            JobDetailStatus::Completed => "completed",
            JobDetailStatus::Failed => "failed",
            JobDetailStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobDetailStatus::Completed | JobDetailStatus::Failed | JobDetailStatus::Skipped
        )
    }
}

impl std::str::FromStr for JobDetailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobDetailStatus::Pending),
            "running" => Ok(JobDetailStatus::Running),
            "completed" => Ok(JobDetailStatus::Completed),
            "failed" => Ok(JobDetailStatus::Failed),
            "skipped" => Ok(JobDetailStatus::Skipped),
            other => Err(format!("unknown job detail status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub models: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_duration_seconds: Option<f64>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl Job {
    pub fn status(&self) -> JobStatus {
        self.status.parse().expect("status column holds a valid JobStatus")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobDetail {
    pub id: i64,
    pub job_id: Uuid,
    pub date: NaiveDate,
    pub model: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub error: Option<String>,
}

impl JobDetail {
    pub fn status(&self) -> JobDetailStatus {
        self.status
            .parse()
            .expect("status column holds a valid JobDetailStatus")
    }
}

/// Aggregate progress summary for `GET /simulate/status/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub pending: i64,
    pub skipped: i64,
    pub current_running: Option<(NaiveDate, String)>,
    pub details: Vec<JobDetail>,
}

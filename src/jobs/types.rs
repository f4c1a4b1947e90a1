use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque job identifier, also the base name of the job's result files
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job lifecycle: `queued -> processing -> done | failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Whether a job may move from `self` to `next`; status never regresses
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Done)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one job as reported by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    pub filter: String,
    /// Public path of the result video once done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn queued(job_id: JobId, filter: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobStatus::Queued,
            filter: filter.into(),
            result: None,
            thumbnail: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A status change applied by the job's worker
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Processing,
    Done {
        result: String,
        thumbnail: Option<String>,
    },
    Failed {
        error: String,
    },
}

impl JobUpdate {
    pub fn status(&self) -> JobStatus {
        match self {
            JobUpdate::Processing => JobStatus::Processing,
            JobUpdate::Done { .. } => JobStatus::Done,
            JobUpdate::Failed { .. } => JobStatus::Failed,
        }
    }

    /// Apply to a record; the caller has already checked the transition
    pub fn apply(self, record: &mut JobRecord) {
        record.status = self.status();
        match self {
            JobUpdate::Processing => {}
            JobUpdate::Done { result, thumbnail } => {
                record.result = Some(result);
                record.thumbnail = thumbnail;
            }
            JobUpdate::Failed { error } => record.error = Some(error),
        }
        record.updated_at = Utc::now();
    }
}

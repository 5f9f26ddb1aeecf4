//! The unit of work submitted to the pipeline.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of work a job describes.
///
/// Informational only: the pipeline runs the same three stages either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Bug,
    FeatureTest,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Bug => write!(f, "Bug"),
            JobKind::FeatureTest => write!(f, "Feature Test"),
        }
    }
}

/// Lifecycle status of a job.
///
/// Transitions are forward-only: ENQUEUED → RUNNING → {COMPLETED, FAILED}.
/// COMPLETED and FAILED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Enqueued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Enqueued => write!(f, "ENQUEUED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// A unit of debugging work.
///
/// Created by the producer with status ENQUEUED. Once submitted, the job is
/// owned exclusively by the worker; only the engine mutates `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Root of the project to debug. Must exist at submission time.
    pub project_root: PathBuf,
    pub kind: JobKind,
    /// Free-text problem statement fed into the analysis stage.
    pub description: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        project_root: impl Into<PathBuf>,
        kind: JobKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_root: project_root.into(),
            kind,
            description: description.into(),
            status: JobStatus::Enqueued,
            created_at: Utc::now(),
        }
    }

    /// First 8 hex characters of the id, used to prefix event payloads.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

//! Progress notifications delivered from the worker to an observer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::JobStatus;

/// One of the three fixed pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analyze,
    GenerateTests,
    Fix,
}

impl Stage {
    /// 1-based position in the pipeline, used in artifact names and payloads.
    pub fn number(self) -> u8 {
        match self {
            Stage::Analyze => 1,
            Stage::GenerateTests => 2,
            Stage::Fix => 3,
        }
    }
}

/// Category of a progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Job accepted onto the intake queue.
    Enqueued,
    /// Job status changed.
    Status(JobStatus),
    /// A stage started.
    Step(Stage),
    /// A stage finished with its expected outcome.
    StepComplete(Stage),
    /// A stage finished degraded but the job continues.
    Warning(Stage),
    /// A fix attempt is about to run.
    Attempt { attempt: u32, max_attempts: u32 },
    /// The job reached COMPLETED.
    Completed,
    /// The job reached FAILED without an execution error (attempts
    /// exhausted, or the worker was stopped mid-job).
    Failed,
    /// The job reached FAILED because a stage raised an error.
    Error,
}

/// An immutable progress notification.
///
/// Never mutated after creation; the observer sees events in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// The job this event refers to.
    pub job_id: Uuid,
    /// Human-readable description of the transition.
    pub payload: String,
}

impl Event {
    pub fn new(kind: EventKind, job_id: Uuid, payload: impl Into<String>) -> Self {
        Self {
            kind,
            job_id,
            payload: payload.into(),
        }
    }
}

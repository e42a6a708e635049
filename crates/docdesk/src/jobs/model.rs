use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::Tool;

/// Per-file result. A file either produced records or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub filename: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success {
        records: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Error {
        error: String,
    },
}

impl FileOutcome {
    pub fn success(filename: impl Into<String>, records: usize, detail: Option<String>) -> Self {
        Self {
            filename: filename.into(),
            outcome: Outcome::Success { records, detail },
        }
    }

    pub fn error(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            outcome: Outcome::Error {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }
}

/// Aggregate of a finished batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total: usize,
    #[serde(rename = "success")]
    pub succeeded_count: usize,
    #[serde(rename = "errors")]
    pub failed_count: usize,
    pub results: Vec<FileOutcome>,
}

impl BatchResult {
    /// Builds the aggregate from outcomes kept in submission order.
    pub fn from_outcomes(results: Vec<FileOutcome>) -> Self {
        let succeeded_count = results.iter().filter(|r| r.is_success()).count();
        Self {
            total: results.len(),
            succeeded_count,
            failed_count: results.len() - succeeded_count,
            results,
        }
    }

    pub fn summary(&self) -> String {
        if self.failed_count == 0 {
            format!("Completed: {} file(s) processed", self.succeeded_count)
        } else {
            format!(
                "Completed with warnings: {} OK, {} error(s)",
                self.succeeded_count, self.failed_count
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Running { progress: u8 },
    Succeeded { result: BatchResult },
    Failed { error: String },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded { .. } | JobState::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running { .. } => "running",
            JobState::Succeeded { .. } => "succeeded",
            JobState::Failed { .. } => "failed",
        }
    }

    pub fn progress(&self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Running { progress } => *progress,
            JobState::Succeeded { .. } => 100,
            JobState::Failed { .. } => 0,
        }
    }
}

/// Point-in-time copy of a job, safe to hand to readers.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub id: String,
    pub tool: Tool,
    pub state: JobState,
    pub message: String,
    pub total_files: usize,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireState {
    Pending,
    Progress,
    Success,
    Failure,
}

impl WireState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WireState::Success | WireState::Failure)
    }
}

/// Status payload returned by `GET /api/<tool>/status/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub job_id: String,
    pub state: WireState,
    pub progress: u8,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<BatchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&JobSnapshot> for StatusResponse {
    fn from(snapshot: &JobSnapshot) -> Self {
        let (state, results, error) = match &snapshot.state {
            JobState::Pending => (WireState::Pending, None, None),
            JobState::Running { .. } => (WireState::Progress, None, None),
            JobState::Succeeded { result } => (WireState::Success, Some(result.clone()), None),
            JobState::Failed { error } => (WireState::Failure, None, Some(error.clone())),
        };

        Self {
            job_id: snapshot.id.clone(),
            state,
            progress: snapshot.state.progress(),
            status: snapshot.message.clone(),
            results,
            error,
        }
    }
}

/// Body returned by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub job_id: String,
    pub message: String,
    pub files_count: usize,
}

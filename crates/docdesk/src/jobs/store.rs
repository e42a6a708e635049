//! In-memory job store.
//!
//! The store maps job ids to per-job cells. Each cell carries its own locks, so
//! polling one job never blocks the worker writing another. Exactly one
//! [`JobHandle`] exists per job; it is the only way to mutate that job.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::JobError;
use crate::jobs::model::{BatchResult, JobSnapshot, JobState};
use crate::tool::Tool;

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: &str, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            level: level.to_string(),
            message: message.to_string(),
        }
    }
}

struct JobRecord {
    state: JobState,
    message: String,
    finished_at: Option<DateTime<Utc>>,
    archive_path: Option<PathBuf>,
}

struct JobCell {
    id: String,
    tool: Tool,
    total_files: usize,
    submitted_at: DateTime<Utc>,
    record: RwLock<JobRecord>,
    log: Mutex<Vec<LogEvent>>,
}

impl JobCell {
    fn read(&self) -> RwLockReadGuard<'_, JobRecord> {
        self.record.read().unwrap_or_else(|poisoned| {
            log::warn!("Job {} record lock poisoned, recovering", self.id);
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, JobRecord> {
        self.record.write().unwrap_or_else(|poisoned| {
            log::warn!("Job {} record lock poisoned, recovering", self.id);
            poisoned.into_inner()
        })
    }

    fn log(&self) -> MutexGuard<'_, Vec<LogEvent>> {
        self.log.lock().unwrap_or_else(|poisoned| {
            log::warn!("Job {} log lock poisoned, recovering", self.id);
            poisoned.into_inner()
        })
    }

    fn snapshot(&self) -> JobSnapshot {
        let record = self.read();
        JobSnapshot {
            id: self.id.clone(),
            tool: self.tool,
            state: record.state.clone(),
            message: record.message.clone(),
            total_files: self.total_files,
            submitted_at: self.submitted_at,
            finished_at: record.finished_at,
        }
    }

    fn render_log(&self) -> String {
        let snapshot = self.snapshot();
        self.render(
            snapshot.state.name(),
            &snapshot.message,
            snapshot.finished_at,
            None,
        )
    }

    fn render(
        &self,
        state: &str,
        message: &str,
        finished_at: Option<DateTime<Utc>>,
        closing: Option<&LogEvent>,
    ) -> String {
        let mut text = String::new();

        let _ = writeln!(text, "Job ID: {}", self.id);
        let _ = writeln!(text, "Tool: {}", self.tool.display_name());
        let _ = writeln!(text, "Files: {}", self.total_files);
        let _ = writeln!(text, "Submitted: {}", self.submitted_at.to_rfc3339());
        if let Some(finished) = finished_at {
            let _ = writeln!(text, "Finished: {}", finished.to_rfc3339());
        }
        let _ = writeln!(text, "State: {}", state);
        let _ = writeln!(text, "Message: {}", message);
        text.push('\n');

        for event in self.log().iter().chain(closing) {
            let _ = writeln!(
                text,
                "{} [{}] {}",
                event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                event.level,
                event.message
            );
        }

        text
    }
}

#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Arc<JobCell>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pending job and returns its single writer.
    pub fn create(&self, tool: Tool, total_files: usize) -> JobHandle {
        let id = uuid::Uuid::new_v4().to_string();
        let cell = Arc::new(JobCell {
            id: id.clone(),
            tool,
            total_files,
            submitted_at: Utc::now(),
            record: RwLock::new(JobRecord {
                state: JobState::Pending,
                message: "Queued for processing".to_string(),
                finished_at: None,
                archive_path: None,
            }),
            log: Mutex::new(Vec::new()),
        });

        self.jobs
            .write()
            .unwrap_or_else(|poisoned| {
                log::warn!("Job map lock poisoned, recovering");
                poisoned.into_inner()
            })
            .insert(id, Arc::clone(&cell));

        let handle = JobHandle { cell };
        handle.log(
            "INFO",
            &format!("Job created with {} file(s)", total_files),
        );
        handle
    }

    fn cell(&self, tool: Tool, job_id: &str) -> Result<Arc<JobCell>, JobError> {
        let jobs = self.jobs.read().unwrap_or_else(|poisoned| {
            log::warn!("Job map lock poisoned, recovering");
            poisoned.into_inner()
        });

        jobs.get(job_id)
            .filter(|cell| cell.tool == tool)
            .cloned()
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    pub fn snapshot(&self, tool: Tool, job_id: &str) -> Result<JobSnapshot, JobError> {
        Ok(self.cell(tool, job_id)?.snapshot())
    }

    /// Full log text with a header describing the job. Available in any state.
    pub fn log_text(&self, tool: Tool, job_id: &str) -> Result<String, JobError> {
        Ok(self.cell(tool, job_id)?.render_log())
    }

    /// Path of the sealed archive. `NotReady` unless the job succeeded.
    pub fn archive_path(&self, tool: Tool, job_id: &str) -> Result<PathBuf, JobError> {
        let cell = self.cell(tool, job_id)?;
        let record = cell.read();

        match (&record.state, &record.archive_path) {
            (JobState::Succeeded { .. }, Some(path)) => Ok(path.clone()),
            (state, _) => Err(JobError::NotReady {
                job_id: job_id.to_string(),
                state: state.name(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.read().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of jobs per state name.
    pub fn counts(&self) -> HashMap<&'static str, usize> {
        let cells: Vec<Arc<JobCell>> = match self.jobs.read() {
            Ok(jobs) => jobs.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        };

        let mut counts = HashMap::new();
        for cell in cells {
            *counts.entry(cell.read().state.name()).or_insert(0) += 1;
        }
        counts
    }
}

/// Sole writer of one job. Not cloneable.
pub struct JobHandle {
    cell: Arc<JobCell>,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.cell.id
    }

    pub fn tool(&self) -> Tool {
        self.cell.tool
    }

    pub fn total_files(&self) -> usize {
        self.cell.total_files
    }

    pub fn log(&self, level: &str, message: &str) {
        tracing::debug!(job_id = %self.cell.id, log_level = level, "{}", message);
        self.cell.log().push(LogEvent::new(level, message));
    }

    pub fn start(&self, message: &str) {
        self.transition(JobState::Running { progress: 0 }, message);
    }

    pub fn progress(&self, progress: u8, message: &str) {
        self.transition(
            JobState::Running {
                progress: progress.min(100),
            },
            message,
        );
    }

    pub fn succeed(&self, result: BatchResult, archive_path: PathBuf) {
        let message = result.summary();
        {
            let mut record = self.cell.write();
            if record.state.is_terminal() {
                drop(record);
                self.ignore_terminal("succeed");
                return;
            }
            record.state = JobState::Succeeded { result };
            record.message = message.clone();
            record.finished_at = Some(Utc::now());
            record.archive_path = Some(archive_path);
        }
        self.log("INFO", &message);
    }

    pub fn fail(&self, error: &str) {
        {
            let mut record = self.cell.write();
            if record.state.is_terminal() {
                drop(record);
                self.ignore_terminal("fail");
                return;
            }
            record.state = JobState::Failed {
                error: error.to_string(),
            };
            record.message = format!("Failed: {}", error);
            record.finished_at = Some(Utc::now());
        }
        self.log("ERROR", error);
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.cell.snapshot()
    }

    pub fn render_log(&self) -> String {
        self.cell.render_log()
    }

    /// The log as it reads once the job succeeds with `result`. This is the
    /// copy sealed into the archive, written before the transition happens.
    pub fn render_final_log(&self, result: &BatchResult) -> String {
        let closing = LogEvent::new("INFO", &result.summary());
        self.cell.render(
            "succeeded",
            &closing.message,
            Some(closing.timestamp),
            Some(&closing),
        )
    }

    fn transition(&self, state: JobState, message: &str) {
        let mut record = self.cell.write();
        if record.state.is_terminal() {
            drop(record);
            self.ignore_terminal(state.name());
            return;
        }
        record.state = state;
        record.message = message.to_string();
    }

    fn ignore_terminal(&self, attempted: &str) {
        log::warn!(
            "Ignoring '{}' on job {}: job is already terminal",
            attempted,
            self.cell.id
        );
    }
}

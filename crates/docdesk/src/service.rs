//! Entry point shared by the HTTP layer and tests: validation, submission,
//! status, download and log retrieval for every tool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{Config, ToolLimits};
use crate::error::{Result, StorageError, WorkerError};
use crate::extract::ExtractorRegistry;
use crate::jobs::{JobSnapshot, JobStore};
use crate::tool::Tool;
use crate::validate::{FileValidator, ValidatedBatch};
use crate::worker::{BatchJob, BatchRunner, WorkerPool};

/// A sealed result archive ready to send.
#[derive(Debug, Clone)]
pub struct Archive {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub struct Service {
    config: Arc<Config>,
    store: Arc<JobStore>,
    pool: Mutex<Option<WorkerPool>>,
}

impl Service {
    /// Starts the worker pool with the default extractors.
    pub fn start(config: Arc<Config>) -> Result<Self> {
        let registry = ExtractorRegistry::new(&config.ocr);
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: Arc<Config>, registry: ExtractorRegistry) -> Result<Self> {
        let runner = Arc::new(BatchRunner::new(
            Arc::new(registry),
            config.output_directory.clone(),
        ));
        let pool = WorkerPool::new(runner, config.worker_count)?;

        log::info!(
            "Service ready: {} worker(s), output in {}",
            pool.worker_count(),
            config.output_directory
        );

        Ok(Self {
            config,
            store: Arc::new(JobStore::new()),
            pool: Mutex::new(Some(pool)),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn limits(&self, tool: Tool) -> &ToolLimits {
        self.config.tools.limits(tool)
    }

    pub fn validator(&self, tool: Tool) -> FileValidator<'_> {
        FileValidator::new(tool, self.limits(tool))
    }

    /// Registers a pending job for the batch and queues it. Returns the job id
    /// without waiting for any extraction.
    pub fn submit(&self, batch: ValidatedBatch) -> Result<String> {
        let pool = self.pool();
        let Some(pool) = pool.as_ref().filter(|p| !p.is_shutdown()) else {
            return Err(WorkerError::ChannelClosed.into());
        };

        let tool = batch.tool();
        let handle = self.store.create(tool, batch.len());
        let job_id = handle.id().to_string();

        tracing::info!(job_id = %job_id, tool = %tool, files = batch.len(), "Job submitted");

        pool.submit(BatchJob {
            handle,
            files: batch.into_files(),
        })?;

        Ok(job_id)
    }

    pub fn status(&self, tool: Tool, job_id: &str) -> Result<JobSnapshot> {
        Ok(self.store.snapshot(tool, job_id)?)
    }

    /// Bytes of the sealed archive. `NotReady` until the job has succeeded.
    pub fn package(&self, tool: Tool, job_id: &str) -> Result<Archive> {
        let path = self.store.archive_path(tool, job_id)?;
        let bytes = std::fs::read(&path).map_err(|e| StorageError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        Ok(Archive {
            filename: tool.archive_name(),
            bytes,
        })
    }

    pub fn log(&self, tool: Tool, job_id: &str) -> Result<String> {
        Ok(self.store.log_text(tool, job_id)?)
    }

    pub fn job_counts(&self) -> HashMap<&'static str, usize> {
        self.store.counts()
    }

    /// Batches queued but not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.pool().as_ref().map(WorkerPool::queued).unwrap_or(0)
    }

    /// Stops accepting work and joins the workers. In-flight batches finish
    /// first; queued ones are abandoned.
    pub fn shutdown(&self) {
        let pool = self.pool().take();
        if let Some(pool) = pool {
            pool.shutdown();
            pool.wait();
        }
    }

    fn pool(&self) -> MutexGuard<'_, Option<WorkerPool>> {
        self.pool.lock().unwrap_or_else(|poisoned| {
            log::warn!("Worker pool lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

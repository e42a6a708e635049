//! Isolated service instance for integration tests.
//!
//! Each `TestHarness` owns a temp output directory and a running `Service`;
//! dropping it shuts the worker pool down.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use zip::ZipArchive;

use docdesk::config::Config;
use docdesk::jobs::JobSnapshot;
use docdesk::{Service, SourceFile, Tool};

use super::builders::ConfigBuilder;

pub struct TestHarness {
    temp_dir: TempDir,
    pub service: Service,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(|builder| builder)
    }

    pub fn with_config(configure: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config: Config = configure(ConfigBuilder::new(temp_dir.path())).build();
        let service = Service::start(Arc::new(config)).expect("Failed to start service");

        Self { temp_dir, service }
    }

    pub fn output_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Validates and submits, panicking on validation errors.
    pub fn submit(&self, tool: Tool, files: Vec<(&str, Vec<u8>)>) -> String {
        let files = files
            .into_iter()
            .map(|(name, bytes)| SourceFile::new(name, None, bytes))
            .collect();
        let batch = self
            .service
            .validator(tool)
            .accept(files)
            .expect("Batch should pass validation");
        self.service.submit(batch).expect("Failed to submit batch")
    }

    /// Polls the store until the job is terminal or ten seconds pass.
    pub fn wait(&self, tool: Tool, job_id: &str) -> JobSnapshot {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let snapshot = self
                .service
                .status(tool, job_id)
                .expect("Job should exist");
            if snapshot.state.is_terminal() {
                return snapshot;
            }
            assert!(
                Instant::now() < deadline,
                "Job {} did not finish: {:?}",
                job_id,
                snapshot.state
            );
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    /// Sorted entry names of the job's downloadable archive.
    pub fn archive_entries(&self, tool: Tool, job_id: &str) -> Vec<String> {
        let archive = self
            .service
            .package(tool, job_id)
            .expect("Archive should be ready");
        let zip = ZipArchive::new(Cursor::new(archive.bytes)).expect("Archive should be a ZIP");
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        names
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.service.shutdown();
    }
}

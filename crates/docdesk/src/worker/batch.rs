use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info_span;

use crate::error::FatalJobError;
use crate::extract::{Extraction, Extractor, ExtractorRegistry};
use crate::jobs::{BatchResult, FileOutcome, JobHandle};
use crate::package::{FileStorage, JobOutput};
use crate::validate::SourceFile;

/// A validated batch waiting for a worker, together with the only writer of its job.
pub struct BatchJob {
    pub handle: JobHandle,
    pub files: Vec<SourceFile>,
}

/// Runs one batch to a terminal state: extraction file by file, then packaging.
pub struct BatchRunner {
    registry: Arc<ExtractorRegistry>,
    storage: FileStorage,
}

impl BatchRunner {
    pub fn new(registry: Arc<ExtractorRegistry>, output_directory: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            storage: FileStorage::new(output_directory.into()),
        }
    }

    /// Never returns with the job still running: it ends `Succeeded` or `Failed`.
    pub fn run(&self, job: BatchJob) {
        let BatchJob { handle, files } = job;
        let _span = info_span!("batch",
            job_id = %handle.id(),
            tool = %handle.tool(),
            files = files.len(),
        )
        .entered();

        handle.start(&format!("Processing {} file(s)", files.len()));

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(&handle, &files)))
            .unwrap_or_else(|payload| Err(FatalJobError::Panicked(panic_message(&*payload))));

        match outcome {
            Ok((result, archive_path)) => {
                tracing::info!(
                    success = result.succeeded_count,
                    errors = result.failed_count,
                    "Batch finished"
                );
                handle.succeed(result, archive_path);
            }
            Err(e) => {
                tracing::error!("Batch failed: {}", e);
                handle.fail(&e.to_string());
            }
        }
    }

    fn process(
        &self,
        handle: &JobHandle,
        files: &[SourceFile],
    ) -> Result<(BatchResult, PathBuf), FatalJobError> {
        let tool = handle.tool();
        let extractor = self
            .registry
            .for_tool(tool)
            .ok_or(FatalJobError::NoExtractor(tool))?;

        let mut output = self.storage.open_job(handle.id(), tool)?;
        let total = files.len().max(1);
        let mut outcomes = Vec::with_capacity(files.len());
        let mut extractions: Vec<Extraction> = Vec::new();

        for (index, file) in files.iter().enumerate() {
            let outcome = match extract_file(extractor, file) {
                Ok(extraction) => match output.add_sheet(&file.filename, &extraction.sheet) {
                    Ok(artifact) => {
                        handle.log(
                            "INFO",
                            &format!(
                                "{}: {} record(s) -> {}{}",
                                file.filename,
                                extraction.records,
                                artifact,
                                extraction
                                    .detail
                                    .as_deref()
                                    .map(|d| format!(" [{}]", d))
                                    .unwrap_or_default()
                            ),
                        );
                        let outcome = FileOutcome::success(
                            file.filename.as_str(),
                            extraction.records,
                            extraction.detail.clone(),
                        );
                        extractions.push(extraction);
                        outcome
                    }
                    Err(e) => {
                        let message = format!("could not write result: {}", e);
                        tracing::error!(filename = %file.filename, "{}", message);
                        handle.log("ERROR", &format!("{}: {}", file.filename, message));
                        FileOutcome::error(file.filename.as_str(), message)
                    }
                },
                Err(message) => {
                    handle.log("ERROR", &format!("{}: {}", file.filename, message));
                    FileOutcome::error(file.filename.as_str(), message)
                }
            };
            outcomes.push(outcome);

            let processed = index + 1;
            handle.progress(
                (processed * 100 / total) as u8,
                &format!("Processed {}/{}: {}", processed, files.len(), file.filename),
            );
        }

        consolidate(extractor, &extractions, &mut output, handle);

        let result = BatchResult::from_outcomes(outcomes);
        handle.log(
            "INFO",
            &format!("Sealing archive with {} artifact(s)", output.artifacts().len()),
        );
        let archive_path = output.seal(&handle.render_final_log(&result))?;

        Ok((result, archive_path))
    }
}

/// Extraction of one file; errors and panics become the file's error message.
fn extract_file(extractor: &dyn Extractor, file: &SourceFile) -> Result<Extraction, String> {
    let _span = info_span!("extract", filename = %file.filename).entered();

    match panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(file))) {
        Ok(Ok(extraction)) => Ok(extraction),
        Ok(Err(e)) => {
            tracing::warn!("Extraction failed: {}", e);
            Err(e.to_string())
        }
        Err(payload) => {
            let message = panic_message(&*payload);
            tracing::error!("Extractor panicked: {}", message);
            Err(format!("internal error while extracting: {}", message))
        }
    }
}

/// A consolidated workbook that cannot be written is logged and left out;
/// the per-file artifacts still ship.
fn consolidate(
    extractor: &dyn Extractor,
    extractions: &[Extraction],
    output: &mut JobOutput,
    handle: &JobHandle,
) {
    if extractions.is_empty() {
        handle.log("WARN", "No file produced records; nothing to consolidate");
        return;
    }

    let refs: Vec<&Extraction> = extractions.iter().collect();
    let Some(sheet) = extractor.consolidate(&refs) else {
        return;
    };

    match output.add_consolidated(&sheet) {
        Ok(()) => handle.log(
            "INFO",
            &format!("Consolidated {} row(s) from {} file(s)", sheet.len(), refs.len()),
        ),
        Err(e) => {
            tracing::error!("Consolidated workbook not written: {}", e);
            handle.log("ERROR", &format!("Consolidated workbook not written: {}", e));
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::jobs::{JobState, JobStore, Outcome};
    use crate::sheet::{Cell, Sheet};
    use crate::tool::Tool;
    use tempfile::TempDir;

    /// One row for content starting with `ok`, a panic on `boom`, an error otherwise.
    struct ScriptedExtractor;

    impl Extractor for ScriptedExtractor {
        fn tool(&self) -> Tool {
            Tool::BankStatements
        }

        fn extract(&self, file: &SourceFile) -> Result<Extraction, ExtractionError> {
            if file.bytes.starts_with(b"boom") {
                panic!("parser exploded");
            }
            if !file.bytes.starts_with(b"ok") {
                return Err(ExtractionError::PdfProcessing("not a statement".to_string()));
            }
            let mut sheet = Sheet::new("S", vec!["archivo"]);
            sheet.push_row(vec![Cell::text(file.filename.as_str())]);
            Ok(Extraction::new(sheet, None))
        }

        fn consolidate(&self, extractions: &[&Extraction]) -> Option<Sheet> {
            let mut sheet = Sheet::new("C", vec!["archivo"]);
            for e in extractions {
                for row in &e.sheet.rows {
                    sheet.push_row(row.clone());
                }
            }
            Some(sheet)
        }
    }

    fn runner(output: &std::path::Path) -> BatchRunner {
        let mut registry = ExtractorRegistry::empty();
        registry.register(Box::new(ScriptedExtractor));
        BatchRunner::new(Arc::new(registry), output)
    }

    fn file(name: &str, content: &[u8]) -> SourceFile {
        SourceFile::new(name, None, content.to_vec())
    }

    #[test]
    fn test_partial_failure_still_succeeds() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new();
        let handle = store.create(Tool::BankStatements, 3);
        let id = handle.id().to_string();

        runner(temp.path()).run(BatchJob {
            handle,
            files: vec![
                file("good.pdf", b"ok 1"),
                file("corrupt.pdf", b"garbage"),
                file("boom.pdf", b"boom"),
            ],
        });

        let snapshot = store.snapshot(Tool::BankStatements, &id).unwrap();
        let JobState::Succeeded { result } = &snapshot.state else {
            panic!("Expected Succeeded, got {:?}", snapshot.state);
        };

        assert_eq!(result.total, 3);
        assert_eq!(result.succeeded_count, 1);
        assert_eq!(result.failed_count, 2);

        let names: Vec<&str> = result.results.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["good.pdf", "corrupt.pdf", "boom.pdf"]);
        assert!(matches!(
            &result.results[2].outcome,
            Outcome::Error { error } if error.contains("parser exploded")
        ));

        let archive = store.archive_path(Tool::BankStatements, &id).unwrap();
        assert!(archive.ends_with(format!("{}/bank-statements_result.zip", id)));
        assert!(temp.path().join(&id).join("good.xlsx").exists());
        assert!(temp.path().join(&id).join("00_CONSOLIDADO.xlsx").exists());
    }

    #[test]
    fn test_log_records_every_file() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new();
        let handle = store.create(Tool::BankStatements, 2);
        let id = handle.id().to_string();

        runner(temp.path()).run(BatchJob {
            handle,
            files: vec![file("a.pdf", b"ok"), file("b.pdf", b"nope")],
        });

        let log = store.log_text(Tool::BankStatements, &id).unwrap();
        assert!(log.contains("a.pdf: 1 record(s) -> a.xlsx"), "log: {}", log);
        assert!(
            log.contains("[ERROR] b.pdf: Failed to process PDF: not a statement"),
            "log: {}",
            log
        );
        assert!(log.contains("Processed 2/2: b.pdf"), "log: {}", log);

        let archived =
            std::fs::read_to_string(temp.path().join(&id).join("bank-statements_log.txt"))
                .unwrap();
        assert!(archived.contains("a.pdf: 1 record(s)"));
    }

    #[test]
    fn test_archived_log_carries_final_state() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new();
        let handle = store.create(Tool::BankStatements, 1);
        let id = handle.id().to_string();

        runner(temp.path()).run(BatchJob {
            handle,
            files: vec![file("a.pdf", b"ok")],
        });

        let archived =
            std::fs::read_to_string(temp.path().join(&id).join("bank-statements_log.txt"))
                .unwrap();
        assert!(archived.contains("State: succeeded"), "log: {}", archived);
        assert!(archived.contains("Finished: "), "log: {}", archived);
        assert!(archived.contains("Message: Completed: 1 file(s) processed"));
        assert!(!archived.contains("State: running"));
    }

    #[test]
    fn test_unwritable_artifact_becomes_file_error() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new();
        let handle = store.create(Tool::BankStatements, 2);
        let id = handle.id().to_string();
        std::fs::create_dir_all(temp.path().join(&id).join("first.xlsx")).unwrap();

        runner(temp.path()).run(BatchJob {
            handle,
            files: vec![file("first.pdf", b"ok"), file("second.pdf", b"ok")],
        });

        let snapshot = store.snapshot(Tool::BankStatements, &id).unwrap();
        let JobState::Succeeded { result } = &snapshot.state else {
            panic!("Expected Succeeded, got {:?}", snapshot.state);
        };
        assert_eq!(result.succeeded_count, 1);
        assert_eq!(result.failed_count, 1);
        assert!(matches!(
            &result.results[0].outcome,
            Outcome::Error { error } if error.starts_with("could not write result")
        ));
        assert!(temp.path().join(&id).join("second.xlsx").exists());
        assert!(temp.path().join(&id).join("00_CONSOLIDADO.xlsx").exists());
    }

    #[test]
    fn test_unwritable_consolidated_workbook_keeps_job() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new();
        let handle = store.create(Tool::BankStatements, 1);
        let id = handle.id().to_string();
        std::fs::create_dir_all(temp.path().join(&id).join("00_CONSOLIDADO.xlsx")).unwrap();

        runner(temp.path()).run(BatchJob {
            handle,
            files: vec![file("a.pdf", b"ok")],
        });

        let snapshot = store.snapshot(Tool::BankStatements, &id).unwrap();
        assert!(matches!(snapshot.state, JobState::Succeeded { .. }));
        let log = store.log_text(Tool::BankStatements, &id).unwrap();
        assert!(log.contains("[ERROR] Consolidated workbook not written"), "log: {}", log);
        assert!(store.archive_path(Tool::BankStatements, &id).is_ok());
    }

    #[test]
    fn test_all_files_failing_still_succeeds_without_consolidation() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new();
        let handle = store.create(Tool::BankStatements, 1);
        let id = handle.id().to_string();

        runner(temp.path()).run(BatchJob {
            handle,
            files: vec![file("x.pdf", b"bad")],
        });

        let snapshot = store.snapshot(Tool::BankStatements, &id).unwrap();
        assert!(matches!(snapshot.state, JobState::Succeeded { .. }));
        assert!(!temp.path().join(&id).join("00_CONSOLIDADO.xlsx").exists());
    }

    #[test]
    fn test_unwritable_output_fails_job() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let store = JobStore::new();
        let handle = store.create(Tool::BankStatements, 1);
        let id = handle.id().to_string();

        runner(&blocker).run(BatchJob {
            handle,
            files: vec![file("a.pdf", b"ok")],
        });

        let snapshot = store.snapshot(Tool::BankStatements, &id).unwrap();
        match snapshot.state {
            JobState::Failed { error } => assert!(error.contains("Failed to create directory")),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_extractor_fails_job() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new();
        let handle = store.create(Tool::TaxForm, 1);
        let id = handle.id().to_string();

        runner(temp.path()).run(BatchJob {
            handle,
            files: vec![file("a.pdf", b"ok")],
        });

        match store.snapshot(Tool::TaxForm, &id).unwrap().state {
            JobState::Failed { error } => assert!(error.contains("tax-form")),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }
}

//! Upload validation. Nothing here touches the filesystem or the job store;
//! a batch is either accepted whole or rejected with every offending file named.

use crate::config::ToolLimits;
use crate::error::{FileRejection, RejectReason, ValidationError};
use crate::sanitize::{extension, secure_filename};
use crate::tool::Tool;

const UNDECLARED_MIME: &str = "application/octet-stream";

/// An uploaded file held in memory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    /// Builds a file from a client-supplied name, sanitizing it and guessing
    /// the content type from the extension when none was declared.
    pub fn new(raw_name: &str, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        let content_type = content_type
            .filter(|ct| !ct.trim().is_empty())
            .or_else(|| mime_guess::from_path(raw_name).first().map(|m| m.to_string()));

        Self {
            filename: secure_filename(raw_name),
            content_type,
            bytes,
        }
    }

    pub fn meta(&self) -> FileMeta<'_> {
        FileMeta {
            filename: &self.filename,
            size: self.bytes.len() as u64,
            content_type: self.content_type.as_deref(),
        }
    }
}

/// What the validator looks at: name, declared size and declared type.
#[derive(Debug, Clone, Copy)]
pub struct FileMeta<'a> {
    pub filename: &'a str,
    pub size: u64,
    pub content_type: Option<&'a str>,
}

/// A batch that passed validation. Only the validator can build one.
#[derive(Debug)]
pub struct ValidatedBatch {
    tool: Tool,
    files: Vec<SourceFile>,
}

impl ValidatedBatch {
    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn into_files(self) -> Vec<SourceFile> {
        self.files
    }
}

pub struct FileValidator<'a> {
    tool: Tool,
    limits: &'a ToolLimits,
}

impl<'a> FileValidator<'a> {
    pub fn new(tool: Tool, limits: &'a ToolLimits) -> Self {
        Self { tool, limits }
    }

    /// Checks a batch without consuming it.
    pub fn check(&self, files: &[FileMeta<'_>]) -> Result<(), ValidationError> {
        if files.is_empty() {
            return Err(ValidationError::NoFiles);
        }

        if files.len() > self.limits.max_files {
            return Err(ValidationError::TooManyFiles {
                count: files.len(),
                max: self.limits.max_files,
            });
        }

        let rejections: Vec<FileRejection> = files
            .iter()
            .filter_map(|file| {
                self.check_file(file).map(|reason| FileRejection {
                    filename: file.filename.to_string(),
                    reason,
                })
            })
            .collect();

        if rejections.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Rejected { rejections })
        }
    }

    /// Checks and, on success, seals the batch for submission.
    pub fn accept(&self, files: Vec<SourceFile>) -> Result<ValidatedBatch, ValidationError> {
        let metas: Vec<FileMeta<'_>> = files.iter().map(SourceFile::meta).collect();
        self.check(&metas)?;

        Ok(ValidatedBatch {
            tool: self.tool,
            files,
        })
    }

    fn check_file(&self, file: &FileMeta<'_>) -> Option<RejectReason> {
        let ext = extension(file.filename);
        if !self.limits.allowed_extensions.iter().any(|a| *a == ext) {
            return Some(RejectReason::ExtensionNotAllowed { extension: ext });
        }

        if file.size == 0 {
            return Some(RejectReason::Empty);
        }

        if file.size > self.limits.max_file_size_bytes {
            return Some(RejectReason::TooLarge {
                size: file.size,
                max: self.limits.max_file_size_bytes,
            });
        }

        if let Some(mime) = file.content_type {
            let mime = essence(mime);
            if mime != UNDECLARED_MIME
                && !self.limits.allowed_mime_types.is_empty()
                && !self
                    .limits
                    .allowed_mime_types
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(&mime))
            {
                return Some(RejectReason::MimeNotAllowed { mime });
            }
        }

        None
    }
}

/// `application/pdf; charset=binary` -> `application/pdf`
fn essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or(mime)
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta<'a>(filename: &'a str, size: u64, content_type: Option<&'a str>) -> FileMeta<'a> {
        FileMeta {
            filename,
            size,
            content_type,
        }
    }

    fn pdf_limits() -> ToolLimits {
        ToolLimits::pdf()
    }

    #[test]
    fn test_accepts_valid_batch() {
        let limits = pdf_limits();
        let validator = FileValidator::new(Tool::BankStatements, &limits);

        let result = validator.check(&[
            meta("a.pdf", 1024, Some("application/pdf")),
            meta("B.PDF", 2048, None),
        ]);

        assert!(result.is_ok());
    }

    #[test]
    fn test_rejects_empty_batch() {
        let limits = pdf_limits();
        let validator = FileValidator::new(Tool::BankStatements, &limits);

        assert_eq!(validator.check(&[]), Err(ValidationError::NoFiles));
    }

    #[test]
    fn test_rejects_batch_over_max_files() {
        let limits = pdf_limits();
        let validator = FileValidator::new(Tool::TaxForm, &limits);
        let names: Vec<String> = (0..51).map(|i| format!("f{}.pdf", i)).collect();
        let metas: Vec<FileMeta<'_>> = names.iter().map(|n| meta(n, 10, None)).collect();

        assert_eq!(
            validator.check(&metas),
            Err(ValidationError::TooManyFiles { count: 51, max: 50 })
        );
    }

    #[test]
    fn test_exactly_max_files_is_accepted() {
        let limits = pdf_limits();
        let validator = FileValidator::new(Tool::TaxForm, &limits);
        let names: Vec<String> = (0..50).map(|i| format!("f{}.pdf", i)).collect();
        let metas: Vec<FileMeta<'_>> = names.iter().map(|n| meta(n, 10, None)).collect();

        assert!(validator.check(&metas).is_ok());
    }

    #[test]
    fn test_names_every_offending_file() {
        let limits = pdf_limits();
        let validator = FileValidator::new(Tool::BankStatements, &limits);

        let result = validator.check(&[
            meta("ok.pdf", 10, Some("application/pdf")),
            meta("huge.pdf", 60 * 1024 * 1024, Some("application/pdf")),
            meta("notes.txt", 10, Some("text/plain")),
            meta("empty.pdf", 0, None),
            meta("fake.pdf", 10, Some("image/png")),
        ]);

        match result {
            Err(ValidationError::Rejected { rejections }) => {
                let names: Vec<&str> = rejections.iter().map(|r| r.filename.as_str()).collect();
                assert_eq!(names, vec!["huge.pdf", "notes.txt", "empty.pdf", "fake.pdf"]);
                assert!(matches!(rejections[0].reason, RejectReason::TooLarge { .. }));
                assert!(matches!(
                    rejections[1].reason,
                    RejectReason::ExtensionNotAllowed { .. }
                ));
                assert_eq!(rejections[2].reason, RejectReason::Empty);
                assert_eq!(
                    rejections[3].reason,
                    RejectReason::MimeNotAllowed {
                        mime: "image/png".to_string()
                    }
                );
            }
            other => panic!("Expected Rejected error, got {:?}", other),
        }
    }

    #[test]
    fn test_octet_stream_and_parameters_are_tolerated() {
        let limits = pdf_limits();
        let validator = FileValidator::new(Tool::BankStatements, &limits);

        let result = validator.check(&[
            meta("a.pdf", 10, Some("application/octet-stream")),
            meta("b.pdf", 10, Some("Application/PDF; charset=binary")),
        ]);

        assert!(result.is_ok());
    }

    #[test]
    fn test_size_at_limit_is_accepted() {
        let limits = pdf_limits();
        let validator = FileValidator::new(Tool::BankStatements, &limits);

        let at_limit = limits.max_file_size_bytes;
        assert!(validator.check(&[meta("a.pdf", at_limit, None)]).is_ok());
        assert!(validator.check(&[meta("a.pdf", at_limit + 1, None)]).is_err());
    }

    #[test]
    fn test_accept_keeps_submission_order() {
        let limits = ToolLimits::xlsx();
        let validator = FileValidator::new(Tool::Consolidator, &limits);
        let files = vec![
            SourceFile::new("b.xlsx", None, vec![1]),
            SourceFile::new("a.xlsx", None, vec![2]),
        ];

        let batch = validator.accept(files).unwrap();

        assert_eq!(batch.tool(), Tool::Consolidator);
        let names: Vec<&str> = batch.files().iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["b.xlsx", "a.xlsx"]);
    }

    #[test]
    fn test_source_file_sanitizes_and_guesses_type() {
        let file = SourceFile::new("../Extracto Julio.pdf", None, vec![1, 2, 3]);

        assert_eq!(file.filename, "Extracto_Julio.pdf");
        assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(file.meta().size, 3);
    }
}

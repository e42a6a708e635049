use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::tool::Tool;

#[derive(Error, Debug)]
pub enum DocdeskError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid value '{value}' for environment variable {name}")]
    EnvOverride { name: String, value: String },
}

/// Why a single uploaded file was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    TooLarge { size: u64, max: u64 },
    ExtensionNotAllowed { extension: String },
    MimeNotAllowed { mime: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Empty => write!(f, "file is empty"),
            RejectReason::TooLarge { size, max } => {
                write!(f, "file is {} bytes, limit is {} bytes", size, max)
            }
            RejectReason::ExtensionNotAllowed { extension } if extension.is_empty() => {
                write!(f, "file has no extension")
            }
            RejectReason::ExtensionNotAllowed { extension } => {
                write!(f, "extension '.{}' is not allowed", extension)
            }
            RejectReason::MimeNotAllowed { mime } => {
                write!(f, "content type '{}' is not allowed", mime)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRejection {
    pub filename: String,
    pub reason: RejectReason,
}

impl fmt::Display for FileRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.filename, self.reason)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No files were provided")]
    NoFiles,

    #[error("Too many files: {count} provided, at most {max} allowed")]
    TooManyFiles { count: usize, max: usize },

    #[error("{} file(s) rejected", rejections.len())]
    Rejected { rejections: Vec<FileRejection> },
}

impl ValidationError {
    /// One line per offending file, empty for batch-level errors.
    pub fn details(&self) -> Vec<String> {
        match self {
            ValidationError::Rejected { rejections } => {
                rejections.iter().map(|r| r.to_string()).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} is not ready (state: {state})")]
    NotReady { job_id: String, state: &'static str },
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] SheetError),

    #[error("No records found: {0}")]
    NoRecords(String),

    #[error("Unrecognized document: {0}")]
    Unrecognized(String),
}

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Invalid workbook archive: {0}")]
    Archive(String),

    #[error("Missing workbook part: {0}")]
    MissingPart(String),

    #[error("Malformed XML in '{part}': {message}")]
    Xml { part: String, message: String },

    #[error("Invalid cell reference: {0}")]
    CellReference(String),

    #[error("Workbook part '{part}' exceeds {limit} bytes")]
    PartTooLarge { part: String, limit: u64 },

    #[error("Worksheet exceeds {0} cells")]
    TooManyCells(usize),

    #[error("Workbook I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build archive '{path}': {message}")]
    Archive { path: PathBuf, message: String },

    #[error("Failed to write workbook '{path}': {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: SheetError,
    },
}

/// Errors that stop a whole batch. Per-file extraction errors never end up here.
#[derive(Error, Debug)]
pub enum FatalJobError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("No extractor registered for tool '{0}'")]
    NoExtractor(Tool),

    #[error("Batch processing panicked: {0}")]
    Panicked(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Api {
        status: u16,
        message: String,
        details: Vec<String>,
    },

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Gave up waiting for job {job_id} after {waited_secs}s")]
    Timeout { job_id: String, waited_secs: u64 },
}

pub type Result<T> = std::result::Result<T, DocdeskError>;

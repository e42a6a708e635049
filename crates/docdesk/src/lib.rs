pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod package;
pub mod processor;
pub mod sanitize;
pub mod service;
pub mod sheet;
pub mod tool;
pub mod validate;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use client::{PollPolicy, ToolClient};
pub use config::{load_config, load_with_env, Config, LogFormat, ToolLimits};
pub use error::{
    ClientError, ConfigError, DocdeskError, ExtractionError, JobError, Result, StorageError,
    ValidationError, WorkerError,
};
pub use extract::{Extraction, Extractor, ExtractorRegistry};
pub use jobs::{BatchResult, FileOutcome, JobSnapshot, JobState, StatusResponse, UploadResponse};
pub use service::{Archive, Service};
pub use tool::{Tool, UnknownTool};
pub use validate::{FileValidator, SourceFile, ValidatedBatch};

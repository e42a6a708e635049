pub mod model;
pub mod store;

pub use model::{
    BatchResult, FileOutcome, JobSnapshot, JobState, Outcome, StatusResponse, UploadResponse,
    WireState,
};
pub use store::{JobHandle, JobStore, LogEvent};

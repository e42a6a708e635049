pub mod batch;
pub mod pool;

pub use batch::{BatchJob, BatchRunner};
pub use pool::WorkerPool;

pub mod job;
pub mod pool;

pub use job::{IngestJob, IngestJobResult};
pub use pool::WorkerPool;

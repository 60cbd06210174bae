pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{Failure, FailureKind, PipelineError, PipelineWarning};
pub use progress::{IngestPhase, LogProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{IngestFailure, IngestOutcome, Pipeline};

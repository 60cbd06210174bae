pub mod compose;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod processor;
pub mod registry;
pub mod sanitize;
pub mod storage;
pub mod worker;

pub use compose::Composer;
pub use config::{load_config, Config};
pub use document::{DocumentRecord, DocumentStatus, ExtractedFields, OutputArtifacts};
pub use error::{ConfigError, ProcessError, StorageError, WorkerError};
pub use pipeline::{
    Failure, FailureKind, IngestFailure, IngestOutcome, Pipeline, PipelineConfig, PipelineError,
};
pub use registry::{DocumentRegistry, RecordFilter, RegistryError, SqliteRegistry};

use serde::Serialize;
use thiserror::Error;

use crate::document::DocumentStatus;
use crate::error::{ProcessError, StorageError};
use crate::registry::RegistryError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Processing(#[from] ProcessError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Registry update failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("Document '{id}' is {status}, expected processing")]
    NotProcessing { id: String, status: DocumentStatus },
}

/// Failure categories reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    #[serde(rename = "RasterizationError")]
    Rasterization,
    #[serde(rename = "CalibrationError")]
    Calibration,
    #[serde(rename = "InvalidDocumentError")]
    InvalidDocument,
    #[serde(rename = "ExtractionError")]
    Extraction,
    #[serde(rename = "CompositionError")]
    Composition,
    #[serde(rename = "PersistenceError")]
    Persistence,
}

/// Structured failure: a kind and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Processing(e) => match e {
                ProcessError::ReadDocument { .. } | ProcessError::Rasterization(_) => {
                    FailureKind::Rasterization
                }
                ProcessError::Calibration(_) => FailureKind::Calibration,
                ProcessError::InvalidDocument(_) => FailureKind::InvalidDocument,
                ProcessError::Extraction(_) => FailureKind::Extraction,
                ProcessError::Composition(_) => FailureKind::Composition,
            },
            PipelineError::Storage(_)
            | PipelineError::Registry(_)
            | PipelineError::NotProcessing { .. } => FailureKind::Persistence,
        }
    }

    pub fn to_failure(&self) -> Failure {
        Failure {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Non-fatal problems; the run still succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineWarning {
    DebugPageFailed { error: String },
}

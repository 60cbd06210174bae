use std::path::PathBuf;

use serde::Serialize;

use crate::pipeline::{Failure, IngestFailure, IngestOutcome};

/// One upload waiting for ingestion.
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub id: String,
    pub source_path: PathBuf,
    pub original_name: String,
    pub owner: String,
}

impl IngestJob {
    /// Creates a job; the original name defaults to the source file name.
    pub fn new(source_path: PathBuf, owner: impl Into<String>) -> Self {
        let original_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.pdf".to_string());
        Self::with_name(source_path, original_name, owner)
    }

    pub fn with_name(
        source_path: PathBuf,
        original_name: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_path,
            original_name: original_name.into(),
            owner: owner.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestJobResult {
    pub job_id: String,
    pub source_path: PathBuf,
    pub success: bool,
    /// Set whenever a registry record was created, even on failure.
    pub document_id: Option<String>,
    pub outcome: Option<IngestOutcome>,
    pub failure: Option<Failure>,
}

impl IngestJobResult {
    pub fn success(job: &IngestJob, outcome: IngestOutcome) -> Self {
        Self {
            job_id: job.id.clone(),
            source_path: job.source_path.clone(),
            success: true,
            document_id: Some(outcome.document_id.clone()),
            outcome: Some(outcome),
            failure: None,
        }
    }

    pub fn failure(job: &IngestJob, failure: &IngestFailure) -> Self {
        Self {
            job_id: job.id.clone(),
            source_path: job.source_path.clone(),
            success: false,
            document_id: failure.document_id.clone(),
            outcome: None,
            failure: Some(failure.error.to_failure()),
        }
    }
}

use std::fmt;

use serde::Serialize;

use super::error::FailureKind;
use crate::processor::ExtractionStrategy;

/// Stages of one ingestion, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPhase {
    Rasterizing,
    Calibrating,
    Extracting,
    Parsing,
    Composing,
}

impl fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestPhase::Rasterizing => "rasterizing",
            IngestPhase::Calibrating => "calibrating",
            IngestPhase::Extracting => "extracting",
            IngestPhase::Parsing => "parsing",
            IngestPhase::Composing => "composing",
        };
        f.write_str(name)
    }
}

/// Events emitted by the pipeline during ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Phase {
        document_id: String,
        phase: IngestPhase,
        message: String,
    },
    Completed {
        document_id: String,
        strategy: ExtractionStrategy,
        fields_found: bool,
    },
    Failed {
        document_id: Option<String>,
        kind: FailureKind,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards events to the tracing subscriber.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase {
                document_id,
                phase,
                message,
            } => {
                tracing::info!(document_id = %document_id, phase = %phase, "{}", message);
            }
            ProgressEvent::Completed {
                document_id,
                strategy,
                fields_found,
            } => {
                tracing::info!(
                    document_id = %document_id,
                    strategy = %strategy,
                    fields_found,
                    "Preview ready for verification"
                );
            }
            ProgressEvent::Failed {
                document_id,
                kind,
                error,
            } => {
                tracing::warn!(
                    document_id = document_id.as_deref().unwrap_or("-"),
                    kind = ?kind,
                    "Ingestion failed: {}",
                    error
                );
            }
        }
    }
}

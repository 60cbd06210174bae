//! Document records and their processing state.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing state of an uploaded document.
///
/// Status only moves forward: `pending -> processing -> completed | error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Error)
    }

    /// Returns true if the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Error)
                | (Processing, Completed)
                | (Processing, Error)
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "processing" => Ok(DocumentStatus::Processing),
            "completed" => Ok(DocumentStatus::Completed),
            "error" => Ok(DocumentStatus::Error),
            other => Err(format!("unknown document status '{}'", other)),
        }
    }
}

/// The four fields read off an identity card.
///
/// `None` means the field was never located; `Some("")` means the anchor
/// line was found but nothing usable followed it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    pub id_number: Option<String>,
    pub name: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
}

impl ExtractedFields {
    /// True when no field was located at all (the operator must fill them in).
    pub fn is_empty(&self) -> bool {
        self.id_number.is_none()
            && self.name.is_none()
            && self.address1.is_none()
            && self.address2.is_none()
    }

    /// Field values in drawing order, with missing fields rendered as empty text.
    pub fn as_lines(&self) -> [&str; 4] {
        [
            self.id_number.as_deref().unwrap_or(""),
            self.name.as_deref().unwrap_or(""),
            self.address1.as_deref().unwrap_or(""),
            self.address2.as_deref().unwrap_or(""),
        ]
    }
}

/// Paths of the final composite written for a completed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputArtifacts {
    pub image_path: PathBuf,
    pub pdf_path: PathBuf,
}

/// One record per upload attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub owner: String,
    pub source_path: PathBuf,
    pub original_name: String,
    pub status: DocumentStatus,
    pub extracted_fields: ExtractedFields,
    pub output_artifacts: Option<OutputArtifacts>,
    /// Why the document ended in `error`, if it did.
    pub error: Option<String>,
    pub upload_time: DateTime<Utc>,
    pub processed_time: Option<DateTime<Utc>>,
}

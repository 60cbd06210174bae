//! Per-document state store.
//!
//! Records move `pending -> processing -> completed | error` and never back.
//! Once a record is terminal its fields are frozen.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::db::document_repo::{self, DocumentFilter, DocumentRow, FieldColumns};
use crate::db::{Database, DatabaseError};
use crate::document::{DocumentRecord, DocumentStatus, ExtractedFields, OutputArtifacts};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Document '{0}' not found")]
    NotFound(String),

    #[error("Illegal status transition {from} -> {to}")]
    InvalidTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error("Fields of document '{id}' are frozen (status {status})")]
    FieldsFrozen { id: String, status: DocumentStatus },

    #[error("Document '{0}' cannot complete without output artifacts")]
    MissingArtifacts(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Listing parameters. `None` means no restriction.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub owner: Option<String>,
    pub status: Option<DocumentStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// One page of records, newest upload first.
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<DocumentRecord>,
    pub total: u64,
}

pub trait DocumentRegistry: Send + Sync {
    /// Inserts a `pending` record and returns its id.
    fn create_record(
        &self,
        owner: &str,
        original_name: &str,
        source_path: &std::path::Path,
    ) -> Result<String, RegistryError>;

    /// Moves a record forward. Terminal transitions stamp `processed_time`
    /// with `processed_time` or now.
    fn update_status(
        &self,
        id: &str,
        status: DocumentStatus,
        processed_time: Option<DateTime<Utc>>,
    ) -> Result<(), RegistryError>;

    /// Replaces the fields. With `artifacts` the record completes in the same
    /// write; without, the status is left alone.
    fn update_fields(
        &self,
        id: &str,
        fields: &ExtractedFields,
        artifacts: Option<&OutputArtifacts>,
    ) -> Result<(), RegistryError>;

    /// Moves a record to `error`, keeping the reason.
    fn record_failure(
        &self,
        id: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RegistryError>;

    fn get_record(&self, id: &str) -> Result<DocumentRecord, RegistryError>;

    fn list_records(&self, filter: &RecordFilter) -> Result<RecordPage, RegistryError>;
}

/// SQLite-backed registry.
#[derive(Clone)]
pub struct SqliteRegistry {
    db: Database,
}

impl SqliteRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn in_memory() -> Result<Self, RegistryError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn load_row(&self, id: &str) -> Result<DocumentRow, RegistryError> {
        document_repo::find_by_id(&self.db, id)?.ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    fn current_status(&self, id: &str) -> Result<DocumentStatus, RegistryError> {
        let row = self.load_row(id)?;
        parse_status(&row)
    }

    fn transition(
        &self,
        id: &str,
        to: DocumentStatus,
        processed_time: Option<DateTime<Utc>>,
        error: Option<&str>,
    ) -> Result<(), RegistryError> {
        let from = self.current_status(id)?;
        if !from.can_transition_to(to) {
            return Err(RegistryError::InvalidTransition { from, to });
        }
        if to == DocumentStatus::Completed {
            return Err(RegistryError::MissingArtifacts(id.to_string()));
        }

        let stamp = to
            .is_terminal()
            .then(|| format_time(processed_time.unwrap_or_else(Utc::now)));

        let applied = document_repo::compare_and_set_status(
            &self.db,
            id,
            from.as_str(),
            to.as_str(),
            stamp.as_deref(),
            error,
        )?;
        if !applied {
            // Lost a race; report against whatever status won.
            return Err(RegistryError::InvalidTransition {
                from: self.current_status(id)?,
                to,
            });
        }

        log::debug!("Document {} moved {} -> {}", id, from, to);
        Ok(())
    }
}

impl DocumentRegistry for SqliteRegistry {
    fn create_record(
        &self,
        owner: &str,
        original_name: &str,
        source_path: &std::path::Path,
    ) -> Result<String, RegistryError> {
        let id = uuid::Uuid::new_v4().to_string();
        let row = DocumentRow {
            id: id.clone(),
            owner: owner.to_string(),
            original_name: original_name.to_string(),
            source_path: source_path.to_string_lossy().into_owned(),
            status: DocumentStatus::Pending.as_str().to_string(),
            upload_time: format_time(Utc::now()),
            ..Default::default()
        };
        document_repo::insert(&self.db, &row)?;
        log::info!("Registered document {} for owner {}", id, owner);
        Ok(id)
    }

    fn update_status(
        &self,
        id: &str,
        status: DocumentStatus,
        processed_time: Option<DateTime<Utc>>,
    ) -> Result<(), RegistryError> {
        self.transition(id, status, processed_time, None)
    }

    fn update_fields(
        &self,
        id: &str,
        fields: &ExtractedFields,
        artifacts: Option<&OutputArtifacts>,
    ) -> Result<(), RegistryError> {
        let from = self.current_status(id)?;
        if from.is_terminal() {
            return Err(RegistryError::FieldsFrozen {
                id: id.to_string(),
                status: from,
            });
        }

        let columns = FieldColumns {
            id_number: fields.id_number.as_deref(),
            name: fields.name.as_deref(),
            address1: fields.address1.as_deref(),
            address2: fields.address2.as_deref(),
        };

        let (status, stamp, paths) = match artifacts {
            Some(artifacts) => {
                if !from.can_transition_to(DocumentStatus::Completed) {
                    return Err(RegistryError::InvalidTransition {
                        from,
                        to: DocumentStatus::Completed,
                    });
                }
                (
                    DocumentStatus::Completed,
                    Some(format_time(Utc::now())),
                    Some((
                        artifacts.image_path.to_string_lossy().into_owned(),
                        artifacts.pdf_path.to_string_lossy().into_owned(),
                    )),
                )
            }
            None => (from, None, None),
        };

        let applied = document_repo::compare_and_set_fields(
            &self.db,
            id,
            from.as_str(),
            &columns,
            paths.as_ref().map(|(image, pdf)| (image.as_str(), pdf.as_str())),
            status.as_str(),
            stamp.as_deref(),
        )?;
        if !applied {
            return Err(RegistryError::FieldsFrozen {
                id: id.to_string(),
                status: self.current_status(id)?,
            });
        }
        Ok(())
    }

    fn record_failure(
        &self,
        id: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        self.transition(id, DocumentStatus::Error, Some(at), Some(message))
    }

    fn get_record(&self, id: &str) -> Result<DocumentRecord, RegistryError> {
        row_to_record(self.load_row(id)?)
    }

    fn list_records(&self, filter: &RecordFilter) -> Result<RecordPage, RegistryError> {
        let (rows, total) = document_repo::query(
            &self.db,
            &DocumentFilter {
                owner: filter.owner.clone(),
                status: filter.status.map(|s| s.as_str().to_string()),
                limit: filter.limit,
                offset: filter.offset,
            },
        )?;
        let records = rows
            .into_iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RecordPage { records, total })
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_time(id: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::InvalidRow {
            id: id.to_string(),
            reason: format!("bad timestamp '{}': {}", value, e),
        })
}

fn parse_status(row: &DocumentRow) -> Result<DocumentStatus, RegistryError> {
    row.status.parse().map_err(|reason| {
        RegistryError::Database(DatabaseError::InvalidRow {
            id: row.id.clone(),
            reason,
        })
    })
}

fn row_to_record(row: DocumentRow) -> Result<DocumentRecord, RegistryError> {
    let status = parse_status(&row)?;
    let upload_time = parse_time(&row.id, &row.upload_time)?;
    let processed_time = row
        .processed_time
        .as_deref()
        .map(|t| parse_time(&row.id, t))
        .transpose()?;

    let output_artifacts = match (row.image_path, row.pdf_path) {
        (Some(image), Some(pdf)) => Some(OutputArtifacts {
            image_path: PathBuf::from(image),
            pdf_path: PathBuf::from(pdf),
        }),
        _ => None,
    };

    Ok(DocumentRecord {
        id: row.id,
        owner: row.owner,
        source_path: PathBuf::from(row.source_path),
        original_name: row.original_name,
        status,
        extracted_fields: ExtractedFields {
            id_number: row.id_number,
            name: row.name,
            address1: row.address1,
            address2: row.address2,
        },
        output_artifacts,
        error: row.error,
        upload_time,
        processed_time,
    })
}

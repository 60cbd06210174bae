use std::path::{Path, PathBuf};

use super::error::PipelineWarning;

/// Identity of one ingestion run, plus the warnings it collected.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub document_id: String,
    pub owner: String,
    pub original_name: String,
    /// The uploaded copy; every stage reads from here.
    pub upload_path: PathBuf,
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(document_id: String, owner: &str, original_name: &str, upload_path: PathBuf) -> Self {
        Self {
            document_id,
            owner: owner.to_string(),
            original_name: original_name.to_string(),
            upload_path,
            warnings: Vec::new(),
        }
    }

    /// Upload file name, e.g. `1700000000000_card.pdf`.
    pub fn file_name(&self) -> String {
        file_name_of(&self.upload_path)
    }

    /// Upload file name without extension; keys the final artifact names.
    pub fn base_name(&self) -> String {
        self.upload_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string()
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

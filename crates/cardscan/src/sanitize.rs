//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Card data is personal; spans and logs carry file names and masked IDs
//! only.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks all but the last four characters of an ID number.
pub fn mask_id_number(id_number: &str) -> String {
    let count = id_number.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let visible: String = id_number.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), visible)
}

//! Structured-text strategy: reads the PDF's embedded text layer.

use std::path::Path;

use crate::error::ProcessError;
use crate::processor::fields::{split_lines, Blocklist};
use crate::processor::{ExtractionInput, ExtractionStrategy, FieldExtractor};

/// Pattern for Identity-H Unimplemented errors (common with CID fonts).
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Minimum number of characters required before applying alphanumeric ratio check.
/// Text shorter than this is considered valid regardless of character composition.
const MIN_TOTAL_CHARS: usize = 50;

/// Minimum percentage of alphanumeric characters required for text to be considered valid.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// Reads the text layer of page 1.
///
/// Returns `None` when lopdf cannot parse the file or page 1 carries no
/// decodable text; the OCR strategy is the way forward for such scans.
pub fn read_text_layer(pdf_path: &Path) -> Result<Option<String>, ProcessError> {
    let pdf_bytes = std::fs::read(pdf_path).map_err(|e| ProcessError::ReadDocument {
        path: pdf_path.to_path_buf(),
        source: e,
    })?;

    let doc = match lopdf::Document::load_mem(&pdf_bytes) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!("lopdf failed to parse text layer: {}", e);
            return Ok(None);
        }
    };

    let Some(first_page) = doc.get_pages().keys().next().copied() else {
        return Ok(None);
    };

    match doc.extract_text(&[first_page]) {
        Ok(text) => Ok(Some(text)),
        Err(e) => {
            tracing::warn!("Failed to extract text from page 1: {}", e);
            Ok(None)
        }
    }
}

/// Determines if a text layer is unusable and OCR should run instead.
/// Returns true if:
/// - Text is empty or whitespace only
/// - Text contains only font encoding error markers (Identity-H Unimplemented)
/// - Text contains very high ratio of non-printable/garbled characters
pub fn is_text_layer_unusable(text: &str) -> bool {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");

    if cleaned.is_empty() {
        return true;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}

/// Strategy A: template-marker guard, then boilerplate-free lines.
pub struct TextLayerExtractor {
    template_marker: String,
    blocklist: Blocklist,
}

impl TextLayerExtractor {
    pub fn new(template_marker: impl Into<String>, blocklist: Blocklist) -> Self {
        Self {
            template_marker: template_marker.into(),
            blocklist,
        }
    }

    /// Fails with `InvalidDocument` unless the text carries the template marker.
    pub fn check_template(&self, text: &str) -> Result<(), ProcessError> {
        if text.contains(&self.template_marker) {
            Ok(())
        } else {
            Err(ProcessError::InvalidDocument(
                "Template marker not found; this is not the expected card".to_string(),
            ))
        }
    }
}

impl FieldExtractor for TextLayerExtractor {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::TextLayer
    }

    fn extract_lines(&self, input: &ExtractionInput<'_>) -> Result<Vec<String>, ProcessError> {
        let _span = tracing::info_span!("processor.text_layer").entered();

        let text = input.text_layer.ok_or_else(|| {
            ProcessError::Extraction("Document has no embedded text layer".to_string())
        })?;

        self.check_template(text)?;

        Ok(split_lines(text)
            .into_iter()
            .filter(|line| !self.blocklist.matches(line))
            .collect())
    }
}

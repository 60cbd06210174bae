//! Optical strategy: recognizes text from the cropped card image.

use std::io::Cursor;
use std::sync::Arc;

use image::DynamicImage;

use crate::error::ProcessError;
use crate::processor::fields::{split_lines, Blocklist};
use crate::processor::{ExtractionInput, ExtractionStrategy, FieldExtractor};

/// Turns an image into text.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<String, ProcessError>;
}

/// Tesseract through leptess.
#[derive(Clone)]
pub struct TesseractRecognizer {
    inner: Arc<TesseractRecognizerInner>,
}

struct TesseractRecognizerInner {
    languages: String,
}

impl TesseractRecognizer {
    pub fn new(languages: &[String]) -> Self {
        let lang_str = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            inner: Arc::new(TesseractRecognizerInner {
                languages: lang_str,
            }),
        }
    }

    pub fn languages(&self) -> &str {
        &self.inner.languages
    }

    pub fn recognize_bytes(&self, png_data: &[u8]) -> Result<String, ProcessError> {
        // A fresh engine per call; LepTess is not Sync.
        let mut lt = leptess::LepTess::new(None, &self.inner.languages).map_err(|e| {
            ProcessError::Extraction(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image_from_mem(png_data)
            .map_err(|e| ProcessError::Extraction(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| ProcessError::Extraction(format!("OCR failed: {}", e)))
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.ocr", languages = %self.inner.languages).entered();

        let mut png_data = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| ProcessError::Extraction(format!("Failed to encode card image: {}", e)))?;

        self.recognize_bytes(&png_data)
    }
}

/// Strategy B: recognized lines of the card crop, boilerplate removed.
///
/// No template marker check happens here; recognition of the marker text is
/// too unreliable to reject documents on.
pub struct OcrExtractor {
    recognizer: Arc<dyn TextRecognizer>,
    blocklist: Blocklist,
}

impl OcrExtractor {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, blocklist: Blocklist) -> Self {
        Self {
            recognizer,
            blocklist,
        }
    }
}

impl FieldExtractor for OcrExtractor {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Ocr
    }

    fn extract_lines(&self, input: &ExtractionInput<'_>) -> Result<Vec<String>, ProcessError> {
        let text = self.recognizer.recognize(input.card)?;
        let lines: Vec<String> = split_lines(&text)
            .into_iter()
            .filter(|line| !self.blocklist.matches(line))
            .collect();

        tracing::debug!(lines = lines.len(), "OCR produced lines");
        Ok(lines)
    }
}

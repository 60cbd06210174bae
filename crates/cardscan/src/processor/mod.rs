pub mod calibrate;
pub mod fields;
pub mod ocr;
pub mod raster;
pub mod text;

use std::fmt;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::config::schema::StrategySelection;
use crate::error::ProcessError;

pub use calibrate::{CardGeometry, CardRegions, Rect, RegionCalibrator};
pub use fields::{Blocklist, FieldParser};
pub use ocr::{OcrExtractor, TesseractRecognizer, TextRecognizer};
pub use raster::{PageRasterizer, PopplerRasterizer, RasterizedPage};
pub use text::{is_text_layer_unusable, read_text_layer, TextLayerExtractor};

/// How the field lines of a card were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    #[serde(rename = "text")]
    TextLayer,
    Ocr,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStrategy::TextLayer => "text",
            ExtractionStrategy::Ocr => "ocr",
        }
    }

    /// Resolves the configured selection against what the document offers.
    ///
    /// `auto` prefers the text layer and only drops to OCR when the layer is
    /// missing or unusable.
    pub fn select(selection: StrategySelection, text_layer: Option<&str>) -> Self {
        match selection {
            StrategySelection::Text => ExtractionStrategy::TextLayer,
            StrategySelection::Ocr => ExtractionStrategy::Ocr,
            StrategySelection::Auto => match text_layer {
                Some(text) if !is_text_layer_unusable(text) => ExtractionStrategy::TextLayer,
                _ => ExtractionStrategy::Ocr,
            },
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a strategy may look at.
pub struct ExtractionInput<'a> {
    pub text_layer: Option<&'a str>,
    pub card: &'a DynamicImage,
}

/// Produces the ordered, boilerplate-free text lines of a card.
pub trait FieldExtractor: Send + Sync {
    fn strategy(&self) -> ExtractionStrategy;
    fn extract_lines(&self, input: &ExtractionInput<'_>) -> Result<Vec<String>, ProcessError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_selection_wins() {
        assert_eq!(
            ExtractionStrategy::select(StrategySelection::Text, None),
            ExtractionStrategy::TextLayer
        );
        assert_eq!(
            ExtractionStrategy::select(StrategySelection::Ocr, Some("1234567890123456 John")),
            ExtractionStrategy::Ocr
        );
    }

    #[test]
    fn test_auto_prefers_usable_text_layer() {
        assert_eq!(
            ExtractionStrategy::select(StrategySelection::Auto, Some("PMJAY-CMCHIS\n1234567890123456")),
            ExtractionStrategy::TextLayer
        );
    }

    #[test]
    fn test_auto_falls_back_to_ocr() {
        assert_eq!(
            ExtractionStrategy::select(StrategySelection::Auto, None),
            ExtractionStrategy::Ocr
        );
        assert_eq!(
            ExtractionStrategy::select(StrategySelection::Auto, Some("   \n ")),
            ExtractionStrategy::Ocr
        );
        assert_eq!(
            ExtractionStrategy::select(
                StrategySelection::Auto,
                Some("?Identity-H Unimplemented?")
            ),
            ExtractionStrategy::Ocr
        );
    }

    #[test]
    fn test_strategy_serializes_short_names() {
        assert_eq!(
            serde_json::to_string(&ExtractionStrategy::TextLayer).unwrap(),
            "\"text\""
        );
        assert_eq!(serde_json::to_string(&ExtractionStrategy::Ocr).unwrap(), "\"ocr\"");
        assert_eq!(ExtractionStrategy::Ocr.to_string(), "ocr");
    }
}

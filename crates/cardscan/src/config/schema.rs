use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub upload_directory: String,
    pub output_directory: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub raster: RasterConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub composer: ComposerConfig,
}

impl Config {
    /// Configured registry path, or `~/.cardscan/data/cardscan.db`.
    pub fn resolved_database_path(&self) -> Option<std::path::PathBuf> {
        match &self.database_path {
            Some(path) => Some(std::path::PathBuf::from(path)),
            None => crate::db::default_database_path(),
        }
    }
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterConfig {
    /// Oversampling factor relative to the native page size (72 dpi).
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Persist the rendered page as `page_<id>.png` in the output directory.
    #[serde(default)]
    pub debug_page_images: bool,
}

fn default_scale() -> f32 {
    2.0
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            debug_page_images: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectConfig {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeConfig {
    pub width: u32,
    pub height: u32,
}

/// Crop coordinates, authored against a page rendered `reference_width` pixels wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_reference_width")]
    pub reference_width: u32,
    #[serde(default = "default_card_rect")]
    pub card: RectConfig,
    /// Offsets local to the card crop; not rescaled.
    #[serde(default = "default_photo_rect")]
    pub photo: RectConfig,
    #[serde(default = "default_photo_size")]
    pub photo_size: SizeConfig,
}

fn default_reference_width() -> u32 {
    2500
}

fn default_card_rect() -> RectConfig {
    RectConfig {
        left: 130,
        top: 124,
        width: 2088,
        height: 683,
    }
}

fn default_photo_rect() -> RectConfig {
    RectConfig {
        left: 392,
        top: 225,
        width: 103,
        height: 93,
    }
}

fn default_photo_size() -> SizeConfig {
    SizeConfig {
        width: 270,
        height: 204,
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            reference_width: default_reference_width(),
            card: default_card_rect(),
            photo: default_photo_rect(),
            photo_size: default_photo_size(),
        }
    }
}

/// Which field extractor runs for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategySelection {
    /// Text layer first, OCR when the text layer is empty or garbled.
    #[default]
    Auto,
    Text,
    Ocr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub strategy: StrategySelection,
    /// Substring that must appear in the text layer of a genuine card.
    #[serde(default = "default_template_marker")]
    pub template_marker: String,
    /// Lines containing any of these phrases are boilerplate, never field values.
    #[serde(default = "default_blocklist")]
    pub blocklist: Vec<String>,
    #[serde(default = "default_ocr_languages")]
    pub ocr_languages: Vec<String>,
}

fn default_template_marker() -> String {
    "(PMJAY-CMCHIS ஒருங்கிைணந்த திட்டம்)".to_string()
}

fn default_blocklist() -> Vec<String> {
    vec![
        "தமிழ்நாடு அரசு".to_string(),
        "உறுப்பினர்".to_string(),
        "அைடயாள".to_string(),
        "அட்ைட".to_string(),
    ]
}

fn default_ocr_languages() -> Vec<String> {
    vec!["tam".to_string(), "eng".to_string()]
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategy: StrategySelection::default(),
            template_marker: default_template_marker(),
            blocklist: default_blocklist(),
            ocr_languages: default_ocr_languages(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// TrueType/OpenType font for the card text. Probed from system locations when unset.
    #[serde(default)]
    pub font_path: Option<String>,
}

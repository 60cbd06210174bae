use std::path::PathBuf;

use crate::config::schema::{CalibrationConfig, ComposerConfig, StrategySelection};
use crate::config::Config;

/// Everything one pipeline needs, resolved from the loaded configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub upload_directory: PathBuf,
    pub output_directory: PathBuf,
    pub raster_scale: f32,
    pub debug_page_images: bool,
    pub calibration: CalibrationConfig,
    pub strategy: StrategySelection,
    pub template_marker: String,
    pub blocklist: Vec<String>,
    pub ocr_languages: Vec<String>,
    pub composer: ComposerConfig,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            upload_directory: PathBuf::from(&config.upload_directory),
            output_directory: PathBuf::from(&config.output_directory),
            raster_scale: config.raster.scale,
            debug_page_images: config.raster.debug_page_images,
            calibration: config.calibration.clone(),
            strategy: config.extraction.strategy,
            template_marker: config.extraction.template_marker.clone(),
            blocklist: config.extraction.blocklist.clone(),
            ocr_languages: config.extraction.ocr_languages.clone(),
            composer: config.composer.clone(),
        }
    }
}

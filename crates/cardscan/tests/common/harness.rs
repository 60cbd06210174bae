//! Isolated pipeline environment for integration tests.
//!
//! Rendering and OCR are replaced with in-process fakes, so the suite runs
//! without poppler or Tesseract installed.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, Rgb, RgbImage};
use tempfile::TempDir;

use cardscan::config::schema::{CalibrationConfig, ComposerConfig, StrategySelection};
use cardscan::pipeline::{Pipeline, PipelineConfig};
use cardscan::processor::{PageRasterizer, RasterizedPage, TextRecognizer};
use cardscan::{Composer, DocumentRegistry, ProcessError, SqliteRegistry};

use super::fixtures::TEST_MARKER;

/// Renders every document as the same A4 page at 2x.
pub struct SyntheticRasterizer;

impl PageRasterizer for SyntheticRasterizer {
    fn rasterize(&self, _pdf_path: &Path, scale: f32) -> Result<RasterizedPage, ProcessError> {
        let width = (595.0 * scale) as u32;
        let height = (842.0 * scale) as u32;
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        Ok(RasterizedPage::new(DynamicImage::ImageRgb8(image)))
    }
}

/// Returns canned text for every card crop.
pub struct ScriptedRecognizer(pub String);

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(&self, _image: &DynamicImage) -> Result<String, ProcessError> {
        Ok(self.0.clone())
    }
}

pub const SCRIPTED_OCR_TEXT: &str =
    "Government of Tamil Nadu\n1234 5678 9012 345\nLakshmi R\n4/7 Temple Road\nMadurai\n";

pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    registry: Arc<SqliteRegistry>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let input_dir = base.join("input");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");

        Self {
            input_dir,
            upload_dir: base.join("uploads"),
            output_dir: base.join("output"),
            registry: Arc::new(SqliteRegistry::in_memory().expect("Failed to open registry")),
            temp_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn registry(&self) -> Arc<dyn DocumentRegistry> {
        self.registry.clone()
    }

    pub fn write_input(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    pub fn config(&self, strategy: StrategySelection) -> PipelineConfig {
        PipelineConfig {
            upload_directory: self.upload_dir.clone(),
            output_directory: self.output_dir.clone(),
            raster_scale: 2.0,
            debug_page_images: false,
            calibration: CalibrationConfig::default(),
            strategy,
            template_marker: TEST_MARKER.to_string(),
            blocklist: vec![
                "Government of".to_string(),
                "Identity Card".to_string(),
            ],
            ocr_languages: vec!["eng".to_string()],
            composer: ComposerConfig::default(),
        }
    }

    pub fn pipeline(&self, strategy: StrategySelection) -> Pipeline {
        self.pipeline_with(self.config(strategy))
    }

    pub fn pipeline_with(&self, config: PipelineConfig) -> Pipeline {
        Pipeline::new(Arc::new(config), self.registry(), Composer::layout_only())
            .with_rasterizer(Arc::new(SyntheticRasterizer))
            .with_recognizer(Arc::new(ScriptedRecognizer(SCRIPTED_OCR_TEXT.to_string())))
    }

    /// Files currently in the output directory, sorted.
    pub fn output_files(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.output_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

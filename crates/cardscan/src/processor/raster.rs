//! Page rasterization.
//!
//! Page 1 is rendered through poppler's `pdftoppm`. Page counting goes through
//! lopdf and falls back to `pdfinfo` for files lopdf cannot parse.

use std::path::Path;
use std::process::Command;

use image::{DynamicImage, GenericImageView};

use crate::error::ProcessError;

/// Native PDF resolution; a scale of 1.0 renders one pixel per point.
const POINTS_PER_INCH: f32 = 72.0;

/// A rendered first page.
#[derive(Debug, Clone)]
pub struct RasterizedPage {
    pub image: DynamicImage,
    pub width: u32,
    pub height: u32,
}

impl RasterizedPage {
    pub fn new(image: DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            image,
            width,
            height,
        }
    }
}

/// Renders page 1 of a PDF at `scale` times its native size.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, pdf_path: &Path, scale: f32) -> Result<RasterizedPage, ProcessError>;
}

/// Production rasterizer backed by poppler-utils.
#[derive(Debug, Default, Clone)]
pub struct PopplerRasterizer;

impl PopplerRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl PageRasterizer for PopplerRasterizer {
    fn rasterize(&self, pdf_path: &Path, scale: f32) -> Result<RasterizedPage, ProcessError> {
        let _span = tracing::info_span!("processor.rasterize", scale).entered();

        let pdf_bytes = std::fs::read(pdf_path).map_err(|e| {
            ProcessError::Rasterization(format!("Failed to read '{}': {}", pdf_path.display(), e))
        })?;

        let page_count = count_pages(&pdf_bytes)?;
        if page_count == 0 {
            return Err(ProcessError::Rasterization(
                "Document has no pages".to_string(),
            ));
        }

        let dpi = (POINTS_PER_INCH * scale).round().max(1.0) as u32;
        let png = render_first_page(&pdf_bytes, dpi)?;
        let image = image::load_from_memory(&png).map_err(|e| {
            ProcessError::Rasterization(format!("Failed to decode rendered page: {}", e))
        })?;

        let page = RasterizedPage::new(image);
        tracing::debug!(
            width = page.width,
            height = page.height,
            dpi,
            "Rendered page 1"
        );
        Ok(page)
    }
}

/// Counts pages with lopdf, falling back to `pdfinfo` when lopdf rejects the file.
pub fn count_pages(pdf_bytes: &[u8]) -> Result<usize, ProcessError> {
    match lopdf::Document::load_mem(pdf_bytes) {
        Ok(doc) => Ok(doc.get_pages().len()),
        Err(e) => {
            tracing::warn!("lopdf failed to parse PDF: {}. Asking pdfinfo.", e);
            count_pages_with_pdfinfo(pdf_bytes)
        }
    }
}

fn count_pages_with_pdfinfo(pdf_bytes: &[u8]) -> Result<usize, ProcessError> {
    let temp_dir = std::env::temp_dir();
    let pdf_path = temp_dir.join(format!("cardscan_pagecount_{}.pdf", uuid::Uuid::new_v4()));

    std::fs::write(&pdf_path, pdf_bytes)
        .map_err(|e| ProcessError::Rasterization(format!("Failed to write temp PDF: {}", e)))?;

    let output = Command::new("pdfinfo").arg(&pdf_path).output();
    let _ = std::fs::remove_file(&pdf_path);

    let output = output.map_err(|e| {
        ProcessError::Rasterization(format!(
            "Not a readable PDF and pdfinfo is unavailable: {}",
            e
        ))
    })?;

    if !output.status.success() {
        return Err(ProcessError::Rasterization(format!(
            "Not a valid PDF: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_pdfinfo_pages(&stdout).ok_or_else(|| {
        ProcessError::Rasterization("pdfinfo did not report a page count".to_string())
    })
}

fn parse_pdfinfo_pages(stdout: &str) -> Option<usize> {
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix("Pages:"))
        .find_map(|count| count.trim().parse::<usize>().ok())
}

fn render_first_page(pdf_bytes: &[u8], dpi: u32) -> Result<Vec<u8>, ProcessError> {
    let temp_dir = std::env::temp_dir();
    let run_id = uuid::Uuid::new_v4();
    let pdf_path = temp_dir.join(format!("cardscan_src_{}.pdf", run_id));
    let output_prefix = temp_dir.join(format!("cardscan_page_{}", run_id));

    std::fs::write(&pdf_path, pdf_bytes)
        .map_err(|e| ProcessError::Rasterization(format!("Failed to write temp PDF: {}", e)))?;

    // -singlefile drops the page-number suffix from the output name.
    let output = Command::new("pdftoppm")
        .arg("-png")
        .arg("-r")
        .arg(dpi.to_string())
        .args(["-f", "1", "-l", "1", "-singlefile"])
        .arg(&pdf_path)
        .arg(&output_prefix)
        .output();

    let _ = std::fs::remove_file(&pdf_path);

    let output = output.map_err(|e| {
        ProcessError::Rasterization(format!(
            "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
            e
        ))
    })?;

    if !output.status.success() {
        return Err(ProcessError::Rasterization(format!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let image_path = output_prefix.with_extension("png");
    let image_data = std::fs::read(&image_path).map_err(|e| {
        ProcessError::Rasterization(format!("Failed to read rendered page: {}", e))
    })?;
    let _ = std::fs::remove_file(&image_path);

    Ok(image_data)
}

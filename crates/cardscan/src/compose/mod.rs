//! Fixed-layout card composites.
//!
//! Two layouts share the same structure: a white canvas, the photo at a fixed
//! anchor and the four field lines drawn at fixed baselines. The preview is
//! small and returned in memory; the final render is large and persisted by
//! the caller as PNG and single-page PDF.

pub mod pdf;

use std::io::Cursor;
use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;

use crate::config::schema::ComposerConfig;
use crate::document::ExtractedFields;
use crate::error::ProcessError;

pub use pdf::image_to_pdf;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Well-known locations of a bold sans font, tried in order.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/noto/NotoSansTamil-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Geometry of one composite. All values are in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub font_px: f32,
    pub text_x: i32,
    /// Baselines of id number, name, address1, address2.
    pub baselines: [i32; 4],
    pub photo_x: i64,
    pub photo_y: i64,
    pub photo_width: u32,
    pub photo_height: u32,
}

pub const PREVIEW_LAYOUT: Layout = Layout {
    canvas_width: 325,
    canvas_height: 204,
    font_px: 11.0,
    text_x: 8,
    baselines: [150, 160, 175, 195],
    photo_x: 252,
    photo_y: 135,
    photo_width: 68,
    photo_height: 51,
};

pub const FINAL_LAYOUT: Layout = Layout {
    canvas_width: 1300,
    canvas_height: 816,
    font_px: 44.0,
    text_x: 32,
    baselines: [600, 650, 700, 750],
    photo_x: 1015,
    photo_y: 556,
    photo_width: 270,
    photo_height: 204,
};

/// In-memory result of the preview pass.
#[derive(Debug, Clone)]
pub struct PreviewComposite {
    pub composite: RgbImage,
    /// PNG of the full-size photo crop, handed back to `finalize` later.
    pub photo_png: Vec<u8>,
}

/// Encoded final composite.
#[derive(Debug, Clone)]
pub struct FinalComposite {
    pub composite: RgbImage,
    pub png: Vec<u8>,
    pub pdf: Vec<u8>,
}

#[derive(Clone)]
pub struct Composer {
    font: Option<FontArc>,
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("has_font", &self.font.is_some())
            .finish()
    }
}

impl Composer {
    pub fn new(font: FontArc) -> Self {
        Self { font: Some(font) }
    }

    /// Composer that places the photo but draws no text.
    ///
    /// Layout coordinates are identical to a font-backed composer.
    pub fn layout_only() -> Self {
        Self { font: None }
    }

    /// Loads the configured font, or the first system font found.
    pub fn from_config(config: &ComposerConfig) -> Result<Self, ProcessError> {
        if let Some(path) = &config.font_path {
            return Ok(Self::new(load_font(Path::new(path))?));
        }

        match discover_system_font() {
            Some(path) => {
                tracing::debug!("Using system font {}", path.display());
                Ok(Self::new(load_font(&path)?))
            }
            None => Err(ProcessError::Composition(
                "No usable font found; set composer.font_path".to_string(),
            )),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Small composite shown to the operator for verification. No file I/O.
    pub fn compose_preview(
        &self,
        photo: &RgbImage,
        fields: &ExtractedFields,
    ) -> Result<PreviewComposite, ProcessError> {
        let _span = tracing::info_span!("compose_preview").entered();

        let composite = self.render(&PREVIEW_LAYOUT, photo, fields);
        let photo_png = encode_png(photo)?;

        Ok(PreviewComposite {
            composite,
            photo_png,
        })
    }

    /// Large composite with the verified fields, encoded as PNG and PDF.
    pub fn compose_final(
        &self,
        photo_png: &[u8],
        fields: &ExtractedFields,
    ) -> Result<FinalComposite, ProcessError> {
        let photo = image::load_from_memory(photo_png)
            .map_err(|e| ProcessError::Composition(format!("Failed to decode photo: {}", e)))?
            .to_rgb8();

        let composite = self.render(&FINAL_LAYOUT, &photo, fields);
        let png = encode_png(&composite)?;
        let pdf = image_to_pdf(&composite)?;

        Ok(FinalComposite {
            composite,
            png,
            pdf,
        })
    }

    /// Draws one composite. Pure: same inputs give the same pixels.
    pub fn render(&self, layout: &Layout, photo: &RgbImage, fields: &ExtractedFields) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(layout.canvas_width, layout.canvas_height, WHITE);

        let fitted = if photo.dimensions() == (layout.photo_width, layout.photo_height) {
            photo.clone()
        } else {
            imageops::resize(
                photo,
                layout.photo_width,
                layout.photo_height,
                FilterType::Lanczos3,
            )
        };
        imageops::overlay(&mut canvas, &fitted, layout.photo_x, layout.photo_y);

        if let Some(font) = &self.font {
            let scale = PxScale::from(layout.font_px);
            let ascent = font.as_scaled(scale).ascent().round() as i32;
            for (text, baseline) in fields.as_lines().iter().zip(layout.baselines) {
                if text.is_empty() {
                    continue;
                }
                draw_text_mut(
                    &mut canvas,
                    BLACK,
                    layout.text_x,
                    baseline - ascent,
                    scale,
                    font,
                    text,
                );
            }
        }

        canvas
    }
}

fn load_font(path: &Path) -> Result<FontArc, ProcessError> {
    let data = std::fs::read(path).map_err(|e| {
        ProcessError::Composition(format!("Failed to read font '{}': {}", path.display(), e))
    })?;
    FontArc::try_from_vec(data).map_err(|e| {
        ProcessError::Composition(format!("Invalid font '{}': {}", path.display(), e))
    })
}

/// First existing entry of the system font list.
pub fn discover_system_font() -> Option<PathBuf> {
    SYSTEM_FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, ProcessError> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| ProcessError::Composition(format!("Failed to encode PNG: {}", e)))?;
    Ok(buffer)
}

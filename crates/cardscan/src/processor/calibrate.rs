//! Card and photo region calibration.
//!
//! Reference crop coordinates were authored against a page rendered
//! `reference_width` pixels wide. The card rectangle is scaled by
//! `page_width / reference_width`; the photo rectangle is local to the card
//! crop and used as-is.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use serde::Serialize;

use crate::config::schema::{CalibrationConfig, RectConfig};
use crate::error::ProcessError;
use crate::processor::raster::RasterizedPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Scales every coordinate, rounding down to whole pixels.
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |v: u32| (v as f64 * factor).floor() as u32;
        Self {
            left: scale(self.left),
            top: scale(self.top),
            width: scale(self.width),
            height: scale(self.height),
        }
    }

    pub fn right(&self) -> u64 {
        self.left as u64 + self.width as u64
    }

    pub fn bottom(&self) -> u64 {
        self.top as u64 + self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if the rectangle lies entirely inside a `width` x `height` area.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width as u64 && self.bottom() <= height as u64
    }
}

impl From<RectConfig> for Rect {
    fn from(r: RectConfig) -> Self {
        Rect::new(r.left, r.top, r.width, r.height)
    }
}

/// Rectangles derived for one rasterized page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CardGeometry {
    pub scale_factor: f64,
    /// In page pixels.
    pub card: Rect,
    /// In card-crop pixels.
    pub photo: Rect,
}

/// Crops produced from a page.
#[derive(Debug, Clone)]
pub struct CardRegions {
    pub geometry: CardGeometry,
    pub card: DynamicImage,
    /// Photo resized to the presentation size.
    pub photo: RgbImage,
}

#[derive(Debug, Clone)]
pub struct RegionCalibrator {
    reference_width: u32,
    card: Rect,
    photo: Rect,
    photo_size: (u32, u32),
}

impl RegionCalibrator {
    pub fn new(config: &CalibrationConfig) -> Self {
        Self {
            reference_width: config.reference_width,
            card: config.card.into(),
            photo: config.photo.into(),
            photo_size: (config.photo_size.width, config.photo_size.height),
        }
    }

    pub fn photo_size(&self) -> (u32, u32) {
        self.photo_size
    }

    /// Computes the card and photo rectangles for a page of the given size.
    pub fn calibrate(&self, page_width: u32, page_height: u32) -> Result<CardGeometry, ProcessError> {
        if page_width == 0 || page_height == 0 {
            return Err(ProcessError::Calibration(format!(
                "Page has degenerate size {}x{}",
                page_width, page_height
            )));
        }
        if self.reference_width == 0 {
            return Err(ProcessError::Calibration(
                "Reference width must be positive".to_string(),
            ));
        }

        let scale_factor = page_width as f64 / self.reference_width as f64;
        let card = self.card.scaled(scale_factor);

        if card.is_empty() {
            return Err(ProcessError::Calibration(format!(
                "Card rectangle collapses at scale {:.4} (page width {})",
                scale_factor, page_width
            )));
        }
        if !card.fits_within(page_width, page_height) {
            return Err(ProcessError::Calibration(format!(
                "Card rectangle {:?} exceeds page bounds {}x{}",
                card, page_width, page_height
            )));
        }
        if !self.photo.fits_within(card.width, card.height) {
            return Err(ProcessError::Calibration(format!(
                "Photo rectangle {:?} exceeds card crop {}x{}",
                self.photo, card.width, card.height
            )));
        }

        Ok(CardGeometry {
            scale_factor,
            card,
            photo: self.photo,
        })
    }

    /// Calibrates against `page` and cuts out the card and the resized photo.
    pub fn crop(&self, page: &RasterizedPage) -> Result<CardRegions, ProcessError> {
        let _span = tracing::info_span!("processor.calibrate").entered();

        let geometry = self.calibrate(page.width, page.height)?;
        let card_rect = geometry.card;
        let card = page
            .image
            .crop_imm(card_rect.left, card_rect.top, card_rect.width, card_rect.height);

        let photo_rect = geometry.photo;
        let (photo_width, photo_height) = self.photo_size;
        let photo = card
            .crop_imm(photo_rect.left, photo_rect.top, photo_rect.width, photo_rect.height)
            .resize_to_fill(photo_width, photo_height, FilterType::Lanczos3)
            .to_rgb8();

        tracing::debug!(
            scale_factor = geometry.scale_factor,
            card_width = card.dimensions().0,
            card_height = card.dimensions().1,
            "Calibrated card region"
        );

        Ok(CardRegions {
            geometry,
            card,
            photo,
        })
    }
}

use dcwc_capture::{crop_region, PixelRect};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Roster grid geometry. Every field is required when supplied explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceConfig {
    pub columns: u32,
    pub rows: u32,
    /// Fraction of the screenshot width taken by the left sidebar
    pub sidebar_ratio: f64,
    /// Card width divided by card height
    pub card_aspect_ratio: f64,
    pub padding_px: u32,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            columns: 7,
            rows: 4,
            sidebar_ratio: 0.18,
            card_aspect_ratio: 1.0,
            padding_px: 5,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SliceConfigError {
    #[error("columns must be greater than zero")]
    NoColumns,
    #[error("rows must be greater than zero")]
    NoRows,
    #[error("sidebar_ratio must be in [0, 1), got {0}")]
    SidebarRatio(f64),
    #[error("card_aspect_ratio must be positive, got {0}")]
    AspectRatio(f64),
}

impl SliceConfig {
    pub fn validate(&self) -> Result<(), SliceConfigError> {
        if self.columns == 0 {
            return Err(SliceConfigError::NoColumns);
        }
        if self.rows == 0 {
            return Err(SliceConfigError::NoRows);
        }
        if !(0.0..1.0).contains(&self.sidebar_ratio) {
            return Err(SliceConfigError::SidebarRatio(self.sidebar_ratio));
        }
        if !(self.card_aspect_ratio > 0.0 && self.card_aspect_ratio.is_finite()) {
            return Err(SliceConfigError::AspectRatio(self.card_aspect_ratio));
        }
        Ok(())
    }
}

/// Card size and origin derived from a screenshot size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub sidebar_width: u32,
    pub card_width: u32,
    pub card_height: u32,
    pub start_x: u32,
    pub start_y: u32,
    pub stride_x: u32,
    pub stride_y: u32,
}

/// One grid cell that fits inside the screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardCell {
    pub row: u32,
    pub col: u32,
    pub rect: PixelRect,
}

pub fn grid_geometry(width: u32, config: &SliceConfig) -> GridGeometry {
    let sidebar_width = (width as f64 * config.sidebar_ratio).floor() as u32;
    let content_width = width.saturating_sub(sidebar_width) as u64;
    let padding = config.padding_px as u64;
    let gutters = padding * (config.columns as u64 + 1);

    let card_width = (content_width.saturating_sub(gutters) / config.columns.max(1) as u64) as u32;
    let card_height = (card_width as f64 / config.card_aspect_ratio).floor() as u32;

    GridGeometry {
        sidebar_width,
        card_width,
        card_height,
        start_x: sidebar_width.saturating_add(config.padding_px),
        start_y: config.padding_px,
        stride_x: card_width.saturating_add(config.padding_px),
        stride_y: card_height.saturating_add(config.padding_px),
    }
}

/// Grid cells in row-major order, skipping any cell that would leave the screenshot
pub fn card_cells(width: u32, height: u32, config: &SliceConfig) -> Vec<CardCell> {
    let geo = grid_geometry(width, config);
    if geo.card_width == 0 || geo.card_height == 0 {
        debug!("Card size collapsed to {}x{}, nothing to slice", geo.card_width, geo.card_height);
        return Vec::new();
    }

    let rows = config
        .rows
        .min(cells_that_fit(height, geo.start_y, geo.card_height, geo.stride_y));
    let columns = config
        .columns
        .min(cells_that_fit(width, geo.start_x, geo.card_width, geo.stride_x));
    if rows < config.rows || columns < config.columns {
        debug!(
            "Only {}x{} of the {}x{} grid fits in {}x{}, skipping the rest",
            columns, rows, config.columns, config.rows, width, height
        );
    }

    let mut cells = Vec::with_capacity(rows as usize * columns as usize);
    for row in 0..rows {
        for col in 0..columns {
            let rect = PixelRect::new(
                geo.start_x + col * geo.stride_x,
                geo.start_y + row * geo.stride_y,
                geo.card_width,
                geo.card_height,
            );
            cells.push(CardCell { row, col, rect });
        }
    }
    cells
}

/// How many cells of `size` spaced `stride` apart fit in `extent` starting at `start`
fn cells_that_fit(extent: u32, start: u32, size: u32, stride: u32) -> u32 {
    let (extent, start, size, stride) = (extent as u64, start as u64, size as u64, stride.max(1) as u64);
    if start + size > extent {
        return 0;
    }
    ((extent - start - size) / stride + 1).min(u32::MAX as u64) as u32
}

/// Cut a roster screenshot into independently owned card images, row-major
pub fn slice_roster(screenshot: &RgbaImage, config: &SliceConfig) -> Vec<RgbaImage> {
    let (w, h) = screenshot.dimensions();
    let geo = grid_geometry(w, config);
    debug!(
        "Slicing {}x{}: sidebar={}px card={}x{} grid={}x{} padding={}",
        w, h, geo.sidebar_width, geo.card_width, geo.card_height, config.columns, config.rows, config.padding_px
    );

    let cards: Vec<RgbaImage> = card_cells(w, h, config)
        .iter()
        .map(|cell| crop_region(screenshot, &cell.rect))
        .collect();

    debug!("Extracted {} of {} cards", cards.len(), config.rows.saturating_mul(config.columns));
    cards
}

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// Largest RGB Euclidean distance between two pixels, sqrt(3 * 255^2) rounded
const MAX_RGB_DISTANCE: f64 = 441.0;

/// Share of each side kept by the center crop
const CENTER_CROP_FRACTION: f64 = 0.6;
/// Both crops are downsampled to this before comparing
const CENTER_CROP_SIZE: u32 = 24;
const CENTER_CROP_STEP: usize = 2;

const WHOLE_IMAGE_SIZE: u32 = 100;

const WEIGHTED_SIZE: u32 = 48;
/// Weight at the corners relative to the center
const WEIGHTED_EDGE_FALLOFF: f64 = 0.5;

/// Same size the shop-icon matcher used for NCC
const NCC_SIZE: u32 = 48;
const NCC_MIN_STD: f64 = 1e-6;

/// An image reduced to the form one strategy compares.
/// Templates keep theirs, so each portrait is downsampled once.
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// Zero-sized input; compares as 0 against anything
    Empty,
    Color(RgbaImage),
    Gray { image: GrayImage, mean: f64, std_dev: f64 },
}

/// A pairwise image similarity in [0, 1].
/// Implementations must be symmetric and return 1.0 for identical inputs.
pub trait SimilarityStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn prepare(&self, image: &RgbaImage) -> Prepared;

    /// Compare two images produced by this strategy's `prepare`
    fn compare(&self, a: &Prepared, b: &Prepared) -> f64;

    fn similarity(&self, a: &RgbaImage, b: &RgbaImage) -> f64 {
        self.compare(&self.prepare(a), &self.prepare(b))
    }
}

/// Which strategy the matcher uses; chosen in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    CenterCrop,
    WholeImage,
    CenterWeighted,
    NormalizedCrossCorrelation,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::CenterCrop,
        StrategyKind::WholeImage,
        StrategyKind::CenterWeighted,
        StrategyKind::NormalizedCrossCorrelation,
    ];

    pub fn build(self) -> Box<dyn SimilarityStrategy> {
        match self {
            StrategyKind::CenterCrop => Box::new(CenterCrop),
            StrategyKind::WholeImage => Box::new(WholeImage),
            StrategyKind::CenterWeighted => Box::new(CenterWeighted),
            StrategyKind::NormalizedCrossCorrelation => Box::new(NormalizedCrossCorrelation),
        }
    }

    /// Stateless instance, for callers that only need to prepare images
    pub fn strategy(self) -> &'static dyn SimilarityStrategy {
        match self {
            StrategyKind::CenterCrop => &CenterCrop,
            StrategyKind::WholeImage => &WholeImage,
            StrategyKind::CenterWeighted => &CenterWeighted,
            StrategyKind::NormalizedCrossCorrelation => &NormalizedCrossCorrelation,
        }
    }

    /// Position in [`StrategyKind::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Canonical strategy: compare the middle 60% of both images, where the
/// portrait sits, ignoring frame and badge overlays around the edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct CenterCrop;

impl SimilarityStrategy for CenterCrop {
    fn name(&self) -> &'static str {
        "center_crop"
    }

    fn prepare(&self, image: &RgbaImage) -> Prepared {
        if is_empty(image) {
            return Prepared::Empty;
        }
        Prepared::Color(resized(&center_crop(image), CENTER_CROP_SIZE))
    }

    fn compare(&self, a: &Prepared, b: &Prepared) -> f64 {
        let Some((a, b)) = color_pair(a, b, CENTER_CROP_SIZE) else {
            return 0.0;
        };

        let mut total = 0.0;
        let mut samples = 0u32;
        for y in (0..CENTER_CROP_SIZE).step_by(CENTER_CROP_STEP) {
            for x in (0..CENTER_CROP_SIZE).step_by(CENTER_CROP_STEP) {
                total += rgb_distance(a.get_pixel(x, y), b.get_pixel(x, y));
                samples += 1;
            }
        }
        distance_to_similarity(total, samples as f64)
    }
}

/// Full-frame pixel compare at 100x100
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeImage;

impl SimilarityStrategy for WholeImage {
    fn name(&self) -> &'static str {
        "whole_image"
    }

    fn prepare(&self, image: &RgbaImage) -> Prepared {
        if is_empty(image) {
            return Prepared::Empty;
        }
        Prepared::Color(resized(image, WHOLE_IMAGE_SIZE))
    }

    fn compare(&self, a: &Prepared, b: &Prepared) -> f64 {
        let Some((a, b)) = color_pair(a, b, WHOLE_IMAGE_SIZE) else {
            return 0.0;
        };
        let total: f64 = a
            .pixels()
            .zip(b.pixels())
            .map(|(pa, pb)| rgb_distance(pa, pb))
            .sum();
        distance_to_similarity(total, (WHOLE_IMAGE_SIZE * WHOLE_IMAGE_SIZE) as f64)
    }
}

/// Whole frame, with pixel differences weighted down linearly towards the corners
#[derive(Debug, Clone, Copy, Default)]
pub struct CenterWeighted;

impl SimilarityStrategy for CenterWeighted {
    fn name(&self) -> &'static str {
        "center_weighted"
    }

    fn prepare(&self, image: &RgbaImage) -> Prepared {
        if is_empty(image) {
            return Prepared::Empty;
        }
        Prepared::Color(resized(image, WEIGHTED_SIZE))
    }

    fn compare(&self, a: &Prepared, b: &Prepared) -> f64 {
        let Some((a, b)) = color_pair(a, b, WEIGHTED_SIZE) else {
            return 0.0;
        };

        let center = (WEIGHTED_SIZE as f64 - 1.0) / 2.0;
        let max_dist = (2.0 * center * center).sqrt();

        let mut total = 0.0;
        let mut weight_sum = 0.0;
        for y in 0..WEIGHTED_SIZE {
            for x in 0..WEIGHTED_SIZE {
                let dx = x as f64 - center;
                let dy = y as f64 - center;
                let weight = 1.0 - WEIGHTED_EDGE_FALLOFF * (dx * dx + dy * dy).sqrt() / max_dist;
                total += weight * rgb_distance(a.get_pixel(x, y), b.get_pixel(x, y));
                weight_sum += weight;
            }
        }
        distance_to_similarity(total, weight_sum)
    }
}

/// Zero-mean normalized cross-correlation on grayscale, mapped from [-1, 1] to [0, 1]
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedCrossCorrelation;

impl SimilarityStrategy for NormalizedCrossCorrelation {
    fn name(&self) -> &'static str {
        "ncc"
    }

    fn prepare(&self, image: &RgbaImage) -> Prepared {
        if is_empty(image) {
            return Prepared::Empty;
        }
        let image = imageops::resize(&imageops::grayscale(image), NCC_SIZE, NCC_SIZE, FilterType::Triangle);
        let (mean, std_dev) = compute_stats(&image);
        Prepared::Gray { image, mean, std_dev }
    }

    fn compare(&self, a: &Prepared, b: &Prepared) -> f64 {
        let (
            Prepared::Gray {
                image: a,
                mean: a_mean,
                std_dev: a_std,
            },
            Prepared::Gray {
                image: b,
                mean: b_mean,
                std_dev: b_std,
            },
        ) = (a, b)
        else {
            return 0.0;
        };
        if a.dimensions() != (NCC_SIZE, NCC_SIZE) || b.dimensions() != (NCC_SIZE, NCC_SIZE) {
            return 0.0;
        }

        // Flat images have no correlation to speak of; compare brightness instead
        match (*a_std < NCC_MIN_STD, *b_std < NCC_MIN_STD) {
            (true, true) => return 1.0 - (a_mean - b_mean).abs() / 255.0,
            (true, false) | (false, true) => return 0.0,
            (false, false) => {}
        }

        let n = (NCC_SIZE * NCC_SIZE) as f64;
        let cross: f64 = a
            .pixels()
            .zip(b.pixels())
            .map(|(pa, pb)| (pa[0] as f64 - a_mean) * (pb[0] as f64 - b_mean))
            .sum();
        let ncc = cross / (n * a_std * b_std);
        ((ncc + 1.0) / 2.0).clamp(0.0, 1.0)
    }
}

fn is_empty(img: &RgbaImage) -> bool {
    img.width() == 0 || img.height() == 0
}

/// Both sides as colour images of `size`x`size`
fn color_pair<'a>(a: &'a Prepared, b: &'a Prepared, size: u32) -> Option<(&'a RgbaImage, &'a RgbaImage)> {
    match (a, b) {
        (Prepared::Color(a), Prepared::Color(b))
            if a.dimensions() == (size, size) && b.dimensions() == (size, size) =>
        {
            Some((a, b))
        }
        _ => None,
    }
}

/// Middle 60% of each side, where the portrait sits on a card
pub fn center_crop(img: &RgbaImage) -> RgbaImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return RgbaImage::new(0, 0);
    }
    let cw = ((w as f64 * CENTER_CROP_FRACTION) as u32).max(1);
    let ch = ((h as f64 * CENTER_CROP_FRACTION) as u32).max(1);
    imageops::crop_imm(img, (w - cw) / 2, (h - ch) / 2, cw, ch).to_image()
}

fn resized(img: &RgbaImage, size: u32) -> RgbaImage {
    if img.dimensions() == (size, size) {
        return img.clone();
    }
    imageops::resize(img, size, size, FilterType::Triangle)
}

fn rgb_distance(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> f64 {
    let dr = a[0] as f64 - b[0] as f64;
    let dg = a[1] as f64 - b[1] as f64;
    let db = a[2] as f64 - b[2] as f64;
    (dr * dr + dg * dg + db * db).sqrt()
}

fn distance_to_similarity(total: f64, samples: f64) -> f64 {
    if samples <= 0.0 {
        return 0.0;
    }
    (1.0 - total / (MAX_RGB_DISTANCE * samples)).clamp(0.0, 1.0)
}

/// Mean and standard deviation of pixel values
fn compute_stats(img: &GrayImage) -> (f64, f64) {
    let pixels: Vec<f64> = img.pixels().map(|p| p[0] as f64).collect();
    let n = pixels.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = pixels.iter().sum::<f64>() / n;
    let variance = pixels.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

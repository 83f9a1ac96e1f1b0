use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Side of the brightness grid for the default hash
pub const HASH_GRID: u32 = 8;

/// Average hash: one bit per grid cell, set when the cell is brighter than the mean.
/// Bit `i` is cell `i` in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerceptualHash {
    bits: u64,
    grid: u32,
}

#[derive(Debug, Error, PartialEq)]
pub enum HashParseError {
    #[error("expected 16 hex digits, got {0:?}")]
    Length(String),
    #[error("invalid hex digits in {0:?}")]
    Digits(String),
}

impl PerceptualHash {
    pub fn compute(image: &RgbaImage) -> Self {
        Self::with_grid(image, HASH_GRID)
    }

    /// Hash on a custom grid (1..=8 cells per side so the bits fit in a u64)
    pub fn with_grid(image: &RgbaImage, grid: u32) -> Self {
        let grid = grid.clamp(1, HASH_GRID);
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Self { bits: 0, grid };
        }

        let small = imageops::resize(image, grid, grid, FilterType::Triangle);
        let gray = imageops::grayscale(&small);

        let values: Vec<f64> = gray.pixels().map(|p| p[0] as f64).collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;

        let bits = values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > mean)
            .fold(0u64, |acc, (i, _)| acc | (1u64 << i));

        Self { bits, grid }
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn grid(&self) -> u32 {
        self.grid
    }

    /// Number of differing bits; `u32::MAX` when grid sizes differ
    pub fn hamming_distance(&self, other: &PerceptualHash) -> u32 {
        if self.grid != other.grid {
            return u32::MAX;
        }
        (self.bits ^ other.bits).count_ones()
    }

    /// `1 - hamming / cells`; 0 for incomparable hashes
    pub fn fast_similarity(&self, other: &PerceptualHash) -> f64 {
        let distance = self.hamming_distance(other);
        if distance == u32::MAX {
            return 0.0;
        }
        1.0 - distance as f64 / (self.grid * self.grid) as f64
    }
}

/// 16 upper-case hex digits, the format hashes are stored in
impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.bits)
    }
}

impl FromStr for PerceptualHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 {
            return Err(HashParseError::Length(s.to_string()));
        }
        let bits = u64::from_str_radix(s, 16).map_err(|_| HashParseError::Digits(s.to_string()))?;
        Ok(Self {
            bits,
            grid: HASH_GRID,
        })
    }
}

pub mod assets;
pub mod decode;

pub use assets::{portrait_asset, portrait_path, AssetSource, DirectorySource, MemorySource};
pub use decode::{decode_bytes, decode_data_url, encode_data_url, load_image, DecodeError};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Pixel rectangle inside a screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when the whole rectangle lies inside a `width` x `height` image
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let right = self.x as u64 + self.width as u64;
        let bottom = self.y as u64 + self.height as u64;
        right <= width as u64 && bottom <= height as u64
    }
}

/// Copy a region out of a frame. The region is clamped to the frame bounds,
/// so the result may be smaller than requested (or empty).
pub fn crop_region(frame: &RgbaImage, region: &PixelRect) -> RgbaImage {
    let (w, h) = (frame.width(), frame.height());

    let x = region.x.min(w);
    let y = region.y.min(h);
    let rw = region.width.min(w - x);
    let rh = region.height.min(h - y);

    image::imageops::crop_imm(frame, x, y, rw, rh).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_region() {
        let img = RgbaImage::new(1920, 1080);
        let cropped = crop_region(&img, &PixelRect::new(960, 540, 192, 108));
        assert_eq!(cropped.width(), 192);
        assert_eq!(cropped.height(), 108);
    }

    #[test]
    fn test_crop_region_clamps() {
        let img = RgbaImage::new(100, 50);
        let cropped = crop_region(&img, &PixelRect::new(80, 40, 50, 50));
        assert_eq!(cropped.dimensions(), (20, 10));

        let outside = crop_region(&img, &PixelRect::new(200, 200, 10, 10));
        assert_eq!(outside.dimensions(), (0, 0));
    }

    #[test]
    fn test_crop_copies_pixels() {
        let img = RgbaImage::from_fn(10, 10, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
        let cropped = crop_region(&img, &PixelRect::new(3, 4, 2, 2));
        assert_eq!(cropped.get_pixel(0, 0), &image::Rgba([3, 4, 0, 255]));
        assert_eq!(cropped.get_pixel(1, 1), &image::Rgba([4, 5, 0, 255]));
    }

    #[test]
    fn test_fits_within() {
        assert!(PixelRect::new(0, 0, 100, 50).fits_within(100, 50));
        assert!(!PixelRect::new(1, 0, 100, 50).fits_within(100, 50));
        assert!(!PixelRect::new(u32::MAX, 0, 2, 1).fits_within(100, 50));
    }
}

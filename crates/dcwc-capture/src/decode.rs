use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Failure to turn one asset into pixels. Affects only that asset.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("image data is empty")]
    Empty,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unsupported or corrupt image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Decode a `data:image/<fmt>;base64,<payload>` string.
/// Everything up to and including the first comma is dropped; a string
/// without a comma is treated as a bare base64 payload.
pub fn decode_data_url(data_url: &str) -> Result<RgbaImage, DecodeError> {
    let payload = match data_url.find(',') {
        Some(i) => &data_url[i + 1..],
        None => data_url,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(DecodeError::Empty);
    }

    let bytes = STANDARD.decode(compact.as_bytes())?;
    decode_bytes(&bytes)
}

/// Decode an encoded image (PNG, JPEG, ...) from raw bytes
pub fn decode_bytes(bytes: &[u8]) -> Result<RgbaImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let img = image::load_from_memory(bytes)?.to_rgba8();
    debug!("Decoded image {}x{}", img.width(), img.height());
    Ok(img)
}

/// Read and decode an image file
pub fn load_image(path: &Path) -> Result<RgbaImage, DecodeError> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
        path: path.display().to_string(),
        source,
    })?;
    decode_bytes(&bytes)
}

/// Render an image as a PNG data URL, e.g. for card previews
pub fn encode_data_url(image: &RgbaImage) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&buf)))
}

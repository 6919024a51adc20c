//! Image transport boundary.
//!
//! Images cross the engine boundary as `{base64-encoded bytes, mime type}`
//! and are decoded to pixel buffers exactly once, at load time.  Everything
//! inside the engine works on raw [`RgbaImage`] buffers.

use std::io::Cursor;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, ImageOutputFormat, RgbaImage};

use crate::geometry::BoundingBox;

/// Error type for image decode/encode at the transport boundary.
#[derive(Debug)]
pub enum DecodeError {
    Base64(String),
    Image(String),
    UnsupportedMime(String),
    Io(std::io::Error),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Base64(e) => write!(f, "Base64 error: {}", e),
            DecodeError::Image(e) => write!(f, "Image error: {}", e),
            DecodeError::UnsupportedMime(m) => write!(f, "Unsupported mime type: {}", m),
            DecodeError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        DecodeError::Io(e)
    }
}

impl From<image::ImageError> for DecodeError {
    fn from(e: image::ImageError) -> Self {
        DecodeError::Image(e.to_string())
    }
}

/// A decoded source image plus the mime type it arrived with.
///
/// Immutable once loaded: editors and the compositor only ever read it, and
/// loading a replacement goes through the owning session so dependent state
/// (mask, history, box) can be reset.
#[derive(Clone, Debug)]
pub struct SourceImage {
    pub pixels: RgbaImage,
    pub mime_type: String,
}

impl SourceImage {
    pub fn new(pixels: RgbaImage, mime_type: impl Into<String>) -> Self {
        Self {
            pixels,
            mime_type: mime_type.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Decode a base64 payload.  No partial state: on error the caller's
    /// previous image remains untouched.
    pub fn from_base64(data: &str, mime_type: &str) -> Result<Self, DecodeError> {
        let bytes = general_purpose::STANDARD
            .decode(data)
            .map_err(|e| DecodeError::Base64(e.to_string()))?;
        let img = image::load_from_memory(&bytes)?;
        Ok(Self::new(img.to_rgba8(), mime_type))
    }

    /// Encode back to the stored mime type (PNG or JPEG).
    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        let format = match self.mime_type.as_str() {
            "image/png" => ImageOutputFormat::Png,
            "image/jpeg" => ImageOutputFormat::Jpeg(90),
            other => return Err(DecodeError::UnsupportedMime(other.to_string())),
        };
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(self.pixels.clone()).write_to(&mut buf, format)?;
        Ok(buf.into_inner())
    }

    pub fn to_base64(&self) -> Result<String, DecodeError> {
        Ok(general_purpose::STANDARD.encode(self.encode()?))
    }

    /// Load from disk, mime inferred from the extension.
    pub fn from_path(path: &Path) -> Result<Self, DecodeError> {
        let img = image::open(path)?;
        Ok(Self::new(img.to_rgba8(), mime_for_extension(path)))
    }

    /// Save to disk, format inferred from the extension by the image crate.
    pub fn save_to_path(&self, path: &Path) -> Result<(), DecodeError> {
        DynamicImage::ImageRgba8(self.pixels.clone()).save(path)?;
        Ok(())
    }

    /// Copy out the sub-image covered by `bounds` (clipped to the image).
    pub fn crop(&self, bounds: &BoundingBox) -> SourceImage {
        let (x, y, w, h) = bounds.to_pixel_rect(self.width(), self.height());
        let cropped = image::imageops::crop_imm(&self.pixels, x, y, w, h).to_image();
        SourceImage::new(cropped, self.mime_type.clone())
    }
}

fn mime_for_extension(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "image/png",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        })
    }

    #[test]
    fn base64_round_trip_preserves_pixels() {
        let original = SourceImage::new(checker(8, 6), "image/png");
        let encoded = original.to_base64().unwrap();
        let decoded = SourceImage::from_base64(&encoded, "image/png").unwrap();
        assert_eq!(decoded.pixels, original.pixels);
        assert_eq!(decoded.mime_type, "image/png");
    }

    #[test]
    fn malformed_base64_is_rejected() {
        let err = SourceImage::from_base64("not@valid@base64!", "image/png");
        assert!(matches!(err, Err(DecodeError::Base64(_))));
    }

    #[test]
    fn garbage_bytes_fail_image_decode() {
        let payload = general_purpose::STANDARD.encode(b"definitely not an image");
        let err = SourceImage::from_base64(&payload, "image/png");
        assert!(matches!(err, Err(DecodeError::Image(_))));
    }

    #[test]
    fn crop_returns_exact_box() {
        let src = SourceImage::new(checker(32, 32), "image/png");
        let crop = src.crop(&BoundingBox::new(4.0, 8.0, 16.0, 12.0));
        assert_eq!((crop.width(), crop.height()), (16, 12));
        assert_eq!(
            crop.pixels.get_pixel(0, 0),
            src.pixels.get_pixel(4, 8)
        );
    }
}

//! Image normalization for embeds.
//!
//! Embeds must be JPEG, no larger than [`MAX_DIMENSION`] on either side and
//! within a byte budget. Quality is stepped down until the budget is met or
//! the floor is reached; an image still over budget at the floor is returned
//! anyway with `over_budget` set, and it is up to the server to reject it.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use tracing::{debug, warn};

use crate::error::{CoreError, Result};

/// Default upload budget: 1 MiB.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 1_048_576;

/// Largest width or height kept after downscaling.
pub const MAX_DIMENSION: u32 = 4096;

const START_QUALITY: u8 = 70;
const MIN_QUALITY: u8 = 30;
const QUALITY_STEP: u8 = 5;

pub const JPEG_MIME: &str = "image/jpeg";

/// Result of preparing an image for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    /// Quality of the final encode
    pub quality: u8,
    pub over_budget: bool,
}

/// Re-encodes source images into something embeddable.
pub trait ImageCompressor: Send + Sync {
    /// `name` is only used for diagnostics.
    fn prepare(&self, name: &str, source: &[u8], max_bytes: usize) -> Result<PreparedImage>;
}

/// JPEG re-encoder backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCompressor;

impl JpegCompressor {
    fn flatten(img: DynamicImage) -> DynamicImage {
        match img {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => img,
            // alpha, palette-expanded and high bit depth images become plain RGB
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        }
    }

    fn encode(img: &DynamicImage, quality: u8) -> std::result::Result<Vec<u8>, image::ImageError> {
        let mut buffer = Vec::new();
        img.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;
        Ok(buffer)
    }
}

impl ImageCompressor for JpegCompressor {
    fn prepare(&self, name: &str, source: &[u8], max_bytes: usize) -> Result<PreparedImage> {
        let img = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| CoreError::media_failure(name, e))?
            .decode()
            .map_err(|e| CoreError::media_failure(name, e))?;

        let mut img = Self::flatten(img);

        let (width, height) = (img.width(), img.height());
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            img = img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3);
            debug!(
                "Downscaled {}: {}x{} -> {}x{}",
                name,
                width,
                height,
                img.width(),
                img.height()
            );
        }

        let mut quality = START_QUALITY;
        loop {
            let bytes = Self::encode(&img, quality).map_err(|e| CoreError::media_failure(name, e))?;
            debug!("Encoded {} at quality {}: {} bytes", name, quality, bytes.len());

            let fits = bytes.len() <= max_bytes;
            if fits || quality < MIN_QUALITY + QUALITY_STEP {
                if !fits {
                    warn!(
                        "{} is still {} bytes at quality {} (budget {}), uploading anyway",
                        name,
                        bytes.len(),
                        quality,
                        max_bytes
                    );
                }
                return Ok(PreparedImage {
                    bytes,
                    mime_type: JPEG_MIME,
                    quality,
                    over_budget: !fits,
                });
            }
            quality -= QUALITY_STEP;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32, noisy: bool) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            if noisy {
                let v = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) as u8;
                Rgba([v, v.wrapping_mul(3), v.wrapping_add(x as u8), 128])
            } else {
                Rgba([200, 10, 10, 255])
            }
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_alpha_png_becomes_jpeg() {
        let prepared = JpegCompressor
            .prepare("red.png", &png_bytes(32, 16, false), DEFAULT_MAX_IMAGE_BYTES)
            .unwrap();

        assert_eq!(prepared.mime_type, "image/jpeg");
        assert_eq!(prepared.quality, 70);
        assert!(!prepared.over_budget);
        // JPEG SOI marker
        assert_eq!(&prepared.bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&prepared.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
    }

    #[test]
    fn test_quality_steps_down_to_floor() {
        let prepared = JpegCompressor
            .prepare("noise.png", &png_bytes(256, 256, true), 1)
            .unwrap();

        assert!(prepared.over_budget);
        assert_eq!(prepared.quality, MIN_QUALITY);
    }

    #[test]
    fn test_oversized_image_is_downscaled() {
        let prepared = JpegCompressor
            .prepare("wide.png", &png_bytes(MAX_DIMENSION * 2, 8, false), DEFAULT_MAX_IMAGE_BYTES)
            .unwrap();
        let decoded = image::load_from_memory(&prepared.bytes).unwrap();
        assert_eq!(decoded.width(), MAX_DIMENSION);
        assert!(decoded.height() <= 8);
    }

    #[test]
    fn test_garbage_is_media_failure() {
        let err = JpegCompressor
            .prepare("junk.jpg", b"not an image", DEFAULT_MAX_IMAGE_BYTES)
            .unwrap_err();
        assert!(matches!(err, CoreError::MediaFailure { ref reference, .. } if reference == "junk.jpg"));
        assert!(!err.is_fatal());
    }
}

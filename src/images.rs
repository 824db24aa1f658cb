//! Image preparation for the vision models.
//!
//! Uploads arrive in any format and size; CLIP expects a square frame, so
//! images are scaled to cover the frame, centre-cropped, and re-encoded as PNG.

use anyhow::{Context, Result};
use image::{GenericImageView, ImageFormat};

/// Square input size of the CLIP ViT-B/32 vision tower.
pub const MODEL_INPUT_SIZE: u32 = 224;

/// Result of image preparation
#[derive(Debug)]
pub struct PreparedImage {
    /// Prepared image data (PNG format)
    pub data: Vec<u8>,
    /// Original image dimensions (width, height)
    pub original_dimensions: (u32, u32),
    /// Format the upload was decoded from, if recognised
    pub original_format: Option<ImageFormat>,
}

/// Resize an image to `size`×`size` with cover fit and encode it as PNG.
///
/// Smaller images are enlarged; the longer side is cropped evenly from both
/// ends so the subject stays centred.
pub fn prepare_for_model(data: &[u8], size: u32) -> Result<PreparedImage> {
    let original_format = detect_format(data);
    let img = image::load_from_memory(data).context("Failed to decode image")?;
    let original_dimensions = img.dimensions();

    let processed = if original_dimensions == (size, size) {
        img
    } else {
        img.resize_to_fill(size, size, image::imageops::FilterType::Lanczos3)
    };

    let rgb = processed.to_rgb8();
    let mut buf = Vec::new();
    rgb.write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
        .context("Failed to encode PNG")?;

    log::debug!(
        "prepared {}x{} image as {size}x{size} PNG ({}KB)",
        original_dimensions.0,
        original_dimensions.1,
        buf.len() / 1024
    );

    Ok(PreparedImage {
        data: buf,
        original_dimensions,
        original_format,
    })
}

/// Detect image format from bytes
pub fn detect_format(data: &[u8]) -> Option<ImageFormat> {
    image::guess_format(data).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dimensions_of(data: &[u8]) -> (u32, u32) {
        image::load_from_memory(data).unwrap().dimensions()
    }

    fn create_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });

        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn test_prepare_landscape_image() {
        let png = create_png(640, 480);
        let prepared = prepare_for_model(&png, MODEL_INPUT_SIZE).unwrap();

        assert_eq!(prepared.original_dimensions, (640, 480));
        assert_eq!(prepared.original_format, Some(ImageFormat::Png));
        assert_eq!(dimensions_of(&prepared.data), (224, 224));
        assert_eq!(detect_format(&prepared.data), Some(ImageFormat::Png));
    }

    #[test]
    fn test_prepare_enlarges_small_image() {
        let png = create_png(10, 30);
        let prepared = prepare_for_model(&png, MODEL_INPUT_SIZE).unwrap();
        assert_eq!(dimensions_of(&prepared.data), (224, 224));
    }

    #[test]
    fn test_prepare_jpeg_input() {
        let img = image::RgbImage::from_pixel(300, 200, image::Rgb([10, 200, 30]));
        let mut jpeg = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();

        let prepared = prepare_for_model(&jpeg, MODEL_INPUT_SIZE).unwrap();
        assert_eq!(prepared.original_format, Some(ImageFormat::Jpeg));
        assert_eq!(dimensions_of(&prepared.data), (224, 224));
    }

    #[test]
    fn test_prepare_invalid_data_fails() {
        let garbage = vec![1, 2, 3, 4, 5];
        assert!(prepare_for_model(&garbage, MODEL_INPUT_SIZE).is_err());
    }

    #[test]
    fn test_detect_format_unknown() {
        assert_eq!(detect_format(&[0, 1, 2]), None);
    }
}

//! Encoding of exported artifacts and their file names.

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::composite::flatten;
use crate::raster::Color;

pub const DEFAULT_QUALITY: f32 = 0.9;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: canvas is {0}x{1}")]
    Empty(u32, u32),
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Encode `image` as `format`. `quality` in (0, 1] only affects JPEG, which
/// has no alpha channel and is flattened onto black first.
pub fn encode(image: &RgbaImage, format: ExportFormat, quality: f32) -> Result<Vec<u8>, ExportError> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(ExportError::Empty(w, h));
    }

    let mut buf = Vec::new();
    match format {
        ExportFormat::Png => {
            PngEncoder::new(&mut buf).write_image(image.as_raw(), w, h, ColorType::Rgba8)?;
        }
        ExportFormat::Jpeg => {
            let rgb = flatten(image, Color::BLACK);
            let q = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
            JpegEncoder::new_with_quality(&mut buf, q).encode(rgb.as_raw(), w, h, ColorType::Rgb8)?;
        }
    }
    Ok(buf)
}

/// File-name safe UTC timestamp, e.g. `2024-05-01T09-30-00`.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S").to_string()
}

pub fn image_file_name(format: ExportFormat, now: DateTime<Utc>) -> String {
    format!("ocr-canvas-{}.{}", timestamp(now), format.extension())
}

pub fn text_file_name(now: DateTime<Utc>) -> String {
    format!("ocr-text-{}.txt", timestamp(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgba;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap()
    }

    #[test]
    fn file_names_carry_timestamp() {
        assert_eq!(
            image_file_name(ExportFormat::Png, fixed_time()),
            "ocr-canvas-2024-03-07T14-05-09.png"
        );
        assert_eq!(
            image_file_name(ExportFormat::Jpeg, fixed_time()),
            "ocr-canvas-2024-03-07T14-05-09.jpg"
        );
        assert_eq!(text_file_name(fixed_time()), "ocr-text-2024-03-07T14-05-09.txt");
    }

    #[test]
    fn png_decodes_back_to_same_pixels() {
        let image = RgbaImage::from_pixel(3, 2, Rgba([10, 200, 30, 128]));
        let bytes = encode(&image, ExportFormat::Png, DEFAULT_QUALITY).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, image);
    }

    #[test]
    fn jpeg_is_decodable() {
        let image = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]));
        let bytes = encode(&image, ExportFormat::Jpeg, 0.8).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
    }

    #[test]
    fn empty_canvas_is_rejected() {
        let image = RgbaImage::new(0, 10);
        assert!(matches!(
            encode(&image, ExportFormat::Png, DEFAULT_QUALITY),
            Err(ExportError::Empty(0, 10))
        ));
    }
}

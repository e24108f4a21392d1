//! Downscaling of uploaded site photos before they leave the process.
//!
//! Site photos are usually far larger than the model needs. Capping both
//! sides at [`MAX_DIMENSION`] bounds the request payload and token cost.

use base64::{engine::general_purpose, Engine as _};
use image::{imageops::FilterType, DynamicImage, ImageFormat, ImageOutputFormat};
use std::io::Cursor;
use tracing::debug;

use crate::error::ImageError;

pub const MAX_DIMENSION: u32 = 512;

const JPEG_QUALITY: u8 = 85;

/// An uploaded image, decoded, bounded to 512x512 and re-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

impl PreparedImage {
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }
}

pub fn prepare_image(data: &[u8]) -> Result<PreparedImage, ImageError> {
    let format = image::guess_format(data).map_err(ImageError::InvalidImage)?;
    let (output, mime_type) = match format {
        ImageFormat::Jpeg => (ImageOutputFormat::Jpeg(JPEG_QUALITY), "image/jpeg"),
        ImageFormat::Png => (ImageOutputFormat::Png, "image/png"),
        other => return Err(ImageError::UnsupportedFormat(format!("{:?}", other))),
    };

    let img = image::load_from_memory_with_format(data, format).map_err(ImageError::InvalidImage)?;
    let img = fit_within(img, MAX_DIMENSION);

    // JPEG has no alpha channel
    let img = match output {
        ImageOutputFormat::Jpeg(_) => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img,
    };

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), output)
        .map_err(ImageError::Encode)?;

    Ok(PreparedImage {
        bytes,
        mime_type,
        width: img.width(),
        height: img.height(),
    })
}

/// Shrinks `img` so neither side exceeds `max`. Smaller images pass through.
fn fit_within(img: DynamicImage, max: u32) -> DynamicImage {
    if img.width() <= max && img.height() <= max {
        return img;
    }
    let resized = img.resize(max, max, FilterType::Lanczos3);
    debug!(
        "Downscaled image from {}x{} to {}x{}",
        img.width(),
        img.height(),
        resized.width(),
        resized.height()
    );
    resized
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

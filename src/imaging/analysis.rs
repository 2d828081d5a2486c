//! Image inspection: decode an encoded payload into metadata and derive
//! quality scores from its pixels.

use image::{DynamicImage, GrayImage, ImageFormat};
use std::io::Cursor;

use super::types::{ImageMetadata, QualityMetrics};
use crate::error::{WebPerfectError, WebPerfectResult};

/// Longest side of the working copy used for metric computation
const ASSESS_MAX_SIDE: u32 = 512;

/// JPEG block size used by the artifact measurement
const BLOCK: u32 = 8;

/// Lowercase canonical name for a decoded format
pub fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        other => format!("{:?}", other).to_lowercase(),
    }
}

/// Decode `bytes` and describe the result
///
/// # Errors
/// Returns [`WebPerfectError::UnsupportedFormat`] when the payload is empty
/// or its format cannot be recognised, and [`WebPerfectError::Image`] when
/// decoding fails.
pub fn describe(bytes: &[u8]) -> WebPerfectResult<(DynamicImage, ImageMetadata)> {
    if bytes.is_empty() {
        return Err(WebPerfectError::UnsupportedFormat(
            "empty image payload".to_string(),
        ));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| WebPerfectError::UnsupportedFormat(e.to_string()))?;
    let image = image::load_from_memory_with_format(bytes, format)?;

    let color = image.color();
    let metadata = ImageMetadata {
        width: image.width(),
        height: image.height(),
        format: format_name(format),
        size: bytes.len() as u64,
        color_space: Some(if color.has_color() { "srgb" } else { "gray" }.to_string()),
        has_alpha: Some(color.has_alpha()),
        quality: None,
    };

    Ok((image, metadata))
}

/// Read only the header of an encoded payload to get its dimensions
pub fn dimensions(bytes: &[u8]) -> WebPerfectResult<(u32, u32)> {
    let reader = image::ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    if reader.format().is_none() {
        return Err(WebPerfectError::UnsupportedFormat(
            "unrecognised image header".to_string(),
        ));
    }
    Ok(reader.into_dimensions()?)
}

/// Score an image; `encoded_len` is the size of the payload it was decoded from
pub fn assess(image: &DynamicImage, encoded_len: u64) -> QualityMetrics {
    let raw_len = u64::from(image.width())
        * u64::from(image.height())
        * u64::from(image.color().channel_count());
    let compression = if raw_len == 0 {
        0.0
    } else {
        1.0 - encoded_len as f64 / raw_len as f64
    };

    let work = if image.width() > ASSESS_MAX_SIDE || image.height() > ASSESS_MAX_SIDE {
        image.thumbnail(ASSESS_MAX_SIDE, ASSESS_MAX_SIDE)
    } else {
        image.clone()
    };

    let color_balance = color_balance(&work);
    let luma = work.to_luma8();
    if luma.width() < 3 || luma.height() < 3 {
        return QualityMetrics::new(0.0, 0.0, compression, color_balance, 0.0);
    }

    QualityMetrics::new(
        noise(&luma),
        sharpness(&luma),
        compression,
        color_balance,
        blockiness(&luma),
    )
}

/// Mean absolute Laplacian response, scaled so a crisp photo lands near 1
fn sharpness(luma: &GrayImage) -> f64 {
    let (w, h) = luma.dimensions();
    let px = |x: u32, y: u32| f64::from(luma.get_pixel(x, y)[0]);

    let mut total = 0.0;
    let mut count = 0u64;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = 4.0 * px(x, y) - px(x - 1, y) - px(x + 1, y) - px(x, y - 1) - px(x, y + 1);
            total += lap.abs();
            count += 1;
        }
    }

    if count == 0 {
        0.0
    } else {
        (total / count as f64) / 255.0 * 4.0
    }
}

/// Residual left after a light gaussian blur
fn noise(luma: &GrayImage) -> f64 {
    let blurred = image::imageops::blur(luma, 1.0);
    let total: f64 = luma
        .as_raw()
        .iter()
        .zip(blurred.as_raw())
        .map(|(a, b)| (f64::from(*a) - f64::from(*b)).abs())
        .sum();
    let count = luma.as_raw().len().max(1) as f64;
    (total / count) / 255.0 * 8.0
}

/// One minus the spread between the brightest and darkest channel mean
fn color_balance(image: &DynamicImage) -> f64 {
    let rgb = image.to_rgb8();
    let pixels = (rgb.width() as usize * rgb.height() as usize).max(1) as f64;

    let mut sums = [0.0f64; 3];
    for pixel in rgb.pixels() {
        for (sum, channel) in sums.iter_mut().zip(pixel.0) {
            *sum += f64::from(channel);
        }
    }

    let means = sums.map(|s| s / pixels);
    let max = means.iter().copied().fold(f64::MIN, f64::max);
    let min = means.iter().copied().fold(f64::MAX, f64::min);
    1.0 - (max - min) / 255.0
}

/// Excess gradient across 8-pixel block edges relative to the gradient
/// everywhere else
fn blockiness(luma: &GrayImage) -> f64 {
    let (w, h) = luma.dimensions();
    let px = |x: u32, y: u32| f64::from(luma.get_pixel(x, y)[0]);

    let mut edge = (0.0, 0u64);
    let mut inner = (0.0, 0u64);
    for y in 0..h {
        for x in 1..w {
            let diff = (px(x, y) - px(x - 1, y)).abs();
            let bucket = if x % BLOCK == 0 { &mut edge } else { &mut inner };
            bucket.0 += diff;
            bucket.1 += 1;
        }
    }
    for y in 1..h {
        for x in 0..w {
            let diff = (px(x, y) - px(x, y - 1)).abs();
            let bucket = if y % BLOCK == 0 { &mut edge } else { &mut inner };
            bucket.0 += diff;
            bucket.1 += 1;
        }
    }

    if edge.1 == 0 || inner.1 == 0 {
        return 0.0;
    }
    let edge_mean = edge.0 / edge.1 as f64;
    let inner_mean = inner.0 / inner.1 as f64;
    (edge_mean - inner_mean).max(0.0) / (inner_mean + 1.0)
}

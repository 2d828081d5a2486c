//! Applies an [`EnhancementPlan`] to decoded pixels and re-encodes the result.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, Rgba};
use std::io::Cursor;

use super::types::{EnhancementPlan, Operation, OperationKind};
use crate::error::{WebPerfectError, WebPerfectResult};

/// Resolve a format name to an encodable [`ImageFormat`]
pub fn parse_format(name: &str) -> WebPerfectResult<ImageFormat> {
    match name.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "png" => Ok(ImageFormat::Png),
        "webp" => Ok(ImageFormat::WebP),
        other => Err(WebPerfectError::UnsupportedFormat(other.to_string())),
    }
}

/// File extension used when writing a given output format
pub fn file_extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        _ => "bin",
    }
}

/// Run every operation of `plan` in order.
///
/// Returns the transformed image and the names of the operations applied.
pub fn apply_plan(
    mut image: DynamicImage,
    plan: &EnhancementPlan,
) -> WebPerfectResult<(DynamicImage, Vec<String>)> {
    let mut applied = Vec::with_capacity(plan.operations.len());

    for op in &plan.operations {
        image = apply_operation(image, op)?;
        applied.push(op.kind.as_str().to_string());
    }

    Ok((image, applied))
}

fn apply_operation(image: DynamicImage, op: &Operation) -> WebPerfectResult<DynamicImage> {
    let result = match op.kind {
        OperationKind::NoiseReduction => {
            let sigma = positive(op, "sigma", 0.8)?;
            image.blur(sigma as f32)
        }
        OperationKind::AutoLevels => {
            let brightness = op
                .parameters
                .get("brightness")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0)
                .clamp(-255, 255) as i32;
            let contrast = op.param_f64("contrast").unwrap_or(0.0) as f32;
            stretch_levels(&image)
                .brighten(brightness)
                .adjust_contrast(contrast)
        }
        OperationKind::TextureEnhancement => {
            let sigma = positive(op, "sigma", 0.8)?;
            let threshold = op.param_u32("threshold").unwrap_or(1) as i32;
            image.unsharpen(sigma as f32, threshold)
        }
        OperationKind::Resize => {
            let width = required_dimension(op, "width")?;
            let height = required_dimension(op, "height")?;
            // Target already carries the source aspect ratio
            image.resize_exact(width, height, FilterType::Lanczos3)
        }
        // Conversion happens at encode time
        OperationKind::FormatConversion => image,
    };
    Ok(result)
}

fn positive(op: &Operation, name: &str, default: f64) -> WebPerfectResult<f64> {
    let value = op.param_f64(name).unwrap_or(default);
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(WebPerfectError::InvalidParameter {
            name: format!("{}.{}", op.kind, name),
            reason: format!("expected a positive number, got {}", value),
        })
    }
}

fn required_dimension(op: &Operation, name: &str) -> WebPerfectResult<u32> {
    match op.param_u32(name) {
        Some(value) if value > 0 => Ok(value),
        _ => Err(WebPerfectError::InvalidParameter {
            name: format!("{}.{}", op.kind, name),
            reason: "expected a positive integer".to_string(),
        }),
    }
}

/// Linearly stretch channel values so the darkest luma maps to 0 and the
/// brightest to 255. Alpha is left untouched.
fn stretch_levels(image: &DynamicImage) -> DynamicImage {
    let luma = image.to_luma8();
    let (min, max) = luma
        .as_raw()
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max <= min {
        return image.clone();
    }

    let scale = 255.0 / f32::from(max - min);
    let stretch = |v: u8| ((f32::from(v) - f32::from(min)) * scale).clamp(0.0, 255.0).round() as u8;

    if image.color().has_alpha() {
        let mut rgba = image.to_rgba8();
        for pixel in rgba.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            *pixel = Rgba([stretch(r), stretch(g), stretch(b), a]);
        }
        DynamicImage::ImageRgba8(rgba)
    } else {
        let mut rgb = image.to_rgb8();
        for pixel in rgb.pixels_mut() {
            let Rgb([r, g, b]) = *pixel;
            *pixel = Rgb([stretch(r), stretch(g), stretch(b)]);
        }
        DynamicImage::ImageRgb8(rgb)
    }
}

/// Encode `image` in the named format.
///
/// JPEG honours `quality` (1-100); WebP output is lossless and PNG ignores
/// quality.
pub fn encode(image: &DynamicImage, format: &str, quality: u8) -> WebPerfectResult<Vec<u8>> {
    let mut buf = Vec::new();
    match parse_format(format)? {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            image.to_rgb8().write_with_encoder(encoder)?;
        }
        ImageFormat::WebP => {
            let encoder = WebPEncoder::new_lossless(&mut buf);
            image.to_rgba8().write_with_encoder(encoder)?;
        }
        other => {
            let mut cursor = Cursor::new(&mut buf);
            image.write_to(&mut cursor, other)?;
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::types::{ProcessingParameters, QualityMetrics};
    use image::RgbImage;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, _| {
            let v = 60 + (x * 100 / width.max(1)) as u8;
            Rgb([v, v, v])
        }))
    }

    fn plan(operations: Vec<Operation>) -> EnhancementPlan {
        EnhancementPlan {
            operations,
            parameters: ProcessingParameters::default(),
            quality: QualityMetrics::new(0.0, 0.5, 0.5, 1.0, 0.0),
        }
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("JPG").unwrap(), ImageFormat::Jpeg);
        assert_eq!(parse_format("webp").unwrap(), ImageFormat::WebP);
        assert!(matches!(
            parse_format("tga"),
            Err(WebPerfectError::UnsupportedFormat(_))
        ));
        assert_eq!(file_extension(ImageFormat::Jpeg), "jpg");
    }

    #[test]
    fn test_apply_plan_records_operations_in_order() {
        let plan = plan(vec![
            Operation::new(OperationKind::NoiseReduction).with_param("sigma", 1.0),
            Operation::new(OperationKind::Resize)
                .with_param("width", 50)
                .with_param("height", 25),
            Operation::new(OperationKind::FormatConversion).with_param("format", "png"),
        ]);

        let (image, applied) = apply_plan(gradient(100, 50), &plan).unwrap();
        assert_eq!(image.width(), 50);
        assert_eq!(image.height(), 25);
        assert_eq!(
            applied,
            vec!["noise_reduction", "resize", "format_conversion"]
        );
    }

    #[test]
    fn test_resize_hits_planned_size_exactly() {
        // 1500x999 at 400 wide is 266.4 high, which rounds down
        let plan = plan(vec![Operation::new(OperationKind::Resize)
            .with_param("width", 400)
            .with_param("height", 266)]);

        let (image, _) = apply_plan(gradient(1500, 999), &plan).unwrap();
        assert_eq!((image.width(), image.height()), (400, 266));
    }

    #[test]
    fn test_resize_requires_dimensions() {
        let plan = plan(vec![Operation::new(OperationKind::Resize)]);
        let err = apply_plan(gradient(10, 10), &plan).unwrap_err();
        assert!(matches!(err, WebPerfectError::InvalidParameter { .. }));
    }

    #[test]
    fn test_negative_sigma_rejected() {
        let plan = plan(vec![
            Operation::new(OperationKind::TextureEnhancement).with_param("sigma", -1.0)
        ]);
        assert!(apply_plan(gradient(10, 10), &plan).is_err());
    }

    #[test]
    fn test_stretch_levels_expands_range() {
        let stretched = stretch_levels(&gradient(100, 4)).to_luma8();
        let min = stretched.as_raw().iter().min().copied().unwrap();
        let max = stretched.as_raw().iter().max().copied().unwrap();
        assert!(min <= 3, "min {}", min);
        assert!(max >= 252, "max {}", max);
    }

    #[test]
    fn test_encode_formats_decode_back() {
        let image = gradient(16, 8);
        for format in ["jpeg", "png", "webp"] {
            let bytes = encode(&image, format, 80).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!(decoded.width(), 16, "format {}", format);
            assert_eq!(
                image::guess_format(&bytes).unwrap(),
                parse_format(format).unwrap()
            );
        }
    }
}

//! Turns an analysed image into an ordered enhancement plan.

use super::presets::OptimizationPreset;
use super::types::{
    EnhancementPlan, ImageMetadata, Operation, OperationKind, ProcessingParameters, QualityMetrics,
};

/// Width above which the plan targets 4K output instead of full HD
const HD_WIDTH: u32 = 1920;
const UHD_WIDTH: u32 = 3840;

/// Sharpness below which the image is treated as flat and gets a stronger
/// level adjustment
const FLAT_SHARPNESS: f64 = 0.7;

/// Build the plan for one image.
///
/// Operations always appear in the order noise reduction, auto levels,
/// texture enhancement, resize, format conversion; the first three only
/// when the preset asks for them and resize only when the image must shrink.
pub fn plan_enhancements(
    metadata: &ImageMetadata,
    metrics: &QualityMetrics,
    preset: &OptimizationPreset,
) -> EnhancementPlan {
    let mut operations = Vec::new();

    if preset.includes(OperationKind::NoiseReduction) {
        let sigma = 0.5 + metrics.noise;
        operations.push(Operation::new(OperationKind::NoiseReduction).with_param("sigma", sigma));
    }

    if preset.includes(OperationKind::AutoLevels) {
        let (brightness, contrast) = if metrics.sharpness < FLAT_SHARPNESS {
            (10, 20.0)
        } else {
            (-5, 5.0)
        };
        operations.push(
            Operation::new(OperationKind::AutoLevels)
                .with_param("brightness", brightness)
                .with_param("contrast", contrast),
        );
    }

    if preset.includes(OperationKind::TextureEnhancement) {
        operations.push(
            Operation::new(OperationKind::TextureEnhancement)
                .with_param("sigma", 0.8)
                .with_param("threshold", 1),
        );
    }

    if let Some((width, height)) = target_dimensions(metadata, preset) {
        operations.push(
            Operation::new(OperationKind::Resize)
                .with_param("width", width)
                .with_param("height", height),
        );
    }

    operations.push(
        Operation::new(OperationKind::FormatConversion)
            .with_param("format", preset.format.clone())
            .with_param("quality", preset.quality),
    );

    EnhancementPlan {
        operations,
        parameters: ProcessingParameters {
            max_width: Some(preset.max_width),
            max_height: preset.max_height,
            format: Some(preset.format.clone()),
            quality: Some(preset.quality),
            compression_level: None,
            preserve_metadata: Some(false),
        },
        quality: *metrics,
    }
}

/// Output size when the image has to shrink, `None` when it already fits.
/// Aspect ratio is preserved and the image is never enlarged.
pub fn target_dimensions(metadata: &ImageMetadata, preset: &OptimizationPreset) -> Option<(u32, u32)> {
    let (width, height) = (metadata.width, metadata.height);
    if width == 0 || height == 0 {
        return None;
    }

    let class_width = if width > HD_WIDTH { UHD_WIDTH } else { HD_WIDTH };
    let max_width = class_width.min(preset.max_width);
    let max_height = preset.max_height.unwrap_or(u32::MAX);

    if width <= max_width && height <= max_height {
        return None;
    }

    let scale = (f64::from(max_width) / f64::from(width)).min(f64::from(max_height) / f64::from(height));
    let target_width = ((f64::from(width) * scale).round() as u32).max(1);
    let target_height = ((f64::from(height) * scale).round() as u32).max(1);
    Some((target_width, target_height))
}

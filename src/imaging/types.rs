use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Descriptor of an encoded image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    /// Lowercase format name, e.g. `"jpeg"`, `"png"`, `"webp"`
    pub format: String,
    /// Encoded size in bytes
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_space: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_alpha: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
}

impl ImageMetadata {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Quality assessment; every score lies in `[0.0, 1.0]`
///
/// Higher is better for `sharpness`, `compression` headroom and
/// `color_balance`; higher is worse for `noise` and `artifacts`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub noise: f64,
    pub sharpness: f64,
    pub compression: f64,
    pub color_balance: f64,
    pub artifacts: f64,
}

impl QualityMetrics {
    /// Build metrics, clamping each score into range (NaN becomes 0)
    pub fn new(noise: f64, sharpness: f64, compression: f64, color_balance: f64, artifacts: f64) -> Self {
        Self {
            noise: clamp_unit(noise),
            sharpness: clamp_unit(sharpness),
            compression: clamp_unit(compression),
            color_balance: clamp_unit(color_balance),
            artifacts: clamp_unit(artifacts),
        }
    }

    /// Single score in `[0.0, 1.0]` combining all five measurements
    pub fn overall_score(&self) -> f64 {
        let score = ((1.0 - self.noise)
            + self.sharpness
            + self.compression
            + self.color_balance
            + (1.0 - self.artifacts))
            / 5.0;
        clamp_unit(score)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Closed set of enhancement operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    NoiseReduction,
    AutoLevels,
    TextureEnhancement,
    Resize,
    FormatConversion,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::NoiseReduction => "noise_reduction",
            OperationKind::AutoLevels => "auto_levels",
            OperationKind::TextureEnhancement => "texture_enhancement",
            OperationKind::Resize => "resize",
            OperationKind::FormatConversion => "format_conversion",
        }
    }

    /// Label used in the batch processing log; format conversion is
    /// reported through `newFormat` instead
    pub fn log_label(&self) -> Option<&'static str> {
        match self {
            OperationKind::NoiseReduction => Some("noise_reduction"),
            OperationKind::AutoLevels => Some("auto_levels_curves"),
            OperationKind::TextureEnhancement => Some("texture_enhancement"),
            OperationKind::Resize => Some("resolution_optimization"),
            OperationKind::FormatConversion => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned operation with free-form parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl Operation {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            parameters: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).and_then(Value::as_f64)
    }

    pub fn param_u32(&self, key: &str) -> Option<u32> {
        self.parameters
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

/// Target output parameters of a plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_metadata: Option<bool>,
}

/// Ordered operations plus the target parameters and the quality snapshot
/// the plan was derived from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementPlan {
    pub operations: Vec<Operation>,
    pub parameters: ProcessingParameters,
    pub quality: QualityMetrics,
}

impl EnhancementPlan {
    pub fn operation_names(&self) -> Vec<String> {
        self.operations
            .iter()
            .map(|op| op.kind.as_str().to_string())
            .collect()
    }

    /// Dimensions requested by the plan's resize operation, if any
    pub fn resize_target(&self) -> Option<(u32, u32)> {
        let op = self
            .operations
            .iter()
            .find(|op| op.kind == OperationKind::Resize)?;
        Some((op.param_u32("width")?, op.param_u32("height")?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub input_size: u64,
    pub output_size: u64,
    /// Elapsed processing time in milliseconds
    pub processing_time: u64,
    /// `output_size / input_size`
    pub compression_ratio: f64,
    pub quality_score: f64,
    pub operations: Vec<String>,
}

impl ProcessingStats {
    pub fn compression_ratio(input_size: u64, output_size: u64) -> f64 {
        if input_size == 0 {
            0.0
        } else {
            output_size as f64 / input_size as f64
        }
    }
}

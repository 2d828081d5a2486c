use serde::{Deserialize, Serialize};

use super::types::OperationKind;
use crate::error::{WebPerfectError, WebPerfectResult};

/// Named set of output targets and enhancements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationPreset {
    pub name: String,
    pub max_width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    /// Output format name (`"webp"`, `"jpeg"`, `"png"`)
    pub format: String,
    pub quality: u8,
    pub enhancements: Vec<OperationKind>,
}

impl OptimizationPreset {
    /// Everyday web delivery
    pub fn web_standard() -> Self {
        Self {
            name: "web_standard".to_string(),
            max_width: 1920,
            max_height: None,
            format: "webp".to_string(),
            quality: 85,
            enhancements: vec![OperationKind::NoiseReduction, OperationKind::AutoLevels],
        }
    }

    /// Large, detail-preserving output
    pub fn web_high_quality() -> Self {
        Self {
            name: "web_high_quality".to_string(),
            max_width: 3840,
            max_height: None,
            format: "webp".to_string(),
            quality: 90,
            enhancements: vec![
                OperationKind::NoiseReduction,
                OperationKind::AutoLevels,
                OperationKind::TextureEnhancement,
            ],
        }
    }

    pub fn thumbnail() -> Self {
        Self {
            name: "thumbnail".to_string(),
            max_width: 400,
            max_height: None,
            format: "webp".to_string(),
            quality: 80,
            enhancements: vec![OperationKind::NoiseReduction],
        }
    }

    pub fn includes(&self, kind: OperationKind) -> bool {
        self.enhancements.contains(&kind)
    }
}

/// Ordered collection of presets looked up by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetCatalog {
    presets: Vec<OptimizationPreset>,
}

impl PresetCatalog {
    pub fn new(presets: Vec<OptimizationPreset>) -> Self {
        Self { presets }
    }

    pub fn get(&self, name: &str) -> WebPerfectResult<&OptimizationPreset> {
        self.presets
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| WebPerfectError::UnknownPreset(name.to_string()))
    }

    /// Insert a preset, replacing any existing preset with the same name
    pub fn insert(&mut self, preset: OptimizationPreset) {
        match self.presets.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => *existing = preset,
            None => self.presets.push(preset),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.presets.iter().map(|p| p.name.as_str()).collect()
    }
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::new(vec![
            OptimizationPreset::web_standard(),
            OptimizationPreset::web_high_quality(),
            OptimizationPreset::thumbnail(),
        ])
    }
}

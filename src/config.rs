use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{WebPerfectError, WebPerfectResult};
use crate::imaging::{enhance, OptimizationPreset, PresetCatalog};

/// Batch processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessorConfig {
    /// Name of the preset applied to every file
    pub preset: String,

    /// Overrides the preset's output format when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,

    /// Input file extensions picked up from the input directory, lowercase
    /// and without the dot
    pub supported_extensions: Vec<String>,

    /// File written into the output directory after a batch
    pub log_file_name: String,

    pub presets: PresetCatalog,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            preset: "web_standard".to_string(),
            output_format: None,
            supported_extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            log_file_name: "processing-log.json".to_string(),
            presets: PresetCatalog::default(),
        }
    }
}

impl ProcessorConfig {
    /// Load and validate a JSON configuration file
    ///
    /// Missing fields take their default values.
    pub fn from_file(path: impl AsRef<Path>) -> WebPerfectResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WebPerfectError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: ProcessorConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Use a different preset
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    pub fn validate(&self) -> WebPerfectResult<()> {
        self.presets.get(&self.preset)?;
        if let Some(format) = &self.output_format {
            enhance::parse_format(format)?;
        }
        if self.supported_extensions.is_empty() {
            return Err(WebPerfectError::ConfigError(
                "At least one supported extension is required".to_string(),
            ));
        }
        if self.log_file_name.trim().is_empty() {
            return Err(WebPerfectError::ConfigError(
                "Log file name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The preset to run, with the output format override applied
    pub fn active_preset(&self) -> WebPerfectResult<OptimizationPreset> {
        let mut preset = self.presets.get(&self.preset)?.clone();
        if let Some(format) = &self.output_format {
            preset.format = format.clone();
        }
        Ok(preset)
    }

    /// Whether `path` has one of the supported extensions (case-insensitive)
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_ascii_lowercase();
                self.supported_extensions.iter().any(|s| *s == e)
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ProcessorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_file_name, "processing-log.json");
        assert_eq!(config.active_preset().unwrap().max_width, 1920);
    }

    #[test]
    fn test_is_supported() {
        let config = ProcessorConfig::default();
        assert!(config.is_supported(Path::new("a/photo.JPG")));
        assert!(config.is_supported(Path::new("scan.png")));
        assert!(!config.is_supported(Path::new("anim.gif")));
        assert!(!config.is_supported(Path::new("README")));
    }

    #[test]
    fn test_output_format_override() {
        let config = ProcessorConfig::default()
            .with_preset("thumbnail")
            .with_output_format("jpeg");
        let preset = config.active_preset().unwrap();
        assert_eq!(preset.name, "thumbnail");
        assert_eq!(preset.format, "jpeg");
    }

    #[test]
    fn test_validate_rejects_unknown_preset() {
        let config = ProcessorConfig::default().with_preset("print");
        assert!(matches!(
            config.validate(),
            Err(WebPerfectError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "preset": "web_high_quality", "outputFormat": "png" }}"#).unwrap();

        let config = ProcessorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.preset, "web_high_quality");
        assert_eq!(config.output_format.as_deref(), Some("png"));
        assert_eq!(config.supported_extensions.len(), 3);
        assert_eq!(config.presets.names().len(), 3);
    }

    #[test]
    fn test_from_file_missing() {
        let err = ProcessorConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, WebPerfectError::ConfigError(_)));
    }

    #[test]
    fn test_round_trip_uses_camel_case() {
        let json = serde_json::to_value(ProcessorConfig::default()).unwrap();
        assert!(json.get("logFileName").is_some());
        assert!(json["presets"].is_array());
    }
}

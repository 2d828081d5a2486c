use crate::error::{WebPerfectError, WebPerfectResult};
use crate::imaging::enhance;
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{ContextUpdate, PipelineContext, PipelineStage};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Stage that writes the processed image into an output directory
///
/// The payload is written to `<name>.<ext>.part` first and renamed into
/// place. Any `.part` file left behind by a failed write is removed in
/// `cleanup`.
///
/// # Context Requirements
/// - `processed_image`
/// - `plan` or `metadata` to pick the file extension
pub struct PersistStage {
    output_dir: PathBuf,
    temp_files: Mutex<Vec<PathBuf>>,
}

impl PersistStage {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            temp_files: Mutex::new(Vec::new()),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Destination for an input labelled `label` encoded as `format`
    pub fn output_path(output_dir: &Path, label: &str, format: &str) -> WebPerfectResult<PathBuf> {
        let stem = Path::new(label)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| WebPerfectError::InvalidParameter {
                name: "label".to_string(),
                reason: format!("cannot derive a file name from '{}'", label),
            })?;
        let extension = enhance::file_extension(enhance::parse_format(format)?);
        Ok(output_dir.join(format!("{}.{}", stem, extension)))
    }

    fn output_format(context: &PipelineContext) -> WebPerfectResult<&str> {
        context
            .plan()
            .and_then(|p| p.parameters.format.as_deref())
            .or_else(|| context.metadata().map(|m| m.format.as_str()))
            .ok_or(WebPerfectError::MissingContextField("plan"))
    }
}

#[async_trait]
impl PipelineStage for PersistStage {
    fn name(&self) -> &str {
        "persist"
    }

    async fn validate(&self, context: &PipelineContext) -> WebPerfectResult<bool> {
        Ok(context.processed_image().is_some() && self.output_dir.is_dir())
    }

    async fn execute(&self, context: &PipelineContext) -> WebPerfectResult<ContextUpdate> {
        let output = context
            .processed_image()
            .ok_or(WebPerfectError::MissingContextField("processed_image"))?;
        let target = Self::output_path(&self.output_dir, context.label(), Self::output_format(context)?)?;

        let mut part = target.clone().into_os_string();
        part.push(".part");
        let part = PathBuf::from(part);

        self.temp_files.lock().await.push(part.clone());
        tokio::fs::write(&part, output).await?;
        tokio::fs::rename(&part, &target).await?;
        self.temp_files.lock().await.retain(|p| p != &part);

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Wrote {} bytes to {} (image: {})",
                output.len(),
                target.display(),
                context.label()
            ),
            "pipeline::persist",
        );

        Ok(ContextUpdate::new())
    }

    async fn cleanup(&self) -> WebPerfectResult<()> {
        let leftovers: Vec<PathBuf> = self.temp_files.lock().await.drain(..).collect();
        let mut failed = Vec::new();

        for temp_file in leftovers {
            if !temp_file.exists() {
                continue;
            }
            match tokio::fs::remove_file(&temp_file).await {
                Ok(_) => LOGGER.log(
                    LogLevel::Info,
                    &format!("Deleted temporary file: {}", temp_file.display()),
                    "pipeline::persist",
                ),
                Err(e) => {
                    LOGGER.log(
                        LogLevel::Warn,
                        &format!(
                            "Failed to delete temporary file {}: {}",
                            temp_file.display(),
                            e
                        ),
                        "pipeline::persist",
                    );
                    failed.push(temp_file.display().to_string());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(WebPerfectError::CleanupFailed {
                stage: self.name().to_string(),
                message: format!("could not remove {}", failed.join(", ")),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::ImageMetadata;
    use tempfile::TempDir;

    fn context(label: &str) -> PipelineContext {
        let mut context = PipelineContext::new(label, vec![1]);
        context.apply(
            ContextUpdate::new()
                .metadata(ImageMetadata {
                    width: 1,
                    height: 1,
                    format: "png".to_string(),
                    size: 1,
                    color_space: None,
                    has_alpha: None,
                    quality: None,
                })
                .processed_image(vec![7, 8, 9]),
        );
        context
    }

    #[test]
    fn test_output_path() {
        let path = PersistStage::output_path(Path::new("/out"), "dir/photo.jpeg", "webp").unwrap();
        assert_eq!(path, PathBuf::from("/out/photo.webp"));
        assert!(PersistStage::output_path(Path::new("/out"), "", "webp").is_err());
        assert!(PersistStage::output_path(Path::new("/out"), "a.png", "tga").is_err());
    }

    #[tokio::test]
    async fn test_persist_stage_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let stage = PersistStage::new(temp_dir.path());
        let context = context("shot.png");

        assert!(stage.validate(&context).await.unwrap());
        let update = stage.execute(&context).await.unwrap();
        assert!(update.is_empty());

        let written = std::fs::read(temp_dir.path().join("shot.png")).unwrap();
        assert_eq!(written, vec![7, 8, 9]);
        assert!(!temp_dir.path().join("shot.png.part").exists());
        assert!(stage.cleanup().await.is_ok());
    }

    #[tokio::test]
    async fn test_persist_stage_requires_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let stage = PersistStage::new(temp_dir.path().join("missing"));

        assert!(!stage.validate(&context("shot.png")).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_removes_leftover_part_file() {
        let temp_dir = TempDir::new().unwrap();
        let stage = PersistStage::new(temp_dir.path());
        let leftover = temp_dir.path().join("shot.png.part");
        std::fs::write(&leftover, b"partial").unwrap();
        stage.temp_files.lock().await.push(leftover.clone());

        stage.cleanup().await.unwrap();
        assert!(!leftover.exists());
    }
}

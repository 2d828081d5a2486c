use crate::error::WebPerfectResult;
use crate::imaging::analysis;
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{ContextUpdate, PipelineContext, PipelineStage};
use async_trait::async_trait;

/// Stage that decodes the source image and scores its quality
///
/// # Context Requirements
/// - `source_image` must be non-empty
///
/// # Context Outputs
/// - `metadata` - dimensions, format and size of the source
/// - `metrics` - quality scores used by the planner
pub struct AnalyzeStage;

impl AnalyzeStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnalyzeStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStage for AnalyzeStage {
    fn name(&self) -> &str {
        "analyze"
    }

    async fn validate(&self, context: &PipelineContext) -> WebPerfectResult<bool> {
        Ok(!context.source_image().is_empty())
    }

    async fn execute(&self, context: &PipelineContext) -> WebPerfectResult<ContextUpdate> {
        let source = context.source_image();
        let (image, metadata) = analysis::describe(source)?;
        let metrics = analysis::assess(&image, source.len() as u64);

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Analyzed {} {} image, quality score {:.2} (image: {})",
                metadata.resolution(),
                metadata.format,
                metrics.overall_score(),
                context.label()
            ),
            "pipeline::analyze",
        );

        Ok(ContextUpdate::new().metadata(metadata).metrics(metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 7) as u8, (y * 5) as u8, 90]));
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn test_analyze_stage_success() {
        let stage = AnalyzeStage::new();
        let mut context = PipelineContext::new("test.png", png(24, 12));

        assert!(stage.validate(&context).await.unwrap());
        let update = stage.execute(&context).await.unwrap();
        context.apply(update);

        let metadata = context.metadata().unwrap();
        assert_eq!(metadata.resolution(), "24x12");
        assert_eq!(metadata.format, "png");
        assert!(context.metrics().is_some());
    }

    #[tokio::test]
    async fn test_analyze_stage_rejects_empty_source() {
        let stage = AnalyzeStage::new();
        let context = PipelineContext::new("empty.png", Vec::new());

        assert!(!stage.validate(&context).await.unwrap());
    }

    #[tokio::test]
    async fn test_analyze_stage_fails_on_garbage() {
        let stage = AnalyzeStage::new();
        let context = PipelineContext::new("junk.png", b"not an image".to_vec());

        assert!(stage.execute(&context).await.is_err());
    }
}

use crate::error::{WebPerfectError, WebPerfectResult};
use crate::imaging::{analysis, enhance};
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{ContextUpdate, PipelineContext, PipelineStage};
use async_trait::async_trait;

/// Stage that decodes the processed image and checks it against the plan
///
/// Fails when the output cannot be decoded, is not in the planned format or
/// does not have the planned dimensions. On success the quality score in
/// `stats` is replaced by the score of the output.
pub struct VerifyStage;

impl VerifyStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VerifyStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStage for VerifyStage {
    fn name(&self) -> &str {
        "verify"
    }

    async fn validate(&self, context: &PipelineContext) -> WebPerfectResult<bool> {
        Ok(context.processed_image().is_some() && context.metadata().is_some())
    }

    async fn execute(&self, context: &PipelineContext) -> WebPerfectResult<ContextUpdate> {
        let output = context
            .processed_image()
            .ok_or(WebPerfectError::MissingContextField("processed_image"))?;
        let source = context
            .metadata()
            .ok_or(WebPerfectError::MissingContextField("metadata"))?;

        let (image, described) = analysis::describe(output)?;

        let expected_size = context
            .plan()
            .and_then(|plan| plan.resize_target())
            .unwrap_or((source.width, source.height));
        if (described.width, described.height) != expected_size {
            return Err(WebPerfectError::StageFailed(format!(
                "Output is {} but {}x{} was planned",
                described.resolution(),
                expected_size.0,
                expected_size.1
            )));
        }

        if let Some(format) = context.plan().and_then(|p| p.parameters.format.as_deref()) {
            let planned = analysis::format_name(enhance::parse_format(format)?);
            if planned != described.format {
                return Err(WebPerfectError::StageFailed(format!(
                    "Output is {} but {} was planned",
                    described.format, planned
                )));
            }
        }

        let score = analysis::assess(&image, described.size).overall_score();
        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Verified {} {} output, quality score {:.2} (image: {})",
                described.resolution(),
                described.format,
                score,
                context.label()
            ),
            "pipeline::verify",
        );

        let mut update = ContextUpdate::new();
        if let Some(stats) = context.stats() {
            let mut stats = stats.clone();
            stats.quality_score = score;
            update = update.stats(stats);
        }
        Ok(update)
    }
}

use crate::error::{WebPerfectError, WebPerfectResult};
use crate::imaging::{analysis, enhance, ProcessingStats};
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{ContextUpdate, PipelineContext, PipelineStage};
use async_trait::async_trait;
use std::time::Instant;

/// Quality used when the plan does not name one
const DEFAULT_QUALITY: u8 = 85;

/// Stage that applies the enhancement plan and re-encodes the image
///
/// Decoding, pixel work and encoding run on the blocking thread pool.
///
/// # Context Requirements
/// - `plan` (from [`super::PlanStage`])
///
/// # Context Outputs
/// - `processed_image` - encoded output
/// - `stats` - sizes, timing and the applied operations
pub struct EnhanceStage;

impl EnhanceStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnhanceStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStage for EnhanceStage {
    fn name(&self) -> &str {
        "enhance"
    }

    async fn validate(&self, context: &PipelineContext) -> WebPerfectResult<bool> {
        Ok(context.plan().is_some() && !context.source_image().is_empty())
    }

    async fn execute(&self, context: &PipelineContext) -> WebPerfectResult<ContextUpdate> {
        let plan = context
            .plan()
            .ok_or(WebPerfectError::MissingContextField("plan"))?
            .clone();
        let format = match (&plan.parameters.format, context.metadata()) {
            (Some(format), _) => format.clone(),
            (None, Some(metadata)) => metadata.format.clone(),
            (None, None) => return Err(WebPerfectError::MissingContextField("metadata")),
        };
        let quality = plan.parameters.quality.unwrap_or(DEFAULT_QUALITY);
        let source = context.source_image().to_vec();
        let input_size = source.len() as u64;

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Applying {} operation(s), output {} at quality {} (image: {})",
                plan.operations.len(),
                format,
                quality,
                context.label()
            ),
            "pipeline::enhance",
        );

        let started = Instant::now();
        let (output, operations) = tokio::task::spawn_blocking(move || {
            let (image, _) = analysis::describe(&source)?;
            let (image, operations) = enhance::apply_plan(image, &plan)?;
            let output = enhance::encode(&image, &format, quality)?;
            Ok::<_, WebPerfectError>((output, operations))
        })
        .await??;

        let output_size = output.len() as u64;
        let stats = ProcessingStats {
            input_size,
            output_size,
            processing_time: started.elapsed().as_millis() as u64,
            compression_ratio: ProcessingStats::compression_ratio(input_size, output_size),
            quality_score: context
                .metrics()
                .map(|m| m.overall_score())
                .unwrap_or_default(),
            operations,
        };

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Encoded {} -> {} bytes in {}ms (image: {})",
                input_size,
                output_size,
                stats.processing_time,
                context.label()
            ),
            "pipeline::enhance",
        );

        Ok(ContextUpdate::new().processed_image(output).stats(stats))
    }
}

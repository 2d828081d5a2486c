use crate::error::{WebPerfectError, WebPerfectResult};
use crate::imaging::{planner, OptimizationPreset};
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{ContextUpdate, PipelineContext, PipelineStage};
use async_trait::async_trait;

/// Stage that turns the analysis into an enhancement plan for one preset
///
/// # Context Requirements
/// - `metadata` and `metrics` (from [`super::AnalyzeStage`])
///
/// # Context Outputs
/// - `plan`
pub struct PlanStage {
    preset: OptimizationPreset,
}

impl PlanStage {
    pub fn new(preset: OptimizationPreset) -> Self {
        Self { preset }
    }

    pub fn preset(&self) -> &OptimizationPreset {
        &self.preset
    }
}

#[async_trait]
impl PipelineStage for PlanStage {
    fn name(&self) -> &str {
        "plan"
    }

    async fn validate(&self, context: &PipelineContext) -> WebPerfectResult<bool> {
        Ok(context.metadata().is_some() && context.metrics().is_some())
    }

    async fn execute(&self, context: &PipelineContext) -> WebPerfectResult<ContextUpdate> {
        let metadata = context
            .metadata()
            .ok_or(WebPerfectError::MissingContextField("metadata"))?;
        let metrics = context
            .metrics()
            .ok_or(WebPerfectError::MissingContextField("metrics"))?;

        let plan = planner::plan_enhancements(metadata, metrics, &self.preset);

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Planned [{}] with preset '{}' (image: {})",
                plan.operation_names().join(", "),
                self.preset.name,
                context.label()
            ),
            "pipeline::plan",
        );

        Ok(ContextUpdate::new().plan(plan))
    }
}

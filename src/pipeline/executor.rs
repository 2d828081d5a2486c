use super::context::{ContextUpdate, PipelineContext};
use super::core::{
    CategorizedStage, PipelineStage, RunReport, StageCategory, StageOutcome, StageResult,
};
use crate::error::{WebPerfectError, WebPerfectResult};
use crate::logger::{LogLevel, LOGGER};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

/// Pipeline executor that runs stages sequentially
///
/// `run` never fails: a validation failure, a stage error or a panic inside
/// a stage ends the stage loop and is recorded in the returned context's
/// `error`. Every registered stage is cleaned up afterwards, whether or not
/// the loop reached it.
///
/// # Example
/// ```no_run
/// # async fn demo() -> webperfect_lib::error::WebPerfectResult<()> {
/// use webperfect_lib::pipeline::{Pipeline, PipelineContext};
/// use webperfect_lib::pipeline::stages::{AnalyzeStage, EnhanceStage, PlanStage};
/// use webperfect_lib::imaging::OptimizationPreset;
///
/// let pipeline = Pipeline::builder("optimize")
///     .add_analysis_stage(AnalyzeStage::new())
///     .add_enhancement_stage(PlanStage::new(OptimizationPreset::web_standard()))
///     .add_processing_stage(EnhanceStage::new())
///     .build()?;
///
/// let bytes = std::fs::read("photo.jpg")?;
/// let context = pipeline.run(PipelineContext::new("photo.jpg", bytes)).await;
/// if let Some(error) = context.error() {
///     eprintln!("optimisation failed: {}", error);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    name: String,
    stages: Vec<Box<dyn PipelineStage>>,
}

impl Pipeline {
    /// Create an empty pipeline; stages are added with [`Pipeline::add_stage`]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Create a new pipeline builder
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Append a stage
    pub fn add_stage<S: PipelineStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn add_boxed_stage(mut self, stage: Box<dyn PipelineStage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Registered stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run all stages against `initial` and return the final context
    pub async fn run(&self, initial: PipelineContext) -> PipelineContext {
        self.run_with_report(initial).await.0
    }

    /// Same as [`Pipeline::run`], also returning a per-stage trace
    pub async fn run_with_report(&self, initial: PipelineContext) -> (PipelineContext, RunReport) {
        let mut context = initial;
        let total = self.stages.len();

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Starting pipeline '{}' with {} stages (image: {}, run: {})",
                self.name,
                total,
                context.label(),
                context.run_id()
            ),
            "pipeline",
        );

        let pipeline_start = Instant::now();
        let mut stage_results = Vec::with_capacity(total);

        for (index, stage) in self.stages.iter().enumerate() {
            let stage_name = stage.name();

            LOGGER.log(
                LogLevel::Info,
                &format!(
                    "Executing stage {}/{}: {} (image: {})",
                    index + 1,
                    total,
                    stage_name,
                    context.label()
                ),
                "pipeline",
            );

            let stage_start = Instant::now();
            let attempt = AssertUnwindSafe(Self::attempt_stage(stage.as_ref(), &context))
                .catch_unwind()
                .await;
            let duration = stage_start.elapsed();

            let (outcome, error) = match attempt {
                Ok(Ok(update)) => {
                    LOGGER.log(
                        LogLevel::Info,
                        &format!(
                            "Stage '{}' completed in {:.2}s, updated [{}] (image: {})",
                            stage_name,
                            duration.as_secs_f64(),
                            update.field_names().join(", "),
                            context.label()
                        ),
                        "pipeline",
                    );
                    context.apply(update);
                    stage_results.push(StageResult::completed(stage_name, duration));
                    continue;
                }
                Ok(Err(failure)) => failure,
                Err(payload) => (
                    StageOutcome::Failed,
                    WebPerfectError::StagePanicked {
                        stage: stage_name.to_string(),
                        message: panic_message(payload.as_ref()),
                    },
                ),
            };
            LOGGER.log(
                LogLevel::Error,
                &format!(
                    "Error in pipeline stage {}: {} (image: {})",
                    stage_name,
                    error,
                    context.label()
                ),
                "pipeline",
            );
            stage_results.push(StageResult::failed(
                stage_name,
                outcome,
                error.to_string(),
                duration,
            ));
            context.set_error(error);
            break;
        }

        for stage in self.stages.iter().skip(stage_results.len()) {
            stage_results.push(StageResult::not_reached(stage.name()));
        }

        // Every registered stage is cleaned up, including stages the loop
        // never reached. A panic escaping a cleanup aborts the remaining
        // cleanups and its error replaces any stage error.
        let mut cleanup_failures = Vec::new();
        let cleanup = AssertUnwindSafe(self.cleanup_stages(&context, &mut cleanup_failures))
            .catch_unwind()
            .await;
        let cleanup_aborted = match cleanup {
            Ok(()) => false,
            Err(payload) => {
                let error = WebPerfectError::CleanupAborted(panic_message(payload.as_ref()));
                LOGGER.log(
                    LogLevel::Error,
                    &format!(
                        "Pipeline '{}' failed during cleanup: {} (image: {})",
                        self.name,
                        error,
                        context.label()
                    ),
                    "pipeline",
                );
                if let Some(previous) = context.set_error(error) {
                    LOGGER.log(
                        LogLevel::Warn,
                        &format!(
                            "Cleanup error replaced earlier stage error: {} (image: {})",
                            previous,
                            context.label()
                        ),
                        "pipeline",
                    );
                }
                true
            }
        };

        let total_duration = pipeline_start.elapsed();
        let level = if context.is_success() {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };
        LOGGER.log(
            level,
            &format!(
                "Pipeline '{}' finished in {:.2}s, {} (image: {})",
                self.name,
                total_duration.as_secs_f64(),
                if context.is_success() { "succeeded" } else { "failed" },
                context.label()
            ),
            "pipeline",
        );

        let report = RunReport {
            pipeline_name: self.name.clone(),
            stage_results,
            cleanup_failures,
            cleanup_aborted,
            total_duration,
        };
        (context, report)
    }

    /// Validate then execute one stage
    ///
    /// On failure the outcome names the phase that failed: an error or a
    /// `false` from `validate` is a validation failure, anything returned by
    /// `execute` is a plain failure.
    async fn attempt_stage(
        stage: &dyn PipelineStage,
        context: &PipelineContext,
    ) -> Result<ContextUpdate, (StageOutcome, WebPerfectError)> {
        match stage.validate(context).await {
            Ok(true) => {}
            Ok(false) => {
                return Err((
                    StageOutcome::ValidationFailed,
                    WebPerfectError::ValidationFailed(stage.name().to_string()),
                ))
            }
            Err(error) => return Err((StageOutcome::ValidationFailed, error)),
        }
        stage
            .execute(context)
            .await
            .map_err(|error| (StageOutcome::Failed, error))
    }

    /// Clean up every stage in registration order; an error in one stage
    /// does not stop the others
    async fn cleanup_stages(&self, context: &PipelineContext, failures: &mut Vec<String>) {
        for stage in &self.stages {
            if let Err(e) = stage.cleanup().await {
                LOGGER.log(
                    LogLevel::Error,
                    &format!(
                        "Cleanup failed for stage {}: {} (image: {})",
                        stage.name(),
                        e,
                        context.label()
                    ),
                    "pipeline",
                );
                failures.push(stage.name().to_string());
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder that tags stages by category before registering them
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Box<dyn PipelineStage>>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Add a stage under its own name
    pub fn add_stage<S: PipelineStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Add a stage renamed to `"<category>:<name>"`
    pub fn add_categorized_stage(
        mut self,
        category: StageCategory,
        stage: Box<dyn PipelineStage>,
    ) -> Self {
        self.stages
            .push(Box::new(CategorizedStage::new(category, stage)));
        self
    }

    pub fn add_analysis_stage<S: PipelineStage + 'static>(self, stage: S) -> Self {
        self.add_categorized_stage(StageCategory::Analysis, Box::new(stage))
    }

    pub fn add_enhancement_stage<S: PipelineStage + 'static>(self, stage: S) -> Self {
        self.add_categorized_stage(StageCategory::Enhancement, Box::new(stage))
    }

    pub fn add_processing_stage<S: PipelineStage + 'static>(self, stage: S) -> Self {
        self.add_categorized_stage(StageCategory::Processing, Box::new(stage))
    }

    pub fn add_verification_stage<S: PipelineStage + 'static>(self, stage: S) -> Self {
        self.add_categorized_stage(StageCategory::Verification, Box::new(stage))
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Build the pipeline
    ///
    /// # Errors
    /// Returns [`WebPerfectError::BuilderError`] when no stage was added.
    pub fn build(self) -> WebPerfectResult<Pipeline> {
        if self.stages.is_empty() {
            return Err(WebPerfectError::BuilderError(
                "Pipeline must contain at least one stage".to_string(),
            ));
        }
        Ok(Pipeline {
            name: self.name,
            stages: self.stages,
        })
    }
}

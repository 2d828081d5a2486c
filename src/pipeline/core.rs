use crate::error::WebPerfectResult;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use super::context::{ContextUpdate, PipelineContext};

/// A single stage in a pipeline
///
/// Stages are executed sequentially by the pipeline executor. A stage reads
/// the context and returns the fields it wants changed; it never holds on to
/// the context after a call returns.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use webperfect_lib::error::WebPerfectResult;
/// use webperfect_lib::pipeline::{ContextUpdate, PipelineContext, PipelineStage};
///
/// struct PassThrough;
///
/// #[async_trait]
/// impl PipelineStage for PassThrough {
///     fn name(&self) -> &str {
///         "pass-through"
///     }
///
///     async fn execute(&self, context: &PipelineContext) -> WebPerfectResult<ContextUpdate> {
///         Ok(ContextUpdate::new().processed_image(context.source_image().to_vec()))
///     }
/// }
/// ```
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Stage name for logging and error messages
    fn name(&self) -> &str;

    /// Check whether the stage can run against the current context
    ///
    /// Called strictly before `execute`. Returning `Ok(false)` stops the
    /// pipeline with a validation error naming this stage.
    async fn validate(&self, _context: &PipelineContext) -> WebPerfectResult<bool> {
        Ok(true)
    }

    /// Perform the stage's work and return the fields to merge into the context
    async fn execute(&self, context: &PipelineContext) -> WebPerfectResult<ContextUpdate>;

    /// Release resources privately held by the stage
    ///
    /// Runs once per pipeline run for every registered stage, including
    /// stages the run never reached. Errors are logged and otherwise ignored.
    async fn cleanup(&self) -> WebPerfectResult<()> {
        Ok(())
    }
}

/// Category tag applied by the pipeline builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageCategory {
    Analysis,
    Enhancement,
    Processing,
    Verification,
}

impl StageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageCategory::Analysis => "analysis",
            StageCategory::Enhancement => "enhancement",
            StageCategory::Processing => "processing",
            StageCategory::Verification => "verification",
        }
    }
}

impl fmt::Display for StageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wraps a stage so its name reads `"<category>:<name>"`; every other
/// operation is forwarded untouched
pub struct CategorizedStage {
    category: StageCategory,
    name: String,
    inner: Box<dyn PipelineStage>,
}

impl CategorizedStage {
    pub fn new(category: StageCategory, inner: Box<dyn PipelineStage>) -> Self {
        let name = format!("{}:{}", category, inner.name());
        Self {
            category,
            name,
            inner,
        }
    }

    pub fn category(&self) -> StageCategory {
        self.category
    }

    /// Name of the wrapped stage without the category prefix
    pub fn inner_name(&self) -> &str {
        self.inner.name()
    }
}

#[async_trait]
impl PipelineStage for CategorizedStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self, context: &PipelineContext) -> WebPerfectResult<bool> {
        self.inner.validate(context).await
    }

    async fn execute(&self, context: &PipelineContext) -> WebPerfectResult<ContextUpdate> {
        self.inner.execute(context).await
    }

    async fn cleanup(&self) -> WebPerfectResult<()> {
        self.inner.cleanup().await
    }
}

/// How far a stage got during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    ValidationFailed,
    Failed,
    /// An earlier stage stopped the run
    NotReached,
}

/// Result of a single stage within a run
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage_name: String,
    pub outcome: StageOutcome,
    /// Error message if the stage failed
    pub error: Option<String>,
    pub duration: Duration,
}

impl StageResult {
    pub fn completed(stage_name: impl Into<String>, duration: Duration) -> Self {
        Self {
            stage_name: stage_name.into(),
            outcome: StageOutcome::Completed,
            error: None,
            duration,
        }
    }

    pub fn failed(
        stage_name: impl Into<String>,
        outcome: StageOutcome,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            outcome,
            error: Some(error.into()),
            duration,
        }
    }

    pub fn not_reached(stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            outcome: StageOutcome::NotReached,
            error: None,
            duration: Duration::ZERO,
        }
    }
}

/// Trace of one pipeline run, alongside the returned context
#[derive(Debug, Clone)]
pub struct RunReport {
    pub pipeline_name: String,

    /// One entry per registered stage, in registration order
    pub stage_results: Vec<StageResult>,

    /// Stages whose cleanup returned an error
    pub cleanup_failures: Vec<String>,

    /// Set when the cleanup phase itself was aborted
    pub cleanup_aborted: bool,

    pub total_duration: Duration,
}

impl RunReport {
    /// Number of stages whose `execute` ran to completion
    pub fn executed_stages(&self) -> usize {
        self.stage_results
            .iter()
            .filter(|r| r.outcome == StageOutcome::Completed)
            .count()
    }

    /// The stage that stopped the run, if any
    pub fn failed_stage(&self) -> Option<&StageResult> {
        self.stage_results.iter().find(|r| {
            matches!(
                r.outcome,
                StageOutcome::Failed | StageOutcome::ValidationFailed
            )
        })
    }

    /// True when every stage completed and cleanup was not aborted
    pub fn succeeded(&self) -> bool {
        !self.cleanup_aborted
            && self
                .stage_results
                .iter()
                .all(|r| r.outcome == StageOutcome::Completed)
    }
}

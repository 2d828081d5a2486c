use crate::error::WebPerfectError;
use crate::imaging::{EnhancementPlan, ImageMetadata, ProcessingStats, QualityMetrics};
use uuid::Uuid;

/// Pipeline context that holds the state threaded through stages
///
/// The source image is fixed at construction and has no setter. All other
/// fields start empty and are filled by [`ContextUpdate`]s returned from
/// stages; the last stage to write a field wins.
///
/// # Example
/// ```
/// use webperfect_lib::pipeline::{ContextUpdate, PipelineContext};
///
/// let mut context = PipelineContext::new("photo.jpg", vec![0xFF, 0xD8]);
/// context.apply(ContextUpdate::new().processed_image(vec![1, 2, 3]));
///
/// assert_eq!(context.source_image(), &[0xFF, 0xD8]);
/// assert_eq!(context.processed_image(), Some(&[1u8, 2, 3][..]));
/// ```
#[derive(Debug)]
pub struct PipelineContext {
    /// Identifier for this run, used in log lines
    run_id: Uuid,

    /// Human-readable label such as the source file name
    label: String,

    source_image: Vec<u8>,
    processed_image: Option<Vec<u8>>,
    metadata: Option<ImageMetadata>,
    metrics: Option<QualityMetrics>,
    plan: Option<EnhancementPlan>,
    stats: Option<ProcessingStats>,

    /// Terminal failure of the run
    error: Option<WebPerfectError>,
}

impl PipelineContext {
    /// Create a new context around the source payload
    pub fn new(label: impl Into<String>, source_image: Vec<u8>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            label: label.into(),
            source_image,
            processed_image: None,
            metadata: None,
            metrics: None,
            plan: None,
            stats: None,
            error: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source_image(&self) -> &[u8] {
        &self.source_image
    }

    pub fn processed_image(&self) -> Option<&[u8]> {
        self.processed_image.as_deref()
    }

    pub fn metadata(&self) -> Option<&ImageMetadata> {
        self.metadata.as_ref()
    }

    pub fn metrics(&self) -> Option<&QualityMetrics> {
        self.metrics.as_ref()
    }

    pub fn plan(&self) -> Option<&EnhancementPlan> {
        self.plan.as_ref()
    }

    pub fn stats(&self) -> Option<&ProcessingStats> {
        self.stats.as_ref()
    }

    pub fn error(&self) -> Option<&WebPerfectError> {
        self.error.as_ref()
    }

    /// True when no terminal error was recorded
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Merge a stage's update, overwriting only the fields it carries
    pub fn apply(&mut self, update: ContextUpdate) {
        let ContextUpdate {
            processed_image,
            metadata,
            metrics,
            plan,
            stats,
        } = update;

        if let Some(image) = processed_image {
            self.processed_image = Some(image);
        }
        if let Some(metadata) = metadata {
            self.metadata = Some(metadata);
        }
        if let Some(metrics) = metrics {
            self.metrics = Some(metrics);
        }
        if let Some(plan) = plan {
            self.plan = Some(plan);
        }
        if let Some(stats) = stats {
            self.stats = Some(stats);
        }
    }

    /// Record the terminal error, replacing any previous one
    pub(crate) fn set_error(&mut self, error: WebPerfectError) -> Option<WebPerfectError> {
        self.error.replace(error)
    }

    /// Move the processed payload out of the context
    pub fn take_processed_image(&mut self) -> Option<Vec<u8>> {
        self.processed_image.take()
    }

    /// Consume the context, returning the terminal error if there was one
    pub fn into_result(self) -> Result<Self, WebPerfectError> {
        let mut context = self;
        match context.error.take() {
            Some(error) => Err(error),
            None => Ok(context),
        }
    }
}

/// Partial update returned by a stage
///
/// Only fields that are set are applied; payloads are moved into the
/// context, never copied.
#[derive(Debug, Default)]
#[must_use]
pub struct ContextUpdate {
    processed_image: Option<Vec<u8>>,
    metadata: Option<ImageMetadata>,
    metrics: Option<QualityMetrics>,
    plan: Option<EnhancementPlan>,
    stats: Option<ProcessingStats>,
}

impl ContextUpdate {
    /// An update that changes nothing
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed_image(mut self, image: Vec<u8>) -> Self {
        self.processed_image = Some(image);
        self
    }

    pub fn metadata(mut self, metadata: ImageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn metrics(mut self, metrics: QualityMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn plan(mut self, plan: EnhancementPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn stats(mut self, stats: ProcessingStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Names of the fields this update will write, for logging
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.processed_image.is_some() {
            names.push("processed_image");
        }
        if self.metadata.is_some() {
            names.push("metadata");
        }
        if self.metrics.is_some() {
            names.push("metrics");
        }
        if self.plan.is_some() {
            names.push("plan");
        }
        if self.stats.is_some() {
            names.push("stats");
        }
        names
    }

    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(width: u32) -> ImageMetadata {
        ImageMetadata {
            width,
            height: 10,
            format: "png".to_string(),
            size: 42,
            color_space: None,
            has_alpha: None,
            quality: None,
        }
    }

    #[test]
    fn test_context_creation() {
        let context = PipelineContext::new("a.png", vec![1, 2, 3]);
        assert_eq!(context.label(), "a.png");
        assert_eq!(context.source_image(), &[1, 2, 3]);
        assert!(context.processed_image().is_none());
        assert!(context.metadata().is_none());
        assert!(context.is_success());
    }

    #[test]
    fn test_apply_touches_only_present_fields() {
        let mut context = PipelineContext::new("a.png", vec![9]);
        context.apply(ContextUpdate::new().metadata(metadata(10)));
        context.apply(ContextUpdate::new().processed_image(vec![7, 7]));

        assert_eq!(context.metadata().map(|m| m.width), Some(10));
        assert_eq!(context.processed_image(), Some(&[7u8, 7][..]));
        assert_eq!(context.source_image(), &[9]);
    }

    #[test]
    fn test_last_writer_wins() {
        let mut context = PipelineContext::new("a.png", vec![]);
        context.apply(ContextUpdate::new().metadata(metadata(10)));
        context.apply(ContextUpdate::new().metadata(metadata(20)));

        assert_eq!(context.metadata().map(|m| m.width), Some(20));
    }

    #[test]
    fn test_empty_update_is_noop() {
        let mut context = PipelineContext::new("a.png", vec![1]);
        context.apply(ContextUpdate::new().processed_image(vec![2]));

        let update = ContextUpdate::new();
        assert!(update.is_empty());
        context.apply(update);

        assert_eq!(context.processed_image(), Some(&[2u8][..]));
    }

    #[test]
    fn test_field_names() {
        let update = ContextUpdate::new()
            .metrics(QualityMetrics::new(0.1, 0.2, 0.3, 0.4, 0.5))
            .processed_image(vec![1]);
        assert_eq!(update.field_names(), vec!["processed_image", "metrics"]);
    }

    #[test]
    fn test_set_error_returns_previous() {
        let mut context = PipelineContext::new("a.png", vec![]);
        assert!(context.set_error(WebPerfectError::StageFailed("first".into())).is_none());
        let previous = context.set_error(WebPerfectError::StageFailed("second".into()));

        assert_eq!(previous.map(|e| e.to_string()), Some("first".to_string()));
        assert_eq!(context.error().map(|e| e.to_string()), Some("second".to_string()));
        assert!(context.into_result().is_err());
    }

    #[test]
    fn test_take_processed_image() {
        let mut context = PipelineContext::new("a.png", vec![]);
        context.apply(ContextUpdate::new().processed_image(vec![5]));

        assert_eq!(context.take_processed_image(), Some(vec![5]));
        assert!(context.processed_image().is_none());
    }
}

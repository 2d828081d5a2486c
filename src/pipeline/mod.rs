//! Staged image-processing pipeline
//!
//! A [`Pipeline`] runs an ordered list of [`PipelineStage`]s against a
//! [`PipelineContext`]. Each stage may refuse to run (validation), returns a
//! [`ContextUpdate`] that is merged into the context, and is always given a
//! chance to release its resources once the run is over. Failures never
//! escape `run`; they are recorded in the context's `error` field.
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use webperfect_lib::error::WebPerfectResult;
//! use webperfect_lib::pipeline::{ContextUpdate, Pipeline, PipelineContext, PipelineStage};
//!
//! struct Invert;
//!
//! #[async_trait]
//! impl PipelineStage for Invert {
//!     fn name(&self) -> &str {
//!         "invert"
//!     }
//!
//!     async fn execute(&self, context: &PipelineContext) -> WebPerfectResult<ContextUpdate> {
//!         let inverted = context.source_image().iter().map(|b| !b).collect();
//!         Ok(ContextUpdate::new().processed_image(inverted))
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let pipeline = Pipeline::builder("invert-bytes")
//!     .add_processing_stage(Invert)
//!     .build()
//!     .unwrap();
//!
//! let context = pipeline.run(PipelineContext::new("bytes", vec![0x00, 0xF0])).await;
//! assert!(context.error().is_none());
//! assert_eq!(context.processed_image(), Some(&[0xFFu8, 0x0F][..]));
//! # });
//! ```

pub mod context;
pub mod core;
pub mod executor;
pub mod stages;

pub use context::{ContextUpdate, PipelineContext};
pub use self::core::{
    CategorizedStage, PipelineStage, RunReport, StageCategory, StageOutcome, StageResult,
};
pub use executor::{Pipeline, PipelineBuilder};

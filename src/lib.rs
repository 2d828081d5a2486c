//! Batch image optimisation built on a staged execution pipeline.
//!
//! The [`pipeline`] module is the engine: an ordered list of async stages
//! that read a shared context, return partial updates and are always cleaned
//! up. [`imaging`] holds the image-side work (analysis, planning,
//! enhancement) and [`batch`] drives one pipeline per file in a directory.

pub mod batch;
pub mod config;
pub mod error;
pub mod imaging;
pub mod logger;
pub mod pipeline;

pub use batch::{BatchProcessor, BatchSummary};
pub use config::ProcessorConfig;
pub use error::{WebPerfectError, WebPerfectResult};
pub use pipeline::{ContextUpdate, Pipeline, PipelineBuilder, PipelineContext, PipelineStage};

//! Concrete stages of the image optimisation pipeline
//!
//! In the order the batch processor registers them:
//! 1. AnalyzeStage - decode the source and score its quality
//! 2. PlanStage - choose operations for a preset
//! 3. EnhanceStage - apply the plan and re-encode
//! 4. VerifyStage - check the output against the plan
//! 5. PersistStage - write the output to disk

pub mod analyze;
pub mod enhance;
pub mod persist;
pub mod plan;
pub mod verify;

pub use analyze::AnalyzeStage;
pub use enhance::EnhanceStage;
pub use persist::PersistStage;
pub use plan::PlanStage;
pub use verify::VerifyStage;

//! Image-side collaborators of the pipeline: data types, analysis,
//! planning, enhancement and presets.

pub mod analysis;
pub mod enhance;
pub mod planner;
pub mod presets;
pub mod types;

pub use presets::{OptimizationPreset, PresetCatalog};
pub use types::{
    EnhancementPlan, ImageMetadata, Operation, OperationKind, ProcessingParameters,
    ProcessingStats, QualityMetrics,
};

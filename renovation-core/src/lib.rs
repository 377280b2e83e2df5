pub mod engine;
pub mod error;
pub mod factors;
pub mod model;
pub mod prompt;
pub mod range;
pub mod visualization;

// Re-export commonly used types
pub use engine::CostEstimationEngine;
pub use error::{JobKind, PollError, Result, VisualizationError};
pub use factors::{FactorTables, FactorTablesError, MultiplierTable, RoomCosts};
pub use model::{
    AppliedFactors, Complexity, Condition, ContactInfo, CostBreakdown, CostEstimate,
    EstimateRequest, RoomType, SpaceAssessment, UserAnswers,
};
pub use prompt::{RenderBrief, StyleHints};
pub use range::SquareFootageRange;
pub use visualization::{
    FallbackRenderer, ImageProvider, JobStage, OrchestratorConfig, PollPolicy, Sleeper,
    Visualization, VisualizationJob, VisualizationJobOrchestrator, VisualizationPipeline,
};

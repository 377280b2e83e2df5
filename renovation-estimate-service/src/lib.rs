pub mod assessor;
pub mod config;
pub mod handler;
pub mod models;
pub mod service;
pub mod storage;
pub mod telemetry;

pub use assessor::{LlmSpaceAssessor, SpaceAssessor};
pub use config::ServiceConfig;
pub use handler::{EstimateOutcome, EstimateRequestHandler};
pub use models::*;
pub use service::{AppState, build_router, create_app};
pub use storage::{EstimateRecord, EstimateStore, InMemoryEstimateStore};

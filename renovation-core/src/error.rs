use thiserror::Error;

use crate::visualization::JobStage;

/// Which half of the two-stage provider protocol an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Mask,
    Render,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Mask => f.write_str("mask"),
            JobKind::Render => f.write_str("render"),
        }
    }
}

/// Fatal outcomes of a visualization attempt. Callers demote every variant
/// to "no visualization"; none of them reach the end user.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("Image provider is not configured")]
    NotConfigured,

    #[error("{kind} job submission rejected: {message}")]
    Submission { kind: JobKind, message: String },

    #[error("{kind} job {job_id} reported terminal status '{status}'")]
    TerminalJob {
        kind: JobKind,
        job_id: String,
        status: String,
    },

    #[error("{kind} job {job_id} still unfinished after {attempts} polls")]
    Timeout {
        kind: JobKind,
        job_id: String,
        attempts: u32,
    },

    #[error("{kind} job {job_id} finished without a usable {expected}")]
    ResultShape {
        kind: JobKind,
        job_id: String,
        expected: &'static str,
    },

    #[error("Fallback render failed: {0}")]
    Fallback(String),
}

impl VisualizationError {
    /// Stage the job ends in when this error stops the orchestration.
    pub fn terminal_stage(&self) -> JobStage {
        match self {
            VisualizationError::Timeout { .. } => JobStage::TimedOut,
            _ => JobStage::Failed,
        }
    }
}

/// Failure fetching a job's status. Never fatal on its own.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PollError {
    #[error("Job status endpoint returned 404")]
    NotFound,

    #[error("Transient status fetch failure: {0}")]
    Transient(String),
}

pub type Result<T> = std::result::Result<T, VisualizationError>;

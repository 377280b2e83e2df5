//! Best-effort room visualization: the masked two-stage provider first, then
//! a single-shot fallback renderer. Failures never escape this module; they
//! collapse into [`Visualization::Unavailable`].

pub mod fallback;
#[cfg(feature = "provider")]
pub mod http;
pub mod job;
pub mod orchestrator;
pub mod provider;

pub use fallback::FallbackRenderer;
#[cfg(feature = "provider")]
pub use fallback::{FallbackSettings, HttpFallbackRenderer};
#[cfg(feature = "provider")]
pub use http::{AuthScheme, HttpImageProvider, ProviderSettings};
pub use job::{JobStage, VisualizationJob};
pub use orchestrator::{
    OrchestratorConfig, PollPolicy, Sleeper, TokioSleeper, VisualizationJobOrchestrator,
};
pub use provider::{ImageProvider, JobDetails, JobStatus, RenderJobRequest, StatusEndpoint};

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{JobKind, VisualizationError};
use crate::prompt::RenderBrief;

/// Outcome of the visualization step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "url", rename_all = "lowercase")]
pub enum Visualization {
    Primary(String),
    Fallback(String),
    Unavailable,
}

impl Visualization {
    pub fn url(&self) -> Option<&str> {
        match self {
            Visualization::Primary(url) | Visualization::Fallback(url) => Some(url),
            Visualization::Unavailable => None,
        }
    }

    pub fn source(&self) -> Option<&'static str> {
        match self {
            Visualization::Primary(_) => Some("primary"),
            Visualization::Fallback(_) => Some("fallback"),
            Visualization::Unavailable => None,
        }
    }
}

/// Primary orchestrator plus fallback renderer. Either may be absent when
/// its provider is not configured.
#[derive(Clone, Default)]
pub struct VisualizationPipeline {
    primary: Option<VisualizationJobOrchestrator>,
    fallback: Option<Arc<dyn FallbackRenderer>>,
}

impl VisualizationPipeline {
    pub fn new(
        primary: Option<VisualizationJobOrchestrator>,
        fallback: Option<Arc<dyn FallbackRenderer>>,
    ) -> Self {
        Self { primary, fallback }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub async fn visualize(&self, brief: &RenderBrief) -> Visualization {
        let primary_error = match &self.primary {
            Some(orchestrator) => match orchestrator.run(brief).await {
                Ok(job) => match job.result_url() {
                    Some(url) => {
                        info!(attempts = job.attempts_used(), "Primary visualization ready");
                        return Visualization::Primary(url.to_string());
                    }
                    None => VisualizationError::ResultShape {
                        kind: JobKind::Render,
                        job_id: job.render_job_id().unwrap_or_default().to_string(),
                        expected: "result URL",
                    },
                },
                Err(e) => e,
            },
            None => VisualizationError::NotConfigured,
        };

        warn!(error = %primary_error, "Primary visualization failed, trying fallback renderer");
        self.render_fallback(brief).await
    }

    async fn render_fallback(&self, brief: &RenderBrief) -> Visualization {
        let Some(fallback) = &self.fallback else {
            info!("No fallback renderer configured, continuing without visualization");
            return Visualization::Unavailable;
        };

        match fallback
            .render(&brief.image_url, &brief.room_type, &brief.style)
            .await
        {
            Ok(url) => {
                info!("Fallback visualization ready");
                Visualization::Fallback(url)
            }
            Err(e) => {
                warn!(error = %e, "Fallback renderer failed, continuing without visualization");
                Visualization::Unavailable
            }
        }
    }
}

use serde::Serialize;

/// Position of a job in the linear mask → render protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStage {
    MaskPending,
    MaskReady,
    RenderPending,
    Done,
    Failed,
    TimedOut,
}

impl JobStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Done | JobStage::Failed | JobStage::TimedOut)
    }
}

/// Per-request record of one visualization run. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationJob {
    stage: JobStage,
    mask_job_id: String,
    render_job_id: Option<String>,
    mask_url: Option<String>,
    result_url: Option<String>,
    attempts_used: u32,
}

impl VisualizationJob {
    /// A job exists once the provider has accepted the mask submission.
    pub fn mask_submitted(mask_job_id: impl Into<String>) -> Self {
        Self {
            stage: JobStage::MaskPending,
            mask_job_id: mask_job_id.into(),
            render_job_id: None,
            mask_url: None,
            result_url: None,
            attempts_used: 0,
        }
    }

    pub fn mask_ready(&mut self, mask_url: String) {
        debug_assert_eq!(self.stage, JobStage::MaskPending);
        self.mask_url = Some(mask_url);
        self.stage = JobStage::MaskReady;
    }

    pub fn render_submitted(&mut self, render_job_id: String) {
        debug_assert_eq!(self.stage, JobStage::MaskReady);
        self.render_job_id = Some(render_job_id);
        self.stage = JobStage::RenderPending;
    }

    pub fn complete(&mut self, result_url: String) {
        debug_assert_eq!(self.stage, JobStage::RenderPending);
        self.result_url = Some(result_url);
        self.stage = JobStage::Done;
    }

    pub fn terminate(&mut self, stage: JobStage) {
        debug_assert!(matches!(stage, JobStage::Failed | JobStage::TimedOut));
        self.stage = stage;
    }

    pub fn record_attempt(&mut self) {
        self.attempts_used += 1;
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    pub fn mask_job_id(&self) -> &str {
        &self.mask_job_id
    }

    pub fn render_job_id(&self) -> Option<&str> {
        self.render_job_id.as_deref()
    }

    pub fn mask_url(&self) -> Option<&str> {
        self.mask_url.as_deref()
    }

    pub fn result_url(&self) -> Option<&str> {
        self.result_url.as_deref()
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }
}

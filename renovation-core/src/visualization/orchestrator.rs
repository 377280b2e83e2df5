//! Drives one mask → render job through the external image provider.
//!
//! ```text
//! MASK_PENDING → MASK_READY → RENDER_PENDING → DONE
//!       │                          │
//!       └──────── FAILED / TIMED_OUT ┘
//! ```
//!
//! Each poll waits one interval on the injected [`Sleeper`] before asking the
//! provider for the job's status, so tests can run the full attempt budgets
//! without wall-clock delay. Status fetch failures are transient: they use up
//! an attempt and polling continues. Submissions are never retried.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::job::VisualizationJob;
use super::provider::{
    ImageProvider, JobDetails, JobStatus, MASK_RESULT_FIELDS, MASK_STATUS_ENDPOINTS,
    RENDER_RESULT_FIELDS, RENDER_STATUS_ENDPOINTS, RenderJobRequest, ResultField, StatusEndpoint,
};
use crate::error::{JobKind, PollError, Result, VisualizationError};
use crate::prompt::RenderBrief;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    /// About 60 seconds.
    pub const MASK: PollPolicy = PollPolicy {
        interval: Duration::from_secs(2),
        max_attempts: 30,
    };

    /// About 80 seconds.
    pub const RENDER: PollPolicy = PollPolicy {
        interval: Duration::from_secs(2),
        max_attempts: 40,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub mask_poll: PollPolicy,
    pub render_poll: PollPolicy,
    pub control_strength: Option<f64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mask_poll: PollPolicy::MASK,
            render_poll: PollPolicy::RENDER,
            control_strength: Some(0.75),
        }
    }
}

struct PollTarget<'a> {
    kind: JobKind,
    job_id: &'a str,
    policy: PollPolicy,
    endpoints: &'a [StatusEndpoint],
    fields: &'a [ResultField],
    expected: &'static str,
}

#[derive(Clone)]
pub struct VisualizationJobOrchestrator {
    provider: Arc<dyn ImageProvider>,
    sleeper: Arc<dyn Sleeper>,
    config: OrchestratorConfig,
}

impl VisualizationJobOrchestrator {
    pub fn new(provider: Arc<dyn ImageProvider>) -> Self {
        Self {
            provider,
            sleeper: Arc::new(TokioSleeper),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs both stages to completion. On success the returned job is
    /// [`JobStage::Done`](super::JobStage::Done) and carries the result URL.
    pub async fn run(&self, brief: &RenderBrief) -> Result<VisualizationJob> {
        let mask_job_id = self.provider.submit_mask(&brief.image_url).await?;
        let mut job = VisualizationJob::mask_submitted(mask_job_id.clone());
        info!(mask_job_id = %mask_job_id, "Mask job submitted");

        let mask_target = PollTarget {
            kind: JobKind::Mask,
            job_id: &mask_job_id,
            policy: self.config.mask_poll,
            endpoints: MASK_STATUS_ENDPOINTS,
            fields: MASK_RESULT_FIELDS,
            expected: "mask URL",
        };
        let mask_url = match self.poll_until_done(&mut job, &mask_target).await {
            Ok(url) => url,
            Err(e) => return Err(abandon(&mut job, e)),
        };
        job.mask_ready(mask_url.clone());
        info!(
            mask_job_id = %mask_job_id,
            attempts = job.attempts_used(),
            "Mask ready"
        );

        let request = RenderJobRequest {
            image_url: brief.image_url.clone(),
            prompt: brief.prompt.clone(),
            mask_urls: vec![mask_url],
            negative_prompt: Some(brief.negative_prompt.clone()),
            control_strength: self.config.control_strength,
        };
        let render_job_id = match self.provider.submit_render(&request).await {
            Ok(id) => id,
            Err(e) => return Err(abandon(&mut job, e)),
        };
        job.render_submitted(render_job_id.clone());
        info!(render_job_id = %render_job_id, "Render job submitted");

        let render_target = PollTarget {
            kind: JobKind::Render,
            job_id: &render_job_id,
            policy: self.config.render_poll,
            endpoints: RENDER_STATUS_ENDPOINTS,
            fields: RENDER_RESULT_FIELDS,
            expected: "result URL",
        };
        let result_url = match self.poll_until_done(&mut job, &render_target).await {
            Ok(url) => url,
            Err(e) => return Err(abandon(&mut job, e)),
        };
        job.complete(result_url);
        info!(
            render_job_id = %render_job_id,
            attempts = job.attempts_used(),
            "Render complete"
        );

        Ok(job)
    }

    async fn poll_until_done(
        &self,
        job: &mut VisualizationJob,
        target: &PollTarget<'_>,
    ) -> Result<String> {
        for attempt in 1..=target.policy.max_attempts {
            self.sleeper.sleep(target.policy.interval).await;
            job.record_attempt();

            let details = match self.fetch_status(target.endpoints, target.job_id).await {
                Ok(details) => details,
                Err(e) => {
                    debug!(
                        kind = %target.kind,
                        job_id = %target.job_id,
                        attempt,
                        error = %e,
                        "Status fetch failed, will retry"
                    );
                    continue;
                }
            };

            match details.status() {
                JobStatus::Done => {
                    return details.first_url(target.fields).ok_or_else(|| {
                        VisualizationError::ResultShape {
                            kind: target.kind,
                            job_id: target.job_id.to_string(),
                            expected: target.expected,
                        }
                    });
                }
                JobStatus::Failed(status) => {
                    return Err(VisualizationError::TerminalJob {
                        kind: target.kind,
                        job_id: target.job_id.to_string(),
                        status,
                    });
                }
                JobStatus::Pending(status) => {
                    debug!(
                        kind = %target.kind,
                        job_id = %target.job_id,
                        attempt,
                        status = %status,
                        "Job still pending"
                    );
                }
            }
        }

        Err(VisualizationError::Timeout {
            kind: target.kind,
            job_id: target.job_id.to_string(),
            attempts: target.policy.max_attempts,
        })
    }

    /// Tries each endpoint in order, moving on only after a 404.
    async fn fetch_status(
        &self,
        endpoints: &[StatusEndpoint],
        job_id: &str,
    ) -> std::result::Result<JobDetails, PollError> {
        let mut last_error = PollError::Transient("no status endpoint configured".to_string());
        for endpoint in endpoints {
            match self.provider.fetch_job(*endpoint, job_id).await {
                Ok(details) => return Ok(details),
                Err(PollError::NotFound) => {
                    debug!(job_id = %job_id, endpoint = ?endpoint, "Status endpoint returned 404");
                    last_error = PollError::NotFound;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }
}

fn abandon(job: &mut VisualizationJob, error: VisualizationError) -> VisualizationError {
    job.terminate(error.terminal_stage());
    warn!(
        stage = ?job.stage(),
        mask_job_id = %job.mask_job_id(),
        render_job_id = ?job.render_job_id(),
        attempts = job.attempts_used(),
        error = %error,
        "Visualization job abandoned"
    );
    error
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{EstimateRequest, RoomType};
    use crate::visualization::JobStage;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    pub(crate) type Scripted = std::result::Result<JobDetails, PollError>;

    pub(crate) fn pending() -> Scripted {
        Ok(JobDetails::from_response(json!({ "data": { "job_status": "pending" } })))
    }

    pub(crate) fn done_with(field: &str, url: &str) -> Scripted {
        Ok(JobDetails::from_response(
            json!({ "data": { "job_status": "done", field: url } }),
        ))
    }

    pub(crate) fn status(value: &str) -> Scripted {
        Ok(JobDetails::from_response(json!({ "data": { "job_status": value } })))
    }

    /// Provider that replays scripted status responses per job id. Exhausted
    /// scripts keep answering "pending".
    #[derive(Default)]
    pub(crate) struct ScriptedProvider {
        pub mask_job_id: Option<String>,
        pub render_job_id: Option<String>,
        pub scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
        pub fetches: Mutex<Vec<(StatusEndpoint, String)>>,
        pub render_requests: Mutex<Vec<RenderJobRequest>>,
    }

    impl ScriptedProvider {
        pub(crate) fn new() -> Self {
            Self {
                mask_job_id: Some("mask-1".to_string()),
                render_job_id: Some("render-1".to_string()),
                ..Self::default()
            }
        }

        pub(crate) fn script(self, job_id: &str, responses: Vec<Scripted>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(job_id.to_string(), responses.into());
            self
        }

        pub(crate) fn fetch_count(&self, job_id: &str) -> usize {
            self.fetches
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, id)| id == job_id)
                .count()
        }
    }

    #[async_trait]
    impl ImageProvider for ScriptedProvider {
        async fn submit_mask(&self, _image_url: &str) -> Result<String> {
            self.mask_job_id
                .clone()
                .ok_or_else(|| VisualizationError::Submission {
                    kind: JobKind::Mask,
                    message: "401 Unauthorized".to_string(),
                })
        }

        async fn submit_render(&self, request: &RenderJobRequest) -> Result<String> {
            self.render_requests.lock().unwrap().push(request.clone());
            self.render_job_id
                .clone()
                .ok_or_else(|| VisualizationError::Submission {
                    kind: JobKind::Render,
                    message: "missing job_id".to_string(),
                })
        }

        async fn fetch_job(
            &self,
            endpoint: StatusEndpoint,
            job_id: &str,
        ) -> std::result::Result<JobDetails, PollError> {
            self.fetches
                .lock()
                .unwrap()
                .push((endpoint, job_id.to_string()));
            self.scripts
                .lock()
                .unwrap()
                .get_mut(job_id)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(pending)
        }
    }

    #[derive(Default)]
    pub(crate) struct CountingSleeper {
        pub sleeps: AtomicU32,
    }

    #[async_trait]
    impl Sleeper for CountingSleeper {
        async fn sleep(&self, _duration: Duration) {
            self.sleeps.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn brief() -> RenderBrief {
        let mut request = EstimateRequest::new(RoomType::Kitchen);
        request.image_url = Some("https://cdn.example.com/kitchen.jpg".to_string());
        RenderBrief::from_request(&request).unwrap()
    }

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        sleeper: Arc<CountingSleeper>,
    ) -> VisualizationJobOrchestrator {
        VisualizationJobOrchestrator::new(provider).with_sleeper(sleeper)
    }

    fn repeat(response: fn() -> Scripted, times: usize) -> Vec<Scripted> {
        (0..times).map(|_| response()).collect()
    }

    #[tokio::test]
    async fn runs_both_stages_to_done() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .script(
                    "mask-1",
                    vec![pending(), done_with("mask_url", "https://cdn.example.com/mask.png")],
                )
                .script(
                    "render-1",
                    vec![pending(), done_with("result_url", "https://cdn.example.com/render.png")],
                ),
        );
        let sleeper = Arc::new(CountingSleeper::default());

        let job = orchestrator(provider.clone(), sleeper.clone())
            .run(&brief())
            .await
            .unwrap();

        assert_eq!(job.stage(), JobStage::Done);
        assert_eq!(job.mask_url(), Some("https://cdn.example.com/mask.png"));
        assert_eq!(job.result_url(), Some("https://cdn.example.com/render.png"));
        assert_eq!(job.attempts_used(), 4);
        assert_eq!(sleeper.sleeps.load(Ordering::SeqCst), 4);

        let requests = provider.render_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].mask_urls, vec!["https://cdn.example.com/mask.png"]);
        assert_eq!(requests[0].image_url, "https://cdn.example.com/kitchen.jpg");
        assert_eq!(requests[0].control_strength, Some(0.75));
    }

    #[tokio::test]
    async fn mask_done_on_last_allowed_attempt_succeeds() {
        let mut mask_script = repeat(pending, 29);
        mask_script.push(done_with("result_url", "https://cdn.example.com/mask.png"));
        let provider = Arc::new(
            ScriptedProvider::new()
                .script("mask-1", mask_script)
                .script(
                    "render-1",
                    vec![done_with("generated_image_url", "https://cdn.example.com/r.png")],
                ),
        );

        let job = orchestrator(provider.clone(), Arc::new(CountingSleeper::default()))
            .run(&brief())
            .await
            .unwrap();

        assert_eq!(provider.fetch_count("mask-1"), 30);
        assert_eq!(job.attempts_used(), 31);
        assert_eq!(job.result_url(), Some("https://cdn.example.com/r.png"));
    }

    #[tokio::test]
    async fn mask_polling_times_out_after_thirty_attempts() {
        let provider = Arc::new(ScriptedProvider::new());
        let sleeper = Arc::new(CountingSleeper::default());

        let error = orchestrator(provider.clone(), sleeper.clone())
            .run(&brief())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            VisualizationError::Timeout { kind: JobKind::Mask, attempts: 30, .. }
        ));
        assert_eq!(error.terminal_stage(), JobStage::TimedOut);
        assert_eq!(provider.fetch_count("mask-1"), 30);
        assert_eq!(sleeper.sleeps.load(Ordering::SeqCst), 30);
        assert!(provider.render_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn render_polling_times_out_after_forty_attempts() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .script("mask-1", vec![done_with("mask_url", "https://cdn.example.com/m.png")]),
        );

        let error = orchestrator(provider.clone(), Arc::new(CountingSleeper::default()))
            .run(&brief())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            VisualizationError::Timeout { kind: JobKind::Render, attempts: 40, .. }
        ));
        assert_eq!(provider.fetch_count("render-1"), 40);
    }

    #[tokio::test]
    async fn terminal_status_stops_polling() {
        let provider = Arc::new(ScriptedProvider::new().script("mask-1", vec![pending(), status("error")]));

        let error = orchestrator(provider.clone(), Arc::new(CountingSleeper::default()))
            .run(&brief())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            VisualizationError::TerminalJob { kind: JobKind::Mask, ref status, .. } if status == "error"
        ));
        assert_eq!(error.terminal_stage(), JobStage::Failed);
        assert_eq!(provider.fetch_count("mask-1"), 2);
    }

    #[tokio::test]
    async fn render_404_falls_through_to_alternate_endpoint() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .script("mask-1", vec![done_with("mask_url", "https://cdn.example.com/m.png")])
                .script(
                    "render-1",
                    vec![
                        Err(PollError::NotFound),
                        done_with("result_url", "https://cdn.example.com/r.png"),
                    ],
                ),
        );

        let job = orchestrator(provider.clone(), Arc::new(CountingSleeper::default()))
            .run(&brief())
            .await
            .unwrap();

        assert_eq!(job.result_url(), Some("https://cdn.example.com/r.png"));
        // One attempt per stage: the alternate endpoint is part of the same attempt.
        assert_eq!(job.attempts_used(), 2);
        let fetches = provider.fetches.lock().unwrap();
        let render_endpoints: Vec<StatusEndpoint> = fetches
            .iter()
            .filter(|(_, id)| id == "render-1")
            .map(|(endpoint, _)| *endpoint)
            .collect();
        assert_eq!(
            render_endpoints,
            vec![StatusEndpoint::JobDetails, StatusEndpoint::GenerateImage]
        );
    }

    #[tokio::test]
    async fn both_endpoints_missing_counts_as_one_transient_attempt() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .script("mask-1", vec![done_with("mask_url", "https://cdn.example.com/m.png")])
                .script(
                    "render-1",
                    vec![
                        Err(PollError::NotFound),
                        Err(PollError::NotFound),
                        done_with("result_url", "https://cdn.example.com/r.png"),
                    ],
                ),
        );

        let job = orchestrator(provider.clone(), Arc::new(CountingSleeper::default()))
            .run(&brief())
            .await
            .unwrap();

        assert_eq!(job.attempts_used(), 3);
        assert_eq!(provider.fetch_count("render-1"), 3);
    }

    #[tokio::test]
    async fn mask_polling_never_tries_alternate_endpoint() {
        let provider = Arc::new(ScriptedProvider::new().script(
            "mask-1",
            vec![
                Err(PollError::NotFound),
                done_with("mask_url", "https://cdn.example.com/m.png"),
            ],
        ));

        orchestrator(provider.clone(), Arc::new(CountingSleeper::default()))
            .run(&brief())
            .await
            .unwrap_err();

        let fetches = provider.fetches.lock().unwrap();
        assert!(
            fetches
                .iter()
                .filter(|(_, id)| id == "mask-1")
                .all(|(endpoint, _)| *endpoint == StatusEndpoint::JobDetails)
        );
    }

    #[tokio::test]
    async fn transient_failures_consume_attempts_and_continue() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .script(
                    "mask-1",
                    vec![
                        Err(PollError::Transient("502 Bad Gateway".to_string())),
                        Err(PollError::Transient("connection reset".to_string())),
                        done_with("mask_url", "https://cdn.example.com/m.png"),
                    ],
                )
                .script("render-1", vec![done_with("result_url", "https://cdn.example.com/r.png")]),
        );

        let job = orchestrator(provider.clone(), Arc::new(CountingSleeper::default()))
            .run(&brief())
            .await
            .unwrap();

        assert_eq!(provider.fetch_count("mask-1"), 3);
        assert_eq!(job.attempts_used(), 4);
    }

    #[tokio::test]
    async fn done_without_url_is_a_result_shape_fault() {
        let provider = Arc::new(ScriptedProvider::new().script("mask-1", vec![status("done")]));

        let error = orchestrator(provider.clone(), Arc::new(CountingSleeper::default()))
            .run(&brief())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            VisualizationError::ResultShape { kind: JobKind::Mask, .. }
        ));
        assert_eq!(provider.fetch_count("mask-1"), 1);
    }

    #[tokio::test]
    async fn submission_faults_are_not_retried() {
        let provider = Arc::new(ScriptedProvider {
            mask_job_id: None,
            ..ScriptedProvider::new()
        });
        let sleeper = Arc::new(CountingSleeper::default());

        let error = orchestrator(provider.clone(), sleeper.clone())
            .run(&brief())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            VisualizationError::Submission { kind: JobKind::Mask, .. }
        ));
        assert!(provider.fetches.lock().unwrap().is_empty());
        assert_eq!(sleeper.sleeps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn render_submission_fault_after_mask_ready() {
        let provider = Arc::new(
            ScriptedProvider {
                render_job_id: None,
                ..ScriptedProvider::new()
            }
            .script("mask-1", vec![done_with("mask_url", "https://cdn.example.com/m.png")]),
        );

        let error = orchestrator(provider.clone(), Arc::new(CountingSleeper::default()))
            .run(&brief())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            VisualizationError::Submission { kind: JobKind::Render, .. }
        ));
        assert_eq!(provider.render_requests.lock().unwrap().len(), 1);
    }
}

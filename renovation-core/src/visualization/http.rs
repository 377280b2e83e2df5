use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::provider::{ImageProvider, JobDetails, RenderJobRequest, StatusEndpoint, job_id_from};
use crate::error::{JobKind, PollError, Result, VisualizationError};

/// How the provider API key is attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthScheme {
    /// `api-key: <key>`
    ApiKeyHeader,
    /// `Authorization: Bearer <key>`
    Bearer,
}

impl AuthScheme {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "api-key" | "api_key" | "header" => Some(AuthScheme::ApiKeyHeader),
            "bearer" => Some(AuthScheme::Bearer),
            _ => None,
        }
    }

    pub(crate) fn apply(self, builder: RequestBuilder, key: &SecretString) -> RequestBuilder {
        match self {
            AuthScheme::ApiKeyHeader => builder.header("api-key", key.expose_secret()),
            AuthScheme::Bearer => builder.bearer_auth(key.expose_secret()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: SecretString,
    /// Used for `create_mask` and `get_job_details`.
    pub mask_auth: AuthScheme,
    /// Used for both `generate_image` routes.
    pub render_auth: AuthScheme,
    pub request_timeout: Duration,
}

impl ProviderSettings {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            mask_auth: AuthScheme::ApiKeyHeader,
            render_auth: AuthScheme::Bearer,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn auth_for(&self, endpoint: StatusEndpoint) -> AuthScheme {
        match endpoint {
            StatusEndpoint::JobDetails => self.mask_auth,
            StatusEndpoint::GenerateImage => self.render_auth,
        }
    }
}

/// reqwest client for the mask + render provider.
#[derive(Clone)]
pub struct HttpImageProvider {
    client: Client,
    settings: ProviderSettings,
}

impl HttpImageProvider {
    pub fn new(settings: ProviderSettings) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.request_timeout).build()?;
        Ok(Self { client, settings })
    }

    async fn submit(
        &self,
        kind: JobKind,
        path: &str,
        auth: AuthScheme,
        body: &impl Serialize,
    ) -> Result<String> {
        let request = self.client.post(self.settings.url(path)).json(body);
        let response = auth
            .apply(request, &self.settings.api_key)
            .send()
            .await
            .map_err(|e| VisualizationError::Submission {
                kind,
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        submission_job_id(kind, status, &body)
    }
}

/// Job id from a submission response, or the reason there is none.
pub(crate) fn submission_job_id(kind: JobKind, status: StatusCode, body: &str) -> Result<String> {
    let submission_error = |message: String| VisualizationError::Submission { kind, message };

    if !status.is_success() {
        return Err(submission_error(format!("HTTP {status}: {}", truncate(body))));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| submission_error(format!("invalid response body: {e}")))?;

    job_id_from(&value)
        .ok_or_else(|| submission_error("response did not include data.job_id".to_string()))
}

/// Maps a status endpoint response onto job details. A 404 sends polling to
/// the next endpoint; any other failure is retried on the next attempt.
pub(crate) fn job_details_from(
    status: StatusCode,
    body: &str,
) -> std::result::Result<JobDetails, PollError> {
    match status {
        StatusCode::NOT_FOUND => Err(PollError::NotFound),
        status if !status.is_success() => Err(PollError::Transient(format!("HTTP {status}"))),
        _ => serde_json::from_str::<Value>(body)
            .map(JobDetails::from_response)
            .map_err(|e| PollError::Transient(format!("invalid status body: {e}"))),
    }
}

#[async_trait]
impl ImageProvider for HttpImageProvider {
    async fn submit_mask(&self, image_url: &str) -> Result<String> {
        let body = serde_json::json!({ "image_url": image_url });
        self.submit(JobKind::Mask, "create_mask", self.settings.mask_auth, &body)
            .await
    }

    async fn submit_render(&self, request: &RenderJobRequest) -> Result<String> {
        self.submit(
            JobKind::Render,
            "generate_image",
            self.settings.render_auth,
            request,
        )
        .await
    }

    async fn fetch_job(
        &self,
        endpoint: StatusEndpoint,
        job_id: &str,
    ) -> std::result::Result<JobDetails, PollError> {
        let request = self.client.get(self.settings.url(&endpoint.path(job_id)));
        let response = self
            .settings
            .auth_for(endpoint)
            .apply(request, &self.settings.api_key)
            .send()
            .await
            .map_err(|e| PollError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!(job_id = %job_id, status = %status, "Status endpoint returned an error");
        }
        let body = response
            .text()
            .await
            .map_err(|e| PollError::Transient(format!("unreadable status body: {e}")))?;
        job_details_from(status, &body)
    }
}

pub(crate) fn truncate(text: &str) -> &str {
    const LIMIT: usize = 300;
    match text.char_indices().nth(LIMIT) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

//! Boundary to the external mask + render image provider.
//!
//! The provider's response shapes vary between endpoints, so status endpoints
//! and result fields are modelled as ordered candidate lists that the
//! orchestrator walks in a fixed sequence.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{PollError, Result};

/// Where a job's status can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEndpoint {
    /// `GET /get_job_details/{job_id}`
    JobDetails,
    /// `GET /generate_image/{job_id}`
    GenerateImage,
}

impl StatusEndpoint {
    pub fn path(&self, job_id: &str) -> String {
        match self {
            StatusEndpoint::JobDetails => format!("get_job_details/{job_id}"),
            StatusEndpoint::GenerateImage => format!("generate_image/{job_id}"),
        }
    }
}

pub const MASK_STATUS_ENDPOINTS: &[StatusEndpoint] = &[StatusEndpoint::JobDetails];
/// Primary first; the alternate is only consulted after a 404.
pub const RENDER_STATUS_ENDPOINTS: &[StatusEndpoint] =
    &[StatusEndpoint::JobDetails, StatusEndpoint::GenerateImage];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Done,
    Failed(String),
    /// Anything that is neither done nor failed, including unknown statuses.
    Pending(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "done" => JobStatus::Done,
            "error" | "failed" => JobStatus::Failed(raw.to_string()),
            _ => JobStatus::Pending(raw.to_string()),
        }
    }
}

/// The `data` object of a job status response.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDetails {
    data: Value,
}

impl JobDetails {
    pub fn from_response(body: Value) -> Self {
        match body {
            Value::Object(mut map) if map.contains_key("data") => Self {
                data: map.remove("data").unwrap_or(Value::Null),
            },
            other => Self { data: other },
        }
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::parse(self.data["job_status"].as_str().unwrap_or("pending"))
    }

    /// First non-empty URL among `fields`, tried in order.
    pub fn first_url(&self, fields: &[ResultField]) -> Option<String> {
        fields.iter().find_map(|field| field.extract(&self.data))
    }
}

/// Candidate locations of a finished job's output URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultField {
    ResultUrl,
    MaskUrl,
    GeneratedImageUrl,
    /// First element of `outputs`, either a string or an object with `url`.
    FirstOutput,
}

impl ResultField {
    pub fn extract(&self, data: &Value) -> Option<String> {
        let value = match self {
            ResultField::ResultUrl => data.get("result_url"),
            ResultField::MaskUrl => data.get("mask_url"),
            ResultField::GeneratedImageUrl => data.get("generated_image_url"),
            ResultField::FirstOutput => data
                .get("outputs")
                .and_then(|outputs| outputs.get(0))
                .and_then(|first| match first {
                    Value::Object(output) => output.get("url"),
                    other => Some(other),
                }),
        };
        value
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }
}

pub const MASK_RESULT_FIELDS: &[ResultField] = &[ResultField::ResultUrl, ResultField::MaskUrl];
pub const RENDER_RESULT_FIELDS: &[ResultField] = &[
    ResultField::ResultUrl,
    ResultField::GeneratedImageUrl,
    ResultField::FirstOutput,
];

/// Reads `data.job_id` from a submission response; numeric ids are accepted.
pub fn job_id_from(body: &Value) -> Option<String> {
    match &body["data"]["job_id"] {
        Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Body of `POST /generate_image`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderJobRequest {
    pub image_url: String,
    pub prompt: String,
    pub mask_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_strength: Option<f64>,
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// `POST /create_mask`; returns the mask job id.
    async fn submit_mask(&self, image_url: &str) -> Result<String>;

    /// `POST /generate_image`; returns the render job id.
    async fn submit_render(&self, request: &RenderJobRequest) -> Result<String>;

    async fn fetch_job(
        &self,
        endpoint: StatusEndpoint,
        job_id: &str,
    ) -> std::result::Result<JobDetails, PollError>;
}

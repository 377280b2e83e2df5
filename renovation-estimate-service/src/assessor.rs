use anyhow::anyhow;
use async_trait::async_trait;
use renovation_core::{Complexity, Condition, EstimateRequest, SpaceAssessment};
use reqwest::Client;
use rig::{client::CompletionClient, completion::Prompt, providers::openrouter};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::AssessorSettings;

const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const MAX_TOKENS: u32 = 600;

const ASSESSOR_PREAMBLE: &str = r#"
You are an experienced renovation estimator. Assess the space described by the homeowner
(and shown in the photo, when one is attached).

Respond with a single JSON object and nothing else:
{
  "squareFootage": <number, inside the homeowner's selected range when one is given>,
  "complexity": "low" | "medium" | "high",
  "condition": "good" | "fair" | "poor",
  "estimatedWeeks": <number>,
  "notes": "<two or three sentences on what drives the cost>"
}
"#;

/// Turns a request (photo plus answers) into a [`SpaceAssessment`].
#[async_trait]
pub trait SpaceAssessor: Send + Sync {
    async fn assess(&self, request: &EstimateRequest) -> anyhow::Result<SpaceAssessment>;
}

/// OpenRouter-backed assessor: vision chat completion when the request has a
/// photo, a plain rig agent prompt otherwise.
pub struct LlmSpaceAssessor {
    client: Client,
    api_key: SecretString,
    model: String,
}

impl LlmSpaceAssessor {
    pub fn new(settings: AssessorSettings) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(settings.request_timeout).build()?;
        Ok(Self {
            client,
            api_key: settings.api_key,
            model: settings.model,
        })
    }

    async fn assess_photo(&self, prompt: &str, image_url: &str) -> anyhow::Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": ASSESSOR_PREAMBLE },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": prompt },
                        { "type": "image_url", "image_url": { "url": image_url } }
                    ]
                }
            ],
            "max_tokens": MAX_TOKENS
        });

        let response = self
            .client
            .post(OPENROUTER_CHAT_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Assessor request failed: {}", response.status()));
        }

        let response_json: Value = response.json().await?;
        response_json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid response format from assessor model"))
    }

    async fn assess_answers(&self, prompt: &str) -> anyhow::Result<String> {
        let client = openrouter::Client::new(self.api_key.expose_secret());
        let agent = client.agent(&self.model).preamble(ASSESSOR_PREAMBLE).build();
        Ok(agent.prompt(prompt).await?)
    }
}

#[async_trait]
impl SpaceAssessor for LlmSpaceAssessor {
    async fn assess(&self, request: &EstimateRequest) -> anyhow::Result<SpaceAssessment> {
        let prompt = build_prompt(request);

        let reply = match request.photo_url() {
            Some(image_url) => {
                info!(room_type = %request.room_type, "Assessing space from photo");
                self.assess_photo(&prompt, image_url).await?
            }
            None => {
                info!(room_type = %request.room_type, "Assessing space from answers only");
                self.assess_answers(&prompt).await?
            }
        };

        debug!(reply = %reply, "Assessor reply");
        parse_assessment(&reply)
    }
}

/// Describes the project in plain text for the model.
pub fn build_prompt(request: &EstimateRequest) -> String {
    let answers = &request.user_answers;
    let mut lines = vec![format!("Project type: {}", request.room_type.label())];

    let details = [
        ("Selected size", &answers.square_footage_range),
        ("Finish level", &answers.finish_level),
        ("Current condition", &answers.current_condition),
        ("Property type", &answers.property_type),
        ("Location", &answers.location),
        ("Priority", &answers.priority),
        ("Timeline", &answers.timeline),
    ];
    for (label, value) in details {
        if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            lines.push(format!("{label}: {value}"));
        }
    }

    if !request.selected_finishes.is_empty() {
        let finishes: Vec<String> = request
            .selected_finishes
            .iter()
            .map(|(category, selection)| format!("{category}: {selection}"))
            .collect();
        lines.push(format!("Selected finishes: {}", finishes.join(", ")));
    }

    lines.join("\n")
}

/// Parses the model reply. Only the text between the first `{` and the last
/// `}` is considered; fields that are missing or unrecognised stay `None`.
pub fn parse_assessment(reply: &str) -> anyhow::Result<SpaceAssessment> {
    let json_str = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if end > start => &reply[start..=end],
        _ => return Err(anyhow!("Assessor reply contained no JSON object")),
    };

    let value: Value = serde_json::from_str(json_str)?;

    Ok(SpaceAssessment {
        square_footage: number(&value["squareFootage"]).filter(|sqft| *sqft > 0.0),
        complexity: value["complexity"].as_str().and_then(Complexity::parse),
        condition: value["condition"].as_str().and_then(Condition::parse),
        estimated_weeks: number(&value["estimatedWeeks"]).filter(|weeks| *weeks > 0.0),
        notes: value["notes"].as_str().unwrap_or_default().trim().to_string(),
    })
}

// Models sometimes quote numbers.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

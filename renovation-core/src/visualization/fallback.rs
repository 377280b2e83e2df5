use async_trait::async_trait;

use crate::error::Result;
use crate::model::RoomType;
use crate::prompt::StyleHints;

/// Single-shot image generation used when the masked pipeline fails.
#[async_trait]
pub trait FallbackRenderer: Send + Sync {
    async fn render(
        &self,
        image_url: &str,
        room_type: &RoomType,
        style: &StyleHints,
    ) -> Result<String>;
}

#[cfg(feature = "provider")]
pub use http::{FallbackSettings, HttpFallbackRenderer};

#[cfg(feature = "provider")]
mod http {
    use async_trait::async_trait;
    use reqwest::Client;
    use secrecy::{ExposeSecret, SecretString};
    use serde_json::{Value, json};
    use std::time::Duration;

    use super::FallbackRenderer;
    use crate::error::{Result, VisualizationError};
    use crate::model::RoomType;
    use crate::prompt::StyleHints;
    use crate::visualization::http::truncate;

    /// JSON pointers tried, in order, for the generated image URL.
    const RESULT_POINTERS: [&str; 3] = ["/data/0/url", "/url", "/output/0"];

    #[derive(Debug, Clone)]
    pub struct FallbackSettings {
        pub endpoint: String,
        pub api_key: SecretString,
        pub model: String,
        pub request_timeout: Duration,
    }

    #[derive(Clone)]
    pub struct HttpFallbackRenderer {
        client: Client,
        settings: FallbackSettings,
    }

    impl HttpFallbackRenderer {
        pub fn new(settings: FallbackSettings) -> std::result::Result<Self, reqwest::Error> {
            let client = Client::builder().timeout(settings.request_timeout).build()?;
            Ok(Self { client, settings })
        }
    }

    pub(super) fn result_url(body: &Value) -> Option<String> {
        RESULT_POINTERS.iter().find_map(|pointer| {
            body.pointer(pointer)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
        })
    }

    #[async_trait]
    impl FallbackRenderer for HttpFallbackRenderer {
        async fn render(
            &self,
            image_url: &str,
            room_type: &RoomType,
            style: &StyleHints,
        ) -> Result<String> {
            let payload = json!({
                "model": self.settings.model,
                "prompt": style.render_prompt(room_type),
                "image_url": image_url,
                "n": 1
            });

            let response = self
                .client
                .post(&self.settings.endpoint)
                .bearer_auth(self.settings.api_key.expose_secret())
                .json(&payload)
                .send()
                .await
                .map_err(|e| VisualizationError::Fallback(format!("request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(VisualizationError::Fallback(format!(
                    "HTTP {status}: {}",
                    truncate(&detail)
                )));
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| VisualizationError::Fallback(format!("invalid response body: {e}")))?;

            result_url(&body)
                .ok_or_else(|| VisualizationError::Fallback("response contained no image URL".to_string()))
        }
    }
}

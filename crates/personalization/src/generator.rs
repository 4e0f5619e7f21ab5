//! Text generation providers.

use async_trait::async_trait;
use campaign_core::config::GenerationConfig;
use campaign_core::error::GenerationError;
use campaign_core::TextGenerator;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Chat-completions client for any OpenAI-compatible API.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Self {
        info!(
            endpoint = %config.endpoint,
            model = %config.model,
            max_tokens = config.max_tokens,
            "Text generator initialized"
        );
        Self {
            client: reqwest::Client::new(),
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let start = std::time::Instant::now();
        let url = format!("{}/chat/completions", self.base_url);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Text generation rejected");
            metrics::counter!("generation.errors").increment(1);
            return Err(GenerationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let text = completion_text(&payload).ok_or(GenerationError::EmptyResponse)?;

        metrics::histogram!("generation.latency_ms").record(start.elapsed().as_millis() as f64);
        debug!(chars = text.len(), "Text generated");
        Ok(text)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// First choice's text, from either the chat or the legacy completions shape.
fn completion_text(payload: &Value) -> Option<String> {
    let choice = payload.get("choices")?.get(0)?;
    let text = choice
        .pointer("/message/content")
        .or_else(|| choice.get("text"))?
        .as_str()?
        .trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Returns the rendered prompt unchanged. Used when no generation key is
/// configured, so campaigns send the template text itself.
pub struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        Ok(prompt.to_string())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

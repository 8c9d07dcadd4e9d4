//! OpenAI-compatible chat completions client.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::GatewayConfig;

#[derive(Debug, Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

/// Sampling settings for one completion.
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A model that answers a system + user prompt with a JSON object. Blocking.
pub trait ChatModel: Send + Sync {
    fn complete_json(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        sampling: Sampling,
    ) -> Result<Value, String>;
}

/// Blocking chat completions client. Cheap to clone.
#[derive(Clone)]
pub struct ChatGateway {
    agent: ureq::Agent,
    url: String,
    api_key: String,
}

impl ChatGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();
        Self {
            agent,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

impl ChatModel for ChatGateway {
    /// Run a completion in JSON mode and parse the answer.
    fn complete_json(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        sampling: Sampling,
    ) -> Result<Value, String> {
        debug!(model, "Chat completion");
        let body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
            "temperature": sampling.temperature,
            "max_tokens": sampling.max_tokens,
            "response_format": { "type": "json_object" },
        });

        let mut response = self
            .agent
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(&body)
            .map_err(|e| e.to_string())?;
        let completion: Completion = response
            .body_mut()
            .read_json()
            .map_err(|e| e.to_string())?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| "completion has no choices".to_string())?;

        parse_json_answer(&content)
    }
}

/// Parse a model answer as JSON, tolerating a markdown code fence around it.
pub(crate) fn parse_json_answer(content: &str) -> Result<Value, String> {
    let mut cleaned = content.trim();
    if cleaned.starts_with("```") {
        cleaned = cleaned.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    }
    if let Some(stripped) = cleaned.trim_end().strip_suffix("```") {
        cleaned = stripped;
    }

    serde_json::from_str(cleaned.trim()).map_err(|e| {
        let preview: String = content.chars().take(200).collect();
        format!("model answer is not JSON ({}): {}", e, preview)
    })
}

//! Text generation provider abstraction and implementations.
//!
//! Defines the [`Generator`] trait and two hosted backends:
//! - **[`HuggingFaceGenerator`]**: the Hugging Face Inference API
//!   text-generation task (the default).
//! - **[`OpenAIGenerator`]**: the OpenAI chat completions API.
//!
//! Use [`create_generator`] to pick a backend from configuration. Like the
//! embedders, requests are single-shot: a failed call surfaces to the caller
//! and nothing is retried.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;

/// Trait for text generation backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"mistralai/Mistral-7B-Instruct-v0.2"`).
    fn model_name(&self) -> &str;

    /// Produce a completion for the rendered prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

impl std::fmt::Debug for dyn Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("model", &self.model_name())
            .finish()
    }
}

/// Create the appropriate [`Generator`] based on configuration.
///
/// | Config value | Backend |
/// |--------------|---------|
/// | `"huggingface"` | [`HuggingFaceGenerator`] |
/// | `"openai"` | [`OpenAIGenerator`] |
///
/// Fails for unknown provider names or when the provider's API token is not
/// in the environment.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "huggingface" => Ok(Arc::new(HuggingFaceGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        other => bail!(
            "Unknown generation provider: '{}'. Must be huggingface or openai.",
            other
        ),
    }
}

// ============ Hugging Face provider ============

/// Generation via the Hugging Face Inference API text-generation task.
///
/// Sends `POST https://api-inference.huggingface.co/models/<model>` with the
/// prompt under `"inputs"` and sampling parameters alongside. Requires the
/// `HUGGINGFACEHUB_API_TOKEN` environment variable.
pub struct HuggingFaceGenerator {
    model: String,
    url: String,
    api_token: String,
    max_new_tokens: u32,
    temperature: f64,
    client: reqwest::Client,
}

impl HuggingFaceGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_token = std::env::var("HUGGINGFACEHUB_API_TOKEN")
            .map_err(|_| anyhow::anyhow!("HUGGINGFACEHUB_API_TOKEN environment variable not set"))?;
        let url = config.url.clone().unwrap_or_else(|| {
            format!(
                "https://api-inference.huggingface.co/models/{}",
                config.model
            )
        });
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            url,
            api_token,
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl Generator for HuggingFaceGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": self.max_new_tokens,
                "temperature": self.temperature,
                "do_sample": true,
                "return_full_text": false,
            },
            "options": { "wait_for_model": true },
        });

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&body)
            .send()
            .await
            .context("generation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Hugging Face API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_generated_text(&json)
    }
}

/// Extract the completion from a text-generation response.
///
/// The API answers with `[{"generated_text": "..."}]`; a 200 response can
/// still carry an `{"error": "..."}` payload while a model loads, so that is
/// checked first.
fn parse_generated_text(json: &serde_json::Value) -> Result<String> {
    if let Some(message) = json.get("error").and_then(|e| e.as_str()) {
        bail!("Hugging Face API error: {}", message);
    }
    json.get(0)
        .and_then(|entry| entry.get("generated_text"))
        .and_then(|text| text.as_str())
        .map(|text| text.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid generation response: missing generated_text"))
}

// ============ OpenAI provider ============

/// Generation via the OpenAI chat completions API. The rendered prompt is
/// sent as a single user message. Requires the `OPENAI_API_KEY` environment
/// variable.
pub struct OpenAIGenerator {
    model: String,
    url: String,
    api_key: String,
    max_new_tokens: u32,
    temperature: f64,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            url,
            api_key,
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": self.max_new_tokens,
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("generation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

/// Extract the assistant message from a chat completions response.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|content| content.as_str())
        .map(|content| content.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generated_text() {
        let json = serde_json::json!([{ "generated_text": " Paris is the capital of France." }]);
        let text = parse_generated_text(&json).unwrap();
        assert_eq!(text, " Paris is the capital of France.");
    }

    #[test]
    fn test_parse_generated_text_surfaces_error_payload() {
        let json = serde_json::json!({ "error": "Model is currently loading" });
        let err = parse_generated_text(&json).unwrap_err().to_string();
        assert!(err.contains("currently loading"));
    }

    #[test]
    fn test_parse_generated_text_rejects_missing_field() {
        let json = serde_json::json!([{ "score": 0.5 }]);
        assert!(parse_generated_text(&json).is_err());
    }

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hello there" } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "Hello there");
    }

    #[test]
    fn test_parse_chat_response_rejects_empty_choices() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_chat_response(&json).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut config = GenerationConfig::default();
        config.provider = "smoke-signals".to_string();
        let err = create_generator(&config).unwrap_err().to_string();
        assert!(err.contains("Unknown generation provider"));
    }
}

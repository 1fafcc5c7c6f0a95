//! OpenAI-compatible chat completions client.
//!
//! Works with any service exposing `POST {endpoint}/chat/completions` with
//! bearer auth (OpenAI, DeepSeek, Qwen/DashScope compatible mode, vLLM ...).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

use super::LlmProvider;
use crate::config::LlmConfig;

const MAX_TOKENS: u32 = 1024;

pub struct OpenAiCompatibleClient {
    api_key: Option<String>,
    endpoint: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    /// Built on first use: a blocking client must not be created on an async worker thread.
    client: OnceLock<reqwest::blocking::Client>,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(self.client.get_or_init(|| client))
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }

    fn request(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("LLM API key not configured (set SQUIRREL_LLM_API_KEY)");
        };

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens: MAX_TOKENS,
            temperature: self.temperature,
        };

        let response = self
            .client()?
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .with_context(|| format!("LLM request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("LLM API returned {status}: {}", truncate(&body, 300));
        }

        let response: ChatCompletionResponse =
            response.json().context("failed to decode LLM response")?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("LLM response contained no choices")
    }
}

impl LlmProvider for OpenAiCompatibleClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn complete(&self, system: &str, user: &str) -> Result<String> {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: user.to_string(),
            },
        ];
        tracing::debug!(model = %self.model, prompt_chars = user.chars().count(), "LLM request");
        self.request(messages)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

//! LLM collaborator used for note classification and topic summaries.
//!
//! Provides the [`LlmProvider`] trait, an OpenAI-compatible HTTP client, the
//! prompt builders and the lenient response parsers. The provider is created
//! via [`create_provider`] from configuration.

pub mod openai;
pub mod parse;
pub mod prompts;

use anyhow::Result;

/// Trait for a chat-style text completion service.
///
/// All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait LlmProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Run one completion with a system and a user message, returning the raw text.
    fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Provider used when `llm.provider = "disabled"`. Every call fails, so notes
/// end up `failed` and can be retried once a real provider is configured.
pub struct DisabledProvider;

impl LlmProvider for DisabledProvider {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        anyhow::bail!("LLM provider is disabled")
    }
}

/// Create an LLM provider from config.
pub fn create_provider(config: &crate::config::LlmConfig) -> Result<Box<dyn LlmProvider>> {
    match config.provider.as_str() {
        "openai" => {
            let client = openai::OpenAiCompatibleClient::from_config(config);
            if config.api_key.is_none() {
                tracing::warn!("no LLM API key configured; note analysis will fail until one is set");
            }
            Ok(Box::new(client))
        }
        "disabled" => Ok(Box::new(DisabledProvider)),
        other => anyhow::bail!("unknown LLM provider: {other}. Supported: openai, disabled"),
    }
}

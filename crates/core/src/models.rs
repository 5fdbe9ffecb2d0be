//! # Studio Models
//!
//! Centralized LLM provider configuration for the generation pipeline.
//! Every supported provider exposes an OpenAI-compatible chat completions
//! endpoint, so a single HTTP client covers all of them.

use serde::{Deserialize, Serialize};

/// Supported LLM providers
///
/// API keys are read from the environment:
/// - Anthropic (Claude) - `ANTHROPIC_API_KEY`
/// - OpenAI (GPT) - `OPENAI_API_KEY`
/// - Gemini (Google) - `GEMINI_API_KEY`
/// - OpenRouter (Gateway) - `OPENROUTER_API_KEY`
/// - Grok (xAI) - `XAI_API_KEY`
/// - DeepSeek - `DEEPSEEK_API_KEY`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Anthropic,
    #[default]
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
    OpenRouter,
    Grok,
    DeepSeek,
}

impl LlmProvider {
    /// Get all available providers
    pub fn all() -> Vec<LlmProvider> {
        vec![
            LlmProvider::Anthropic,
            LlmProvider::OpenAI,
            LlmProvider::Gemini,
            LlmProvider::OpenRouter,
            LlmProvider::Grok,
            LlmProvider::DeepSeek,
        ]
    }

    /// Display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "Anthropic",
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::Gemini => "Gemini",
            LlmProvider::OpenRouter => "OpenRouter",
            LlmProvider::Grok => "Grok",
            LlmProvider::DeepSeek => "DeepSeek",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Grok => "XAI_API_KEY",
            LlmProvider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    /// OpenAI-compatible endpoint root
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "https://api.anthropic.com/v1",
            LlmProvider::OpenAI => "https://api.openai.com/v1",
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            LlmProvider::OpenRouter => "https://openrouter.ai/api/v1",
            LlmProvider::Grok => "https://api.x.ai/v1",
            LlmProvider::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    /// Default chat model when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAI => "gpt-4o",
            LlmProvider::Gemini => "gemini-2.0-flash",
            LlmProvider::OpenRouter => "anthropic/claude-3.5-sonnet",
            LlmProvider::Grok => "grok-2",
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }

    /// Whether the provider serves an image generation endpoint
    pub fn supports_images(&self) -> bool {
        matches!(self, LlmProvider::OpenAI | LlmProvider::Grok)
    }

    /// Parse a provider from its config string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "anthropic" => Some(LlmProvider::Anthropic),
            "openai" => Some(LlmProvider::OpenAI),
            "gemini" => Some(LlmProvider::Gemini),
            "openrouter" => Some(LlmProvider::OpenRouter),
            "grok" | "xai" => Some(LlmProvider::Grok),
            "deepseek" => Some(LlmProvider::DeepSeek),
            _ => None,
        }
    }
}

/// Configuration for LLM model selection
///
/// ## Example
/// ```rust,ignore
/// use studio_core::models::{ModelConfig, LlmProvider};
///
/// let config = ModelConfig::with_provider(LlmProvider::OpenRouter, "openai/gpt-4o")
///     .with_image_model("dall-e-3");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// LLM provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Chat model name
    pub model: String,
    /// Optional base URL override
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model used for mockup images
    #[serde(default)]
    pub image_model: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let provider = LlmProvider::default();
        Self {
            model: provider.default_model().to_string(),
            provider,
            base_url: None,
            image_model: None,
        }
    }
}

impl ModelConfig {
    /// Create config for the default provider
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Create config for a specific provider
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
            image_model: None,
        }
    }

    /// Set base URL (for self-hosted or proxied endpoints)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = Some(model.into());
        self
    }

    /// Endpoint root, honoring the override
    pub fn endpoint(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Read the provider API key from the environment
    pub fn api_key(&self) -> anyhow::Result<String> {
        let var = self.provider.api_key_env();
        std::env::var(var).map_err(|_| anyhow::anyhow!("{} is not set", var))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, LlmProvider::OpenAI);
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn test_provider_display_names() {
        assert_eq!(LlmProvider::Anthropic.display_name(), "Anthropic");
        assert_eq!(LlmProvider::OpenAI.display_name(), "OpenAI");
    }

    #[test]
    fn test_endpoint_override_strips_slash() {
        let config = ModelConfig::new("local").with_base_url("http://localhost:8080/v1/");
        assert_eq!(config.endpoint(), "http://localhost:8080/v1");

        let config = ModelConfig::with_provider(LlmProvider::DeepSeek, "deepseek-chat");
        assert_eq!(config.endpoint(), "https://api.deepseek.com/v1");
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(LlmProvider::parse("OpenRouter"), Some(LlmProvider::OpenRouter));
        assert_eq!(LlmProvider::parse("xai"), Some(LlmProvider::Grok));
        assert_eq!(LlmProvider::parse("mystery"), None);
    }

    #[test]
    fn test_model_config_serialization() {
        let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("openai"));
        assert!(json.contains("gpt-4o"));
    }
}

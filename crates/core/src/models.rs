//! # Waypoint Models
//!
//! LLM provider and model selection for the reasoning stages.
//!
//! Provider API keys are read from the environment by radkit:
//! `ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, `GEMINI_API_KEY`,
//! `OPENROUTER_API_KEY`, `XAI_API_KEY`, `DEEPSEEK_API_KEY`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Supported LLM providers
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
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

    /// Whether this provider supports custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI)
    }

    /// Model used when neither a stage override nor a global model is set
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAI => "gpt-4o",
            LlmProvider::Gemini => "gemini-2.0-flash-exp",
            LlmProvider::OpenRouter => "anthropic/claude-3.5-sonnet",
            LlmProvider::Grok => "grok-2",
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(LlmProvider::Anthropic),
            "openai" => Ok(LlmProvider::OpenAI),
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            "openrouter" => Ok(LlmProvider::OpenRouter),
            "grok" | "xai" => Ok(LlmProvider::Grok),
            "deepseek" => Ok(LlmProvider::DeepSeek),
            other => {
                let known: Vec<_> = LlmProvider::all().iter().map(LlmProvider::display_name).collect();
                anyhow::bail!("unknown LLM provider '{}' (expected one of: {})", other, known.join(", "))
            }
        }
    }
}

/// Provider + model used for one reasoning call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::with_provider(LlmProvider::Anthropic, LlmProvider::Anthropic.default_model())
    }
}

impl ModelConfig {
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }
}

/// Model selection for the whole pipeline with per-stage overrides.
///
/// Stage ids are `planner`, `analyst` and `summary`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasoningConfig {
    #[serde(default)]
    pub global_provider: LlmProvider,
    pub global_model: Option<String>,
    pub base_url: Option<String>,
    /// stage id -> model name
    #[serde(default)]
    pub per_stage_models: HashMap<String, String>,
    /// stage id -> provider
    #[serde(default)]
    pub per_stage_providers: HashMap<String, LlmProvider>,
}

impl ReasoningConfig {
    /// Resolve the model for a stage: per-stage override -> global -> provider default
    pub fn model_for(&self, stage_id: &str) -> ModelConfig {
        let provider = self
            .per_stage_providers
            .get(stage_id)
            .cloned()
            .unwrap_or_else(|| self.global_provider.clone());

        let model = self
            .per_stage_models
            .get(stage_id)
            .or(self.global_model.as_ref())
            .cloned()
            .unwrap_or_else(|| provider.default_model().to_string());

        let base_url = if provider.supports_base_url() {
            self.base_url.clone()
        } else {
            None
        };

        ModelConfig {
            provider,
            model,
            base_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, LlmProvider::Anthropic);
        assert!(config.model.contains("claude"));
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAI);
        assert_eq!("xai".parse::<LlmProvider>().unwrap(), LlmProvider::Grok);
        let error = "mistral".parse::<LlmProvider>().unwrap_err().to_string();
        assert!(error.contains("'mistral'"));
        for provider in LlmProvider::all() {
            assert!(error.contains(provider.display_name()));
        }
    }

    #[test]
    fn test_model_config_serialization() {
        let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("openai"));
        assert!(json.contains("gpt-4o"));
    }

    #[test]
    fn test_stage_resolution_order() {
        let mut config = ReasoningConfig {
            global_provider: LlmProvider::OpenAI,
            base_url: Some("http://localhost:11434/v1".to_string()),
            ..Default::default()
        };
        assert_eq!(config.model_for("planner").model, "gpt-4o");

        config.global_model = Some("gpt-4o-mini".to_string());
        assert_eq!(config.model_for("planner").model, "gpt-4o-mini");

        config
            .per_stage_models
            .insert("summary".to_string(), "o3".to_string());
        assert_eq!(config.model_for("summary").model, "o3");
        assert_eq!(
            config.model_for("summary").base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
    }

    #[test]
    fn test_base_url_dropped_for_unsupported_provider() {
        let mut config = ReasoningConfig {
            base_url: Some("http://proxy".to_string()),
            ..Default::default()
        };
        config
            .per_stage_providers
            .insert("analyst".to_string(), LlmProvider::Gemini);
        let resolved = config.model_for("analyst");
        assert_eq!(resolved.provider, LlmProvider::Gemini);
        assert_eq!(resolved.model, "gemini-2.0-flash-exp");
        assert_eq!(resolved.base_url, None);
    }
}

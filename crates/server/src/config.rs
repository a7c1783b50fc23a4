//! # Configuration
//!
//! Layered settings: `.waypoint/config.json`, then environment variables,
//! then CLI flags. Every persisted field is optional; [`Settings::resolve`]
//! fills in defaults and validates provider names.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use utoipa::ToSchema;

use waypoint_core::models::{LlmProvider, ReasoningConfig};

pub const CONFIG_PATH: &str = ".waypoint/config.json";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SEARCH_RESULTS: u32 = 5;
const DEFAULT_POLL_INTERVAL_MS: u64 = 200;
const DEFAULT_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://127.0.0.1:5173"];

/// Persisted configuration, every field optional
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, ToSchema)]
pub struct PersistedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_stage_models: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_stage_providers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searxng_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
}

impl PersistedConfig {
    /// Load from the default location; a missing or unreadable file is empty config
    pub async fn load() -> Self {
        Self::load_from(Path::new(CONFIG_PATH)).await
    }

    pub async fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), "Ignoring malformed config: {}", e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Could not read config: {}", e);
                Self::default()
            }
        }
    }

    pub async fn save(&self) -> anyhow::Result<()> {
        self.save_to(Path::new(CONFIG_PATH)).await
    }

    pub async fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }

    /// Overrides from `WAYPOINT_PORT`, `WAYPOINT_PROVIDER`, `WAYPOINT_MODEL`, `SEARXNG_URL`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        Self {
            port: get("WAYPOINT_PORT").and_then(|p| match p.trim().parse() {
                Ok(port) => Some(port),
                Err(_) => {
                    tracing::warn!(value = %p, "Ignoring invalid WAYPOINT_PORT");
                    None
                }
            }),
            global_provider: get("WAYPOINT_PROVIDER"),
            global_model: get("WAYPOINT_MODEL"),
            searxng_url: get("SEARXNG_URL"),
            ..Self::default()
        }
    }

    /// Overlay `other` on top of `self`; fields set in `other` win
    pub fn merge(&mut self, other: PersistedConfig) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.global_provider.is_some() {
            self.global_provider = other.global_provider;
        }
        if other.global_model.is_some() {
            self.global_model = other.global_model;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.searxng_url.is_some() {
            self.searxng_url = other.searxng_url;
        }
        if other.search_max_results.is_some() {
            self.search_max_results = other.search_max_results;
        }
        if other.poll_interval_ms.is_some() {
            self.poll_interval_ms = other.poll_interval_ms;
        }
        if other.allowed_origins.is_some() {
            self.allowed_origins = other.allowed_origins;
        }
        for (k, v) in other.per_stage_models {
            self.per_stage_models.insert(k, v);
        }
        for (k, v) in other.per_stage_providers {
            self.per_stage_providers.insert(k, v);
        }
    }
}

/// Effective settings after defaults are applied
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    #[schema(value_type = Object)]
    pub reasoning: ReasoningConfig,
    pub searxng_url: Option<String>,
    pub search_max_results: u32,
    pub poll_interval_ms: u64,
    pub allowed_origins: Vec<String>,
}

impl Settings {
    pub fn resolve(config: PersistedConfig) -> anyhow::Result<Self> {
        let global_provider = match config.global_provider.as_deref() {
            Some(name) => name.parse::<LlmProvider>().context("invalid global_provider")?,
            None => LlmProvider::default(),
        };
        let per_stage_providers = config
            .per_stage_providers
            .into_iter()
            .map(|(stage, name)| {
                let provider = name
                    .parse::<LlmProvider>()
                    .with_context(|| format!("invalid provider for stage '{}'", stage))?;
                Ok((stage, provider))
            })
            .collect::<anyhow::Result<HashMap<_, _>>>()?;

        Ok(Self {
            host: config.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: config.port.unwrap_or(DEFAULT_PORT),
            reasoning: ReasoningConfig {
                global_provider,
                global_model: config.global_model,
                base_url: config.base_url,
                per_stage_models: config.per_stage_models,
                per_stage_providers,
            },
            searxng_url: config.searxng_url,
            search_max_results: config.search_max_results.unwrap_or(DEFAULT_SEARCH_RESULTS),
            poll_interval_ms: config.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            allowed_origins: config
                .allowed_origins
                .unwrap_or_else(|| DEFAULT_ORIGINS.iter().map(|o| o.to_string()).collect()),
        })
    }
}

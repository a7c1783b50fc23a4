//! # Capabilities
//!
//! External lookups the Execute stage can dispatch plan steps to.
//!
//! ## Modules
//!
//! - `search` - Web search through SearXNG instances
//! - `weather` - Current weather through Open-Meteo (geocoding + forecast)
//!
//! Dispatch goes through a closed [`CapabilityRegistry`]: a fixed set of
//! [`Capability`] identifiers mapped to provider implementations.

pub mod search;
pub mod weather;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::state::ToolInput;

pub use search::SearchProvider;
pub use weather::WeatherProvider;

/// The fixed set of capability identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Search,
    Weather,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::Search, Capability::Weather];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Search => "search",
            Capability::Weather => "weather",
        }
    }

    /// The parameter a bare value stands for
    pub fn input_key(&self) -> &'static str {
        match self {
            Capability::Search => "query",
            Capability::Weather => "city",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = CapabilityError;

    /// Accepts the canonical names and the `<name>_executor` aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let name = name.strip_suffix("_executor").unwrap_or(&name);
        match name {
            "search" => Ok(Capability::Search),
            "weather" => Ok(Capability::Weather),
            _ => Err(CapabilityError::Unknown(s.to_string())),
        }
    }
}

/// Failures of capability dispatch and invocation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("unknown capability '{0}'")]
    Unknown(String),
    #[error("capability '{capability}' is not configured")]
    NotConfigured { capability: Capability },
    #[error("missing or invalid '{key}' (must be a non-empty string) for {capability}: {input}")]
    InvalidInput {
        capability: Capability,
        key: &'static str,
        input: String,
    },
    #[error("could not resolve coordinates for city '{0}'")]
    CityNotFound(String),
    #[error("{capability} request failed: {reason}")]
    Request {
        capability: Capability,
        reason: String,
    },
    #[error("{0}")]
    Unavailable(String),
}

/// An external service reachable from plan steps
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    fn capability(&self) -> Capability;

    async fn invoke(&self, input: &ToolInput) -> Result<Value, CapabilityError>;
}

/// Pull the conventional string parameter out of a tool input
pub fn required_str<'a>(
    capability: Capability,
    input: &'a ToolInput,
) -> Result<&'a str, CapabilityError> {
    let key = capability.input_key();
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CapabilityError::InvalidInput {
            capability,
            key,
            input: Value::Object(input.clone()).to_string(),
        })
}

/// Coerce whatever the planner produced into a parameter mapping.
///
/// Objects pass through, strings holding a JSON object are parsed, and any
/// other value is wrapped under the target's conventional key (`query` for
/// search, `city` for weather, `input` for unknown targets).
pub fn normalize_input(target_name: &str, raw: Value) -> ToolInput {
    let key = Capability::from_str(target_name)
        .map(|c| c.input_key())
        .unwrap_or("input");
    match raw {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            _ => {
                let mut map = Map::new();
                map.insert(key.to_string(), Value::String(text));
                map
            }
        },
        other => {
            let mut map = Map::new();
            map.insert(key.to_string(), Value::String(other.to_string()));
            map
        }
    }
}

/// Closed mapping from capability identifiers to providers
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    providers: HashMap<Capability, Arc<dyn CapabilityProvider>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the HTTP-backed search and weather providers
    pub fn with_defaults(searxng_url: Option<String>, max_results: u32) -> Self {
        Self::new()
            .with_provider(Arc::new(SearchProvider::new(searxng_url, max_results)))
            .with_provider(Arc::new(WeatherProvider::new()))
    }

    /// Add (or replace) the provider for its capability
    pub fn with_provider(mut self, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.providers.insert(provider.capability(), provider);
        self
    }

    /// Resolve a target name and invoke its provider
    pub async fn invoke(&self, target_name: &str, input: &ToolInput) -> Result<Value, CapabilityError> {
        let capability = Capability::from_str(target_name)?;
        let provider = self
            .providers
            .get(&capability)
            .ok_or(CapabilityError::NotConfigured { capability })?;
        required_str(capability, input)?;
        provider.invoke(input).await
    }
}

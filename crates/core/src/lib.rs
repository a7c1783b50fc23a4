//! # Waypoint Core
//!
//! Query-answering pipeline: planning, capability execution, analysis and
//! summarization over a shared state, with live progress reporting.
//!
//! ## Architecture
//!
//! - `state/` - Shared state, stage records and the merge policy
//! - `skills/` - Pipeline stages and the reasoning service
//! - `tools/` - Capabilities (search, weather) and their registry
//! - `swarm/` - Router, coordinator, status registry and progress bridge
//! - `models` - LLM provider configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use waypoint_core::models::ReasoningConfig;
//! use waypoint_core::skills::RadkitReasoning;
//! use waypoint_core::swarm::{Coordinator, Pipeline, ProgressBridge, StatusRegistry};
//! use waypoint_core::tools::CapabilityRegistry;
//!
//! let pipeline = Pipeline::standard(
//!     Arc::new(RadkitReasoning::new(ReasoningConfig::default())),
//!     CapabilityRegistry::with_defaults(None, 5),
//! );
//! let coordinator = Coordinator::new(pipeline, StatusRegistry::new());
//! let mut events = ProgressBridge::new(coordinator).stream("Weather in Hanoi?");
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.event_name());
//! }
//! ```

pub mod models;
pub mod skills;
pub mod state;
pub mod swarm;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

//! # Progress Events
//!
//! Events delivered to a client following one query. A stream is one
//! `start`, any number of `agent_update`s, then exactly one terminal event
//! (`complete` or `error`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::registry::StatusUpdate;
use crate::state::{FinalSummary, SharedState};

/// An event on the progress stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Query accepted, run starting
    Start {
        query: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// A stage (or the router) reported progress
    AgentUpdate {
        entity_name: String,
        status_message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Map<String, Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// The stream failed before a summary could be delivered
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_entity: Option<String>,
        error_message: String,
        original_query: String,
        timestamp: DateTime<Utc>,
    },
    /// The run finished with a summary
    Complete {
        original_query: String,
        final_summary: FinalSummary,
        has_errors: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_details: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl ProgressEvent {
    pub fn start(query: &str) -> Self {
        ProgressEvent::Start {
            query: query.to_string(),
            message: "Processing started...".to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Map a status update: `task_id` is lifted out of the extra data and
    /// the remaining keys become `details`
    pub fn from_status(update: &StatusUpdate) -> Self {
        let mut details = update.extra.clone();
        let task_id = match details.remove("task_id") {
            Some(Value::String(id)) => Some(id),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        ProgressEvent::AgentUpdate {
            entity_name: update.entity.clone(),
            status_message: update.message.clone(),
            details: (!details.is_empty()).then_some(details),
            task_id,
            timestamp: update.timestamp,
        }
    }

    pub fn error(source_entity: Option<&str>, error_message: impl Into<String>, query: &str) -> Self {
        ProgressEvent::Error {
            source_entity: source_entity.map(str::to_string),
            error_message: error_message.into(),
            original_query: query.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// `complete` event for a finished run, `None` when it has no summary
    pub fn complete(state: &SharedState) -> Option<Self> {
        let summary = state.summary.clone()?;
        Some(ProgressEvent::Complete {
            original_query: state.query().to_string(),
            final_summary: summary,
            has_errors: state.has_error(),
            error_details: state.error.clone().filter(|e| !e.is_empty()),
            timestamp: Utc::now(),
        })
    }

    /// SSE event name
    pub fn event_name(&self) -> &'static str {
        match self {
            ProgressEvent::Start { .. } => "start",
            ProgressEvent::AgentUpdate { .. } => "agent_update",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Complete { .. } => "complete",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Error { .. } | ProgressEvent::Complete { .. })
    }
}

//! # Shared State
//!
//! The accumulating record threaded through one pipeline run, and the
//! records each stage contributes to it.

use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named key-value parameters handed to a capability
pub type ToolInput = Map<String, Value>;

/// A single step of an execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Unique within the plan, always assigned by the planner
    pub task_id: String,
    /// What the step is supposed to find out
    pub description: String,
    /// Capability identifier (`search`, `weather`)
    pub target_name: String,
    /// Parameters for the capability
    pub input: ToolInput,
    /// Why the step is needed
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Execution plan produced by the Plan stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub original_query: String,
    /// Free-text rationale behind the steps
    pub thought: String,
    pub steps: Vec<PlanStep>,
}

/// Outcome of running one plan step against a capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    /// Correlates to [`PlanStep::task_id`]
    pub task_id: String,
    pub description: String,
    pub target_name: String,
    pub input: ToolInput,
    /// Whatever the capability returned, `Null` on failure
    pub raw_output: Value,
    #[serde(default)]
    pub error: Option<String>,
    pub succeeded: bool,
}

impl ToolExecutionResult {
    /// Build a successful result for a step
    pub fn success(step: &PlanStep, input: ToolInput, output: Value) -> Self {
        Self {
            task_id: step.task_id.clone(),
            description: step.description.clone(),
            target_name: step.target_name.clone(),
            input,
            raw_output: output,
            error: None,
            succeeded: true,
        }
    }

    /// Build a failed result for a step
    pub fn failure(step: &PlanStep, input: ToolInput, error: impl Into<String>) -> Self {
        Self {
            task_id: step.task_id.clone(),
            description: step.description.clone(),
            target_name: step.target_name.clone(),
            input,
            raw_output: Value::Null,
            error: Some(error.into()),
            succeeded: false,
        }
    }
}

/// Analysis of the collected tool results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct Analysis {
    /// The user query being answered
    pub original_query: String,
    /// Summary of what the collected information says
    pub summary_text: String,
    /// Most important findings, most relevant first
    pub key_insights: Vec<String>,
    /// Overall sentiment label (positive, negative, neutral, mixed, unknown)
    pub sentiment: String,
    /// Assessment of how reliable the tool outputs were
    pub data_quality: String,
    /// How the conclusions were reached
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Final user-facing answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct FinalSummary {
    /// The user query being answered
    pub original_query: String,
    /// Direct, complete answer to the query
    pub answer_text: String,
    /// Confidence label: High, Medium or Low
    pub confidence: String,
    /// Gaps, assumptions or errors the answer is subject to
    #[serde(default)]
    pub limitations: Option<String>,
}

/// Human-readable trace entry, one per stage invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub sender: String,
    pub content: String,
}

impl LogEntry {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
        }
    }
}

/// The record passed between stages of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedState {
    query: String,
    pub plan: Option<Plan>,
    pub tool_results: Vec<ToolExecutionResult>,
    pub analysis: Option<Analysis>,
    pub summary: Option<FinalSummary>,
    pub message_log: Vec<LogEntry>,
    pub last_sender: String,
    pub error: Option<String>,
}

impl SharedState {
    /// Fresh state for an incoming query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            plan: None,
            tool_results: Vec::new(),
            analysis: None,
            summary: None,
            message_log: Vec::new(),
            last_sender: "User".to_string(),
            error: None,
        }
    }

    /// The original query; never changes during a run
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn has_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Steps of the current plan, empty when there is no plan
    pub fn plan_steps(&self) -> &[PlanStep] {
        self.plan.as_ref().map(|p| p.steps.as_slice()).unwrap_or(&[])
    }
}

/// How a stage wants its error recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorReport {
    /// Recorded only when no error is present yet
    IfAbsent(String),
    /// Replaces whatever error is present
    Supersede(String),
}

impl ErrorReport {
    pub fn message(&self) -> &str {
        match self {
            ErrorReport::IfAbsent(m) | ErrorReport::Supersede(m) => m,
        }
    }
}

/// Partial update returned by a stage (or a router patch)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub plan: Option<Plan>,
    pub tool_results: Vec<ToolExecutionResult>,
    pub analysis: Option<Analysis>,
    pub summary: Option<FinalSummary>,
    pub messages: Vec<LogEntry>,
    pub sender: Option<String>,
    pub error: Option<ErrorReport>,
}

impl StateUpdate {
    /// Start an update on behalf of a stage
    pub fn from_sender(sender: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.into()),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, content: impl Into<String>) -> Self {
        let sender = self.sender.clone().unwrap_or_default();
        self.messages.push(LogEntry::new(sender, content));
        self
    }

    pub fn with_error(mut self, error: ErrorReport) -> Self {
        self.error = Some(error);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> PlanStep {
        PlanStep {
            task_id: "task_abc123_1".to_string(),
            description: "Weather in Hanoi".to_string(),
            target_name: "weather".to_string(),
            input: Map::new(),
            reasoning: None,
        }
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = SharedState::new("What's the weather in Hanoi?");
        assert_eq!(state.query(), "What's the weather in Hanoi?");
        assert!(state.plan.is_none());
        assert!(state.tool_results.is_empty());
        assert!(state.message_log.is_empty());
        assert!(!state.has_error());
        assert!(state.plan_steps().is_empty());
    }

    #[test]
    fn test_failure_result_has_null_output() {
        let result = ToolExecutionResult::failure(&step(), Map::new(), "city not found");
        assert!(!result.succeeded);
        assert_eq!(result.raw_output, Value::Null);
        assert_eq!(result.error.as_deref(), Some("city not found"));
        assert_eq!(result.task_id, "task_abc123_1");
    }

    #[test]
    fn test_update_message_uses_sender() {
        let update = StateUpdate::from_sender("PlannerAgent").with_message("planned");
        assert_eq!(update.messages[0].sender, "PlannerAgent");
    }
}

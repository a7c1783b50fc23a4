//! # Reasoning Service
//!
//! The single seam through which stages reach a language model. A stage
//! names the output shape it wants and hands over a prompt; the service
//! returns a structured value of that shape or a [`ReasoningError`].
//!
//! [`RadkitReasoning`] is the production implementation: one structured
//! `LlmFunction` call per request, with the model resolved per stage from
//! [`ReasoningConfig`].

use async_trait::async_trait;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::models::{ModelConfig, ReasoningConfig};
use crate::run_llm_function;
use crate::state::{Analysis, FinalSummary};

use super::prompts;

/// Output shapes a stage can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputShape {
    Plan,
    Analysis,
    FinalSummary,
}

impl OutputShape {
    /// Stage id used for per-stage model overrides
    pub fn stage_id(&self) -> &'static str {
        match self {
            OutputShape::Plan => "planner",
            OutputShape::Analysis => "analyst",
            OutputShape::FinalSummary => "summary",
        }
    }
}

impl fmt::Display for OutputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputShape::Plan => "Plan",
            OutputShape::Analysis => "Analysis",
            OutputShape::FinalSummary => "FinalSummary",
        };
        f.write_str(name)
    }
}

/// A step as proposed by the model, before the planner normalizes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct StepDraft {
    /// Optional identifier; the planner always assigns its own
    #[serde(default)]
    pub task_id: Option<String>,
    /// What this step should find out
    pub description: String,
    /// Capability to use: "search" or "weather"
    pub target_name: String,
    /// Parameters: {"query": ...} for search, {"city": ...} for weather
    pub input: Value,
    /// Why this step is needed
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Plan as proposed by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct PlanDraft {
    /// Overall approach to answering the query
    pub thought: String,
    /// Ordered steps, at least one
    pub steps: Vec<StepDraft>,
}

/// A structured reasoning result
#[derive(Debug, Clone, PartialEq)]
pub enum Reasoned {
    Plan(PlanDraft),
    Analysis(Analysis),
    Summary(FinalSummary),
}

impl Reasoned {
    pub fn shape(&self) -> OutputShape {
        match self {
            Reasoned::Plan(_) => OutputShape::Plan,
            Reasoned::Analysis(_) => OutputShape::Analysis,
            Reasoned::Summary(_) => OutputShape::FinalSummary,
        }
    }

    pub fn into_plan(self) -> Result<PlanDraft, ReasoningError> {
        match self {
            Reasoned::Plan(plan) => Ok(plan),
            other => Err(ReasoningError::mismatch(OutputShape::Plan, &other)),
        }
    }

    pub fn into_analysis(self) -> Result<Analysis, ReasoningError> {
        match self {
            Reasoned::Analysis(analysis) => Ok(analysis),
            other => Err(ReasoningError::mismatch(OutputShape::Analysis, &other)),
        }
    }

    pub fn into_summary(self) -> Result<FinalSummary, ReasoningError> {
        match self {
            Reasoned::Summary(summary) => Ok(summary),
            other => Err(ReasoningError::mismatch(OutputShape::FinalSummary, &other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReasoningError {
    #[error("{shape} reasoning failed: {reason}")]
    Call { shape: OutputShape, reason: String },
    #[error("expected a {expected} result, got {got}")]
    ShapeMismatch {
        expected: OutputShape,
        got: OutputShape,
    },
}

impl ReasoningError {
    fn mismatch(expected: OutputShape, got: &Reasoned) -> Self {
        ReasoningError::ShapeMismatch {
            expected,
            got: got.shape(),
        }
    }
}

/// Produces structured values from prompts
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn invoke(&self, shape: OutputShape, prompt: &str) -> Result<Reasoned, ReasoningError>;
}

/// LLM-backed reasoning via radkit
#[derive(Debug, Clone, Default)]
pub struct RadkitReasoning {
    config: ReasoningConfig,
}

impl RadkitReasoning {
    pub fn new(config: ReasoningConfig) -> Self {
        Self { config }
    }
}

async fn plan_call(config: &ModelConfig, prompt: String) -> anyhow::Result<PlanDraft> {
    run_llm_function!(config, PlanDraft, prompts::PLANNER, prompt)
}

async fn analysis_call(config: &ModelConfig, prompt: String) -> anyhow::Result<Analysis> {
    run_llm_function!(config, Analysis, prompts::ANALYST, prompt)
}

async fn summary_call(config: &ModelConfig, prompt: String) -> anyhow::Result<FinalSummary> {
    run_llm_function!(config, FinalSummary, prompts::SUMMARY, prompt)
}

#[async_trait]
impl ReasoningService for RadkitReasoning {
    #[tracing::instrument(skip(self, prompt), fields(model = tracing::field::Empty))]
    async fn invoke(&self, shape: OutputShape, prompt: &str) -> Result<Reasoned, ReasoningError> {
        let model = self.config.model_for(shape.stage_id());
        tracing::Span::current().record("model", model.model.as_str());

        let prompt = prompt.to_string();
        let result = match shape {
            OutputShape::Plan => plan_call(&model, prompt).await.map(Reasoned::Plan),
            OutputShape::Analysis => analysis_call(&model, prompt).await.map(Reasoned::Analysis),
            OutputShape::FinalSummary => summary_call(&model, prompt).await.map(Reasoned::Summary),
        };

        result.map_err(|e| {
            tracing::warn!(%shape, provider = ?model.provider, "LLM call failed: {:#}", e);
            ReasoningError::Call {
                shape,
                reason: format!("{:#}", e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> FinalSummary {
        FinalSummary {
            original_query: "q".to_string(),
            answer_text: "a".to_string(),
            confidence: "High".to_string(),
            limitations: None,
        }
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let err = Reasoned::Summary(summary()).into_plan().unwrap_err();
        assert_eq!(
            err,
            ReasoningError::ShapeMismatch {
                expected: OutputShape::Plan,
                got: OutputShape::FinalSummary
            }
        );
        assert_eq!(err.to_string(), "expected a Plan result, got FinalSummary");
    }

    #[test]
    fn test_matching_shape_unwraps() {
        assert_eq!(Reasoned::Summary(summary()).into_summary().unwrap(), summary());
    }

    #[test]
    fn test_plan_draft_accepts_missing_optionals() {
        let draft: PlanDraft = serde_json::from_str(
            r#"{"thought": "t", "steps": [{"description": "d", "target_name": "weather", "input": "Hanoi"}]}"#,
        )
        .unwrap();
        assert_eq!(draft.steps[0].task_id, None);
        assert_eq!(draft.steps[0].input, Value::String("Hanoi".to_string()));
    }

    #[test]
    fn test_stage_ids() {
        assert_eq!(OutputShape::Plan.stage_id(), "planner");
        assert_eq!(OutputShape::Analysis.stage_id(), "analyst");
        assert_eq!(OutputShape::FinalSummary.stage_id(), "summary");
    }
}

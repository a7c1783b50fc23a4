//! # Analyst Skill
//!
//! Digests every tool result (successes and failures) into an [`Analysis`].
//! Structured outputs are summarized by shape and every output is capped at
//! [`MAX_OUTPUT_CHARS`] before it reaches the prompt.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;

use super::reasoning::{OutputShape, Reasoned, ReasoningService};
use super::Stage;
use crate::state::{Analysis, ErrorReport, SharedState, StateUpdate, ToolExecutionResult};
use crate::swarm::registry::StatusReporter;

/// Entity name the analyst reports under
pub const ANALYST: &str = "AnalysisAgent";

/// Per-result cap on output text in the prompt
pub const MAX_OUTPUT_CHARS: usize = 1500;

pub struct AnalystSkill {
    reasoning: Arc<dyn ReasoningService>,
}

impl AnalystSkill {
    pub fn new(reasoning: Arc<dyn ReasoningService>) -> Self {
        Self { reasoning }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn preview(values: &[&Value]) -> String {
    serde_json::to_string(values).unwrap_or_default()
}

/// One-line description of a tool output
fn summarize_output(output: &Value) -> String {
    let text = match output {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ (Value::Array(_) | Value::Object(_))) => return summarize_output(&parsed),
            _ => s.clone(),
        },
        Value::Array(items) if items.is_empty() => "Result is an empty list.".to_string(),
        Value::Array(items) => format!(
            "Result is a list of {} items. Example: {}",
            items.len(),
            preview(&items.iter().take(2).collect::<Vec<_>>())
        ),
        Value::Object(map) if map.is_empty() => "Result is an empty object.".to_string(),
        Value::Object(map) => format!(
            "Result is an object with keys: {}. Content: {}",
            map.keys().cloned().collect::<Vec<_>>().join(", "),
            output
        ),
        other => other.to_string(),
    };
    truncate_chars(&text, MAX_OUTPUT_CHARS)
}

/// Render all results for the analysis prompt
fn digest(results: &[ToolExecutionResult]) -> String {
    let mut out = String::new();
    for result in results {
        let _ = writeln!(
            out,
            "- Task {} ({}): {}",
            result.task_id, result.target_name, result.description
        );
        let _ = writeln!(out, "  Input: {}", Value::Object(result.input.clone()));
        if result.succeeded {
            let _ = writeln!(out, "  Status: success");
            let _ = writeln!(out, "  Output: {}", summarize_output(&result.raw_output));
        } else {
            let _ = writeln!(out, "  Status: failed");
            let _ = writeln!(out, "  Error: {}", result.error.as_deref().unwrap_or("unknown error"));
        }
    }
    if !results.iter().any(|r| r.succeeded) {
        out.push_str(
            "\nNote: none of the lookups succeeded. Base the analysis on what the failures imply \
             and rate data quality accordingly.\n",
        );
    }
    out
}

fn analysis_prompt(query: &str, results: &[ToolExecutionResult]) -> String {
    format!(
        "Original query: {}\n\nTool results:\n{}\nAnalyze these results with respect to the query.",
        query,
        digest(results)
    )
}

fn degraded_analysis(query: &str) -> Analysis {
    Analysis {
        original_query: query.to_string(),
        summary_text: "No tool results were available to analyze.".to_string(),
        key_insights: vec![],
        sentiment: "neutral".to_string(),
        data_quality: "Cannot be assessed: no data was collected.".to_string(),
        reasoning: None,
    }
}

fn failed_analysis(query: &str, reason: &str) -> Analysis {
    Analysis {
        original_query: query.to_string(),
        summary_text: format!("Analysis failed: {}", reason),
        key_insights: vec![],
        sentiment: "error".to_string(),
        data_quality: "Unknown: analysis could not be completed.".to_string(),
        reasoning: None,
    }
}

#[async_trait]
impl Stage for AnalystSkill {
    fn name(&self) -> &'static str {
        ANALYST
    }

    async fn run(&self, state: &SharedState, status: &StatusReporter) -> StateUpdate {
        let query = state.query();

        let (analysis, error) = if state.tool_results.is_empty() {
            status.update(ANALYST, "No tool results to analyze.");
            (degraded_analysis(query), Some("No tool results to analyze".to_string()))
        } else {
            status.update(
                ANALYST,
                &format!("Analyzing {} tool result(s)...", state.tool_results.len()),
            );
            let outcome = self
                .reasoning
                .invoke(OutputShape::Analysis, &analysis_prompt(query, &state.tool_results))
                .await
                .and_then(Reasoned::into_analysis);
            match outcome {
                Ok(mut analysis) => {
                    analysis.original_query = query.to_string();
                    (analysis, None)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Analysis failed; using fallback analysis");
                    (
                        failed_analysis(query, &e.to_string()),
                        Some(format!("Analysis failed: {}", e)),
                    )
                }
            }
        };

        status.update(ANALYST, "Analysis complete.");

        let rendered = serde_json::to_string(&analysis).unwrap_or_else(|_| analysis.summary_text.clone());
        let mut update = StateUpdate::from_sender(ANALYST).with_message(rendered);
        update.analysis = Some(analysis);
        if let Some(message) = error {
            update = update.with_error(ErrorReport::IfAbsent(message));
        }
        update
    }
}

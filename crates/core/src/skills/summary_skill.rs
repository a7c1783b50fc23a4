//! # Summary Skill
//!
//! Writes the final answer. Every run ends here, so this stage must produce
//! a [`FinalSummary`] no matter what happened upstream.

use async_trait::async_trait;
use std::sync::Arc;

use super::reasoning::{OutputShape, Reasoned, ReasoningService};
use super::Stage;
use crate::state::{Analysis, ErrorReport, FinalSummary, SharedState, StateUpdate};
use crate::swarm::registry::StatusReporter;

/// Entity name the summarizer reports under
pub const SUMMARIZER: &str = "SummaryAgent";

pub struct SummarySkill {
    reasoning: Arc<dyn ReasoningService>,
}

impl SummarySkill {
    pub fn new(reasoning: Arc<dyn ReasoningService>) -> Self {
        Self { reasoning }
    }
}

fn summary_prompt(state: &SharedState, analysis: &Analysis) -> String {
    let analysis_json = serde_json::to_string_pretty(analysis).unwrap_or_else(|_| analysis.summary_text.clone());
    let mut prompt = format!(
        "Original query: {}\n\nAnalysis:\n{}\n\nLookups run: {} ({} succeeded)\n",
        state.query(),
        analysis_json,
        state.tool_results.len(),
        state.tool_results.iter().filter(|r| r.succeeded).count()
    );
    if let Some(error) = state.error.as_deref().filter(|e| !e.is_empty()) {
        prompt.push_str(&format!("\nAn error occurred while gathering information: {}\n", error));
    }
    prompt.push_str("\nWrite the final answer for the user.");
    prompt
}

/// Deterministic answer used when no proper summary can be written
fn fallback_summary(query: &str, cause: &str) -> FinalSummary {
    FinalSummary {
        original_query: query.to_string(),
        answer_text: format!(
            "Could not generate a complete answer for the query '{}': {}",
            query, cause
        ),
        confidence: "Low".to_string(),
        limitations: Some(cause.to_string()),
    }
}

#[async_trait]
impl Stage for SummarySkill {
    fn name(&self) -> &'static str {
        SUMMARIZER
    }

    async fn run(&self, state: &SharedState, status: &StatusReporter) -> StateUpdate {
        let query = state.query();
        status.update(SUMMARIZER, "Writing final answer...");

        let (summary, error) = match state.analysis.as_ref() {
            None => {
                let cause = match state.error.as_deref().filter(|e| !e.is_empty()) {
                    Some(error) => format!("no analysis was available ({})", error),
                    None => "no analysis was available".to_string(),
                };
                (fallback_summary(query, &cause), None)
            }
            Some(analysis) => {
                let outcome = self
                    .reasoning
                    .invoke(OutputShape::FinalSummary, &summary_prompt(state, analysis))
                    .await
                    .and_then(Reasoned::into_summary);
                match outcome {
                    Ok(mut summary) => {
                        summary.original_query = query.to_string();
                        (summary, None)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Summary generation failed");
                        let cause = format!("summary generation failed ({})", e);
                        let error = ErrorReport::Supersede(format!("Summary generation failed: {}", e));
                        (fallback_summary(query, &cause), Some(error))
                    }
                }
            }
        };

        status.update(
            SUMMARIZER,
            &format!("Final answer ready (confidence: {}).", summary.confidence),
        );

        let rendered = serde_json::to_string(&summary).unwrap_or_else(|_| summary.answer_text.clone());
        let mut update = StateUpdate::from_sender(SUMMARIZER).with_message(rendered);
        update.summary = Some(summary);
        update.error = error;
        update
    }
}

//! # Planner Skill
//!
//! Turns the user query into an execution [`Plan`]. Always produces a plan:
//! when reasoning fails or proposes nothing, a single search step over the
//! whole query stands in and the failure is recorded as the run's error.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;

use super::reasoning::{OutputShape, PlanDraft, Reasoned, ReasoningService};
use super::Stage;
use crate::state::{ErrorReport, Plan, PlanStep, SharedState, StateUpdate};
use crate::swarm::registry::StatusReporter;
use crate::tools::{normalize_input, Capability};

/// Entity name the planner reports under
pub const PLANNER: &str = "PlannerAgent";

const FALLBACK_ERROR: &str = "Could not create a detailed plan, using fallback.";

pub struct PlannerSkill {
    reasoning: Arc<dyn ReasoningService>,
}

impl PlannerSkill {
    pub fn new(reasoning: Arc<dyn ReasoningService>) -> Self {
        Self { reasoning }
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}

fn planning_prompt(query: &str) -> String {
    format!(
        "User query:\n{}\n\nCreate a step-by-step plan using the available capabilities.",
        query
    )
}

/// Canonical capability name, or the name as given when it is unknown
fn canonical_target(target_name: &str) -> String {
    Capability::from_str(target_name)
        .map(|c| c.as_str().to_string())
        .unwrap_or_else(|_| target_name.trim().to_string())
}

/// Normalize a model-proposed plan: fresh task ids, canonical targets,
/// mapping inputs
fn build_plan(query: &str, draft: PlanDraft) -> Plan {
    let prefix = short_id();
    let steps = draft
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| {
            let target_name = canonical_target(&step.target_name);
            PlanStep {
                task_id: format!("task_{}_{}", prefix, i + 1),
                description: step.description,
                input: normalize_input(&target_name, step.input),
                target_name,
                reasoning: step.reasoning,
            }
        })
        .collect();
    Plan {
        original_query: query.to_string(),
        thought: draft.thought,
        steps,
    }
}

/// One search step over the entire query
pub fn fallback_plan(query: &str) -> Plan {
    let mut input = Map::new();
    input.insert("query".to_string(), Value::String(query.to_string()));
    Plan {
        original_query: query.to_string(),
        thought: "Fallback plan: performing a simple search for the entire query.".to_string(),
        steps: vec![PlanStep {
            task_id: format!("task_fallback_{}", short_id()),
            description: format!("Search for general information about: '{}'.", query),
            target_name: Capability::Search.as_str().to_string(),
            input,
            reasoning: Some("Fallback step due to planning error.".to_string()),
        }],
    }
}

#[async_trait]
impl Stage for PlannerSkill {
    fn name(&self) -> &'static str {
        PLANNER
    }

    async fn run(&self, state: &SharedState, status: &StatusReporter) -> StateUpdate {
        let query = state.query();
        status.update(PLANNER, "Creating execution plan...");

        let drafted = self
            .reasoning
            .invoke(OutputShape::Plan, &planning_prompt(query))
            .await
            .and_then(Reasoned::into_plan);

        let (plan, error) = match drafted {
            Ok(draft) if !draft.steps.is_empty() => (build_plan(query, draft), None),
            Ok(_) => {
                tracing::warn!("Planner proposed no steps; using fallback plan");
                (fallback_plan(query), Some(FALLBACK_ERROR.to_string()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Planning failed; using fallback plan");
                let message = format!("Could not create a detailed plan ({}), using fallback.", e);
                (fallback_plan(query), Some(message))
            }
        };

        let mut extra = Map::new();
        extra.insert("steps".to_string(), Value::from(plan.steps.len()));
        status.update_with(
            PLANNER,
            extra,
            &format!("Plan created with {} step(s).", plan.steps.len()),
        );

        let rendered = serde_json::to_string(&plan).unwrap_or_else(|_| plan.thought.clone());
        let mut update = StateUpdate::from_sender(PLANNER).with_message(rendered);
        update.plan = Some(plan);
        if let Some(message) = error {
            update = update.with_error(ErrorReport::IfAbsent(message));
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::reasoning::StepDraft;
    use crate::swarm::registry::StatusRegistry;
    use crate::test_support::ScriptedReasoning;
    use serde_json::json;

    fn reporter() -> StatusReporter {
        StatusReporter::new(StatusRegistry::new(), "run-test")
    }

    fn step(target: &str, input: Value) -> StepDraft {
        StepDraft {
            task_id: Some("model_chosen".to_string()),
            description: "look it up".to_string(),
            target_name: target.to_string(),
            input,
            reasoning: None,
        }
    }

    #[tokio::test]
    async fn test_plan_is_normalized() {
        let reasoning = ScriptedReasoning::new().with(Reasoned::Plan(PlanDraft {
            thought: "check weather then news".to_string(),
            steps: vec![
                step("weather_executor", json!("Hanoi")),
                step("Search", json!({"query": "Hanoi news"})),
            ],
        }));
        let skill = PlannerSkill::new(Arc::new(reasoning));
        let update = skill.run(&SharedState::new("Hanoi?"), &reporter()).await;

        let plan = update.plan.unwrap();
        assert_eq!(plan.original_query, "Hanoi?");
        assert_eq!(plan.steps[0].target_name, "weather");
        assert_eq!(Value::Object(plan.steps[0].input.clone()), json!({"city": "Hanoi"}));
        assert_eq!(plan.steps[1].target_name, "search");
        assert!(plan.steps[0].task_id.starts_with("task_"));
        assert!(plan.steps[0].task_id.ends_with("_1"));
        assert!(plan.steps[1].task_id.ends_with("_2"));
        assert_ne!(plan.steps[0].task_id, "model_chosen");
        assert!(update.error.is_none());
        assert_eq!(update.messages.len(), 1);
        assert_eq!(update.sender.as_deref(), Some(PLANNER));
    }

    #[tokio::test]
    async fn test_reasoning_failure_uses_fallback() {
        let skill = PlannerSkill::new(Arc::new(ScriptedReasoning::new().failing(OutputShape::Plan, "timeout")));
        let update = skill.run(&SharedState::new("best ramen in Tokyo"), &reporter()).await;

        let plan = update.plan.unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].target_name, "search");
        assert!(plan.steps[0].task_id.starts_with("task_fallback_"));
        assert_eq!(plan.steps[0].input["query"], "best ramen in Tokyo");
        match update.error {
            Some(ErrorReport::IfAbsent(message)) => assert!(message.contains("timeout")),
            other => panic!("unexpected error report: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_draft_uses_fallback_with_generic_error() {
        let reasoning = ScriptedReasoning::new().with(Reasoned::Plan(PlanDraft {
            thought: "nothing to do".to_string(),
            steps: vec![],
        }));
        let skill = PlannerSkill::new(Arc::new(reasoning));
        let update = skill.run(&SharedState::new("q"), &reporter()).await;
        assert_eq!(update.plan.unwrap().steps.len(), 1);
        assert_eq!(update.error, Some(ErrorReport::IfAbsent(FALLBACK_ERROR.to_string())));
    }

    #[tokio::test]
    async fn test_wrong_shape_counts_as_failure() {
        let reasoning = ScriptedReasoning::new().mismatched(
            OutputShape::Plan,
            Reasoned::Summary(crate::state::FinalSummary {
                original_query: "q".to_string(),
                answer_text: "not a plan".to_string(),
                confidence: "High".to_string(),
                limitations: None,
            }),
        );
        let update = PlannerSkill::new(Arc::new(reasoning))
            .run(&SharedState::new("q"), &reporter())
            .await;
        assert!(update.plan.unwrap().steps[0].task_id.starts_with("task_fallback_"));
        assert!(update.error.unwrap().message().contains("expected a Plan result"));
    }

    #[tokio::test]
    async fn test_task_ids_are_unique_across_runs() {
        let draft = PlanDraft {
            thought: "t".to_string(),
            steps: vec![step("search", json!("a"))],
        };
        let first = build_plan("q", draft.clone());
        let second = build_plan("q", draft);
        assert_ne!(first.steps[0].task_id, second.steps[0].task_id);
    }
}

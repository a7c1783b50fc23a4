//! # Executor Skill
//!
//! Runs every plan step against the capability registry, in order. A failed
//! step never stops the loop; each step yields exactly one result.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::Stage;
use crate::state::{ErrorReport, SharedState, StateUpdate, ToolExecutionResult};
use crate::swarm::registry::StatusReporter;
use crate::tools::CapabilityRegistry;

/// Entity name the executor reports under
pub const EXECUTOR: &str = "ExecutionAgent";

pub struct ExecutorSkill {
    capabilities: CapabilityRegistry,
}

impl ExecutorSkill {
    pub fn new(capabilities: CapabilityRegistry) -> Self {
        Self { capabilities }
    }
}

fn task_extra(task_id: &str) -> Map<String, Value> {
    let mut extra = Map::new();
    extra.insert("task_id".to_string(), Value::String(task_id.to_string()));
    extra
}

fn step_extra(task_id: &str, index: usize, total: usize) -> Map<String, Value> {
    let mut extra = task_extra(task_id);
    extra.insert(
        "current_step".to_string(),
        Value::String(format!("{}/{}", index + 1, total)),
    );
    extra
}

#[async_trait]
impl Stage for ExecutorSkill {
    fn name(&self) -> &'static str {
        EXECUTOR
    }

    async fn run(&self, state: &SharedState, status: &StatusReporter) -> StateUpdate {
        let Some(plan) = state.plan.as_ref().filter(|plan| !plan.steps.is_empty()) else {
            status.update(EXECUTOR, "No plan to execute.");
            return StateUpdate::from_sender(EXECUTOR)
                .with_message("No plan to execute")
                .with_error(ErrorReport::IfAbsent("No plan to execute".to_string()));
        };

        let total = plan.steps.len();
        let mut results = Vec::with_capacity(total);
        let mut first_error: Option<String> = None;

        for (index, step) in plan.steps.iter().enumerate() {
            status.update_with(
                EXECUTOR,
                step_extra(&step.task_id, index, total),
                &format!("Executing step {}/{}: {}", index + 1, total, step.description),
            );

            let input = step.input.clone();
            let (result, outcome) = match self.capabilities.invoke(&step.target_name, &input).await {
                Ok(output) => (ToolExecutionResult::success(step, input, output), "completed".to_string()),
                Err(e) => {
                    tracing::warn!(task_id = %step.task_id, target = %step.target_name, "Step failed: {}", e);
                    first_error.get_or_insert_with(|| {
                        format!("Step {} ({}) failed: {}", step.task_id, step.target_name, e)
                    });
                    let outcome = format!("failed: {}", e);
                    (ToolExecutionResult::failure(step, input, e.to_string()), outcome)
                }
            };
            status.update_with(
                EXECUTOR,
                task_extra(&step.task_id),
                &format!("Step {}/{} {}", index + 1, total, outcome),
            );
            results.push(result);
        }

        let succeeded = results.iter().filter(|r| r.succeeded).count();
        status.update(EXECUTOR, &format!("Completed {}/{} steps", succeeded, total));

        let mut update = StateUpdate::from_sender(EXECUTOR)
            .with_message(format!("{}/{} steps succeeded", succeeded, total));
        update.tool_results = results;
        if let Some(message) = first_error {
            update = update.with_error(ErrorReport::IfAbsent(message));
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Plan, PlanStep};
    use crate::swarm::registry::{StatusRegistry, StatusUpdate};
    use crate::test_support::StubProvider;
    use crate::tools::{normalize_input, Capability, CapabilityError};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn step(task_id: &str, target: &str, input: Value) -> PlanStep {
        PlanStep {
            task_id: task_id.to_string(),
            description: format!("{} lookup", target),
            target_name: target.to_string(),
            input: normalize_input(target, input),
            reasoning: None,
        }
    }

    fn state_with(steps: Vec<PlanStep>) -> SharedState {
        let mut state = SharedState::new("q");
        state.plan = Some(Plan {
            original_query: "q".to_string(),
            thought: String::new(),
            steps,
        });
        state
    }

    fn capabilities() -> CapabilityRegistry {
        CapabilityRegistry::new()
            .with_provider(Arc::new(StubProvider::ok(Capability::Search, json!({"results": []}))))
            .with_provider(Arc::new(StubProvider::failing(
                Capability::Weather,
                CapabilityError::CityNotFound("Atlantis".to_string()),
            )))
    }

    #[tokio::test]
    async fn test_every_step_yields_one_result_in_order() {
        let state = state_with(vec![
            step("t1", "weather", json!("Atlantis")),
            step("t2", "calculator", json!("1+1")),
            step("t3", "search", json!("rust")),
        ]);
        let skill = ExecutorSkill::new(capabilities());
        let update = skill.run(&state, &StatusReporter::unscoped(StatusRegistry::new())).await;

        let ids: Vec<_> = update.tool_results.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
        assert!(!update.tool_results[0].succeeded);
        assert!(update.tool_results[1].error.as_deref().unwrap().contains("unknown capability"));
        assert!(update.tool_results[2].succeeded);
        assert_eq!(update.messages[0].content, "1/3 steps succeeded");

        // the first failing step wins
        match update.error {
            Some(ErrorReport::IfAbsent(message)) => {
                assert!(message.contains("t1"));
                assert!(message.contains("Atlantis"));
            }
            other => panic!("unexpected error report: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_input_is_a_step_error() {
        let state = state_with(vec![step("t1", "search", json!({"q": "wrong key"}))]);
        let update = ExecutorSkill::new(capabilities())
            .run(&state, &StatusReporter::unscoped(StatusRegistry::new()))
            .await;
        assert_eq!(update.tool_results.len(), 1);
        assert!(update.tool_results[0].error.as_deref().unwrap().contains("'query'"));
    }

    #[tokio::test]
    async fn test_without_plan_reports_error() {
        let update = ExecutorSkill::new(capabilities())
            .run(&SharedState::new("q"), &StatusReporter::unscoped(StatusRegistry::new()))
            .await;
        assert!(update.tool_results.is_empty());
        assert_eq!(
            update.error,
            Some(ErrorReport::IfAbsent("No plan to execute".to_string()))
        );
    }

    #[tokio::test]
    async fn test_empty_plan_reports_error() {
        let update = ExecutorSkill::new(capabilities())
            .run(&state_with(vec![]), &StatusReporter::unscoped(StatusRegistry::new()))
            .await;
        assert!(update.tool_results.is_empty());
        assert_eq!(update.messages[0].content, "No plan to execute");
        assert_eq!(
            update.error,
            Some(ErrorReport::IfAbsent("No plan to execute".to_string()))
        );
    }

    #[tokio::test]
    async fn test_publishes_step_progress() {
        let registry = StatusRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = registry.subscribe(Arc::new(move |u: &StatusUpdate| {
            sink.lock().unwrap().push(u.clone())
        }));

        let state = state_with(vec![
            step("t1", "search", json!("a")),
            step("t2", "weather", json!("Atlantis")),
        ]);
        ExecutorSkill::new(capabilities())
            .run(&state, &StatusReporter::new(registry.clone(), "run-1"))
            .await;

        let seen = seen.lock().unwrap();
        let messages: Vec<_> = seen.iter().map(|u| u.message.as_str()).collect();
        assert_eq!(messages[0], "Executing step 1/2: search lookup");
        assert_eq!(messages[1], "Step 1/2 completed");
        assert_eq!(messages[2], "Executing step 2/2: weather lookup");
        assert!(messages[3].starts_with("Step 2/2 failed: "));
        assert!(messages[3].contains("Atlantis"));
        assert_eq!(messages[4], "Completed 1/2 steps");

        assert_eq!(seen[0].extra["current_step"], "1/2");
        assert_eq!(seen[1].extra["task_id"], "t1");
        assert_eq!(seen[2].extra["task_id"], "t2");
        assert_eq!(seen[3].extra["task_id"], "t2");
    }
}

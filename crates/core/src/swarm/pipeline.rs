//! # Pipeline Stages
//!
//! The stage enum, the stage bindings and the routing table.
//!
//! ```text
//! Plan ──▶ Execute ──▶ Analyze ──▶ Summarize ──▶ Terminal
//!   │          │                      ▲
//!   └──────────┴── error / no steps ──┘
//! ```
//!
//! Routers are pure: they look at the merged state and return the next
//! stage plus an optional patch. The coordinator applies the patch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::skills::{
    AnalystSkill, ExecutorSkill, PlannerSkill, ReasoningService, Stage, SummarySkill,
};
use crate::state::{ErrorReport, SharedState, StateUpdate};
use crate::tools::CapabilityRegistry;

/// Entity name routing decisions are published under
pub const ROUTER: &str = "Router";

/// Error recorded when planning left nothing to execute
pub const NO_STEPS_ERROR: &str = "Planner produced no steps";

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Building the execution plan
    Plan,
    /// Running plan steps against capabilities
    Execute,
    /// Digesting tool results
    Analyze,
    /// Writing the final answer
    Summarize,
    /// Run finished
    Terminal,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Plan => "plan",
            PipelineStage::Execute => "execute",
            PipelineStage::Analyze => "analyze",
            PipelineStage::Summarize => "summarize",
            PipelineStage::Terminal => "terminal",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Terminal)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A routing decision
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub next: PipelineStage,
    /// Applied to the state before moving on
    pub patch: Option<StateUpdate>,
}

impl Route {
    fn to(next: PipelineStage) -> Self {
        Self { next, patch: None }
    }
}

fn after_plan(state: &SharedState) -> Route {
    if state.has_error() {
        return Route::to(PipelineStage::Summarize);
    }
    if state.plan_steps().is_empty() {
        return Route {
            next: PipelineStage::Summarize,
            patch: Some(
                StateUpdate::default().with_error(ErrorReport::IfAbsent(NO_STEPS_ERROR.to_string())),
            ),
        };
    }
    Route::to(PipelineStage::Execute)
}

fn after_execute(state: &SharedState) -> Route {
    if state.has_error() {
        Route::to(PipelineStage::Summarize)
    } else {
        Route::to(PipelineStage::Analyze)
    }
}

/// Decide where to go after `completed`, given the merged state
pub fn route(completed: PipelineStage, state: &SharedState) -> Route {
    match completed {
        PipelineStage::Plan => after_plan(state),
        PipelineStage::Execute => after_execute(state),
        PipelineStage::Analyze => Route::to(PipelineStage::Summarize),
        PipelineStage::Summarize | PipelineStage::Terminal => Route::to(PipelineStage::Terminal),
    }
}

/// Stage bindings, built once and shared by every run
#[derive(Clone)]
pub struct Pipeline {
    planner: Arc<dyn Stage>,
    executor: Arc<dyn Stage>,
    analyst: Arc<dyn Stage>,
    summarizer: Arc<dyn Stage>,
}

impl Pipeline {
    pub fn new(
        planner: Arc<dyn Stage>,
        executor: Arc<dyn Stage>,
        analyst: Arc<dyn Stage>,
        summarizer: Arc<dyn Stage>,
    ) -> Self {
        Self {
            planner,
            executor,
            analyst,
            summarizer,
        }
    }

    /// The standard four stages over one reasoning service and capability set
    pub fn standard(reasoning: Arc<dyn ReasoningService>, capabilities: CapabilityRegistry) -> Self {
        Self::new(
            Arc::new(PlannerSkill::new(reasoning.clone())),
            Arc::new(ExecutorSkill::new(capabilities)),
            Arc::new(AnalystSkill::new(reasoning.clone())),
            Arc::new(SummarySkill::new(reasoning)),
        )
    }

    /// Replace the binding for one stage. Binding `Terminal` is a no-op.
    pub fn with_stage(mut self, stage: PipelineStage, binding: Arc<dyn Stage>) -> Self {
        match stage {
            PipelineStage::Plan => self.planner = binding,
            PipelineStage::Execute => self.executor = binding,
            PipelineStage::Analyze => self.analyst = binding,
            PipelineStage::Summarize => self.summarizer = binding,
            PipelineStage::Terminal => {}
        }
        self
    }

    /// The stage bound to `stage`; `None` for `Terminal`
    pub fn stage(&self, stage: PipelineStage) -> Option<&Arc<dyn Stage>> {
        match stage {
            PipelineStage::Plan => Some(&self.planner),
            PipelineStage::Execute => Some(&self.executor),
            PipelineStage::Analyze => Some(&self.analyst),
            PipelineStage::Summarize => Some(&self.summarizer),
            PipelineStage::Terminal => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Plan, PlanStep};
    use serde_json::Map;

    fn with_plan(steps: usize) -> SharedState {
        let mut state = SharedState::new("q");
        state.plan = Some(Plan {
            original_query: "q".to_string(),
            thought: String::new(),
            steps: (0..steps)
                .map(|i| PlanStep {
                    task_id: format!("t{}", i),
                    description: String::new(),
                    target_name: "search".to_string(),
                    input: Map::new(),
                    reasoning: None,
                })
                .collect(),
        });
        state
    }

    #[test]
    fn test_plan_with_steps_goes_to_execute() {
        assert_eq!(route(PipelineStage::Plan, &with_plan(2)), Route::to(PipelineStage::Execute));
    }

    #[test]
    fn test_plan_error_goes_to_summarize() {
        let mut state = with_plan(1);
        state.error = Some("fallback".to_string());
        assert_eq!(route(PipelineStage::Plan, &state), Route::to(PipelineStage::Summarize));
    }

    #[test]
    fn test_missing_or_empty_plan_patches_error() {
        for state in [SharedState::new("q"), with_plan(0)] {
            let decision = route(PipelineStage::Plan, &state);
            assert_eq!(decision.next, PipelineStage::Summarize);
            let patch = decision.patch.expect("router should synthesize an error");
            assert_eq!(patch.error.unwrap().message(), NO_STEPS_ERROR);
            assert!(patch.sender.is_none());
        }
    }

    #[test]
    fn test_execute_routes() {
        let mut state = with_plan(1);
        assert_eq!(route(PipelineStage::Execute, &state).next, PipelineStage::Analyze);
        state.error = Some("step failed".to_string());
        assert_eq!(route(PipelineStage::Execute, &state).next, PipelineStage::Summarize);
    }

    #[test]
    fn test_execute_without_results_still_analyzes() {
        let state = with_plan(1);
        assert!(state.tool_results.is_empty());
        assert_eq!(route(PipelineStage::Execute, &state).next, PipelineStage::Analyze);
    }

    #[test]
    fn test_tail_routes() {
        let state = SharedState::new("q");
        assert_eq!(route(PipelineStage::Analyze, &state).next, PipelineStage::Summarize);
        assert_eq!(route(PipelineStage::Summarize, &state).next, PipelineStage::Terminal);
        assert!(PipelineStage::Terminal.is_terminal());
    }
}

//! # Waypoint Skills
//!
//! The pipeline stages and the reasoning seam they share.
//!
//! ## Architecture
//!
//! ```text
//! Coordinator
//!   └── Stage (PlannerSkill, ExecutorSkill, AnalystSkill, SummarySkill)
//!         ├── ReasoningService (RadkitReasoning -> LlmFunction)
//!         └── CapabilityRegistry (search, weather)
//! ```
//!
//! A stage reads the shared state and returns a partial [`StateUpdate`].
//! Failures inside a stage are converted into data (fallback values plus an
//! error report); nothing propagates past the stage boundary.

pub mod llm_helpers;
pub mod prompts;
pub mod reasoning;

pub mod analyst_skill;
pub mod executor_skill;
pub mod planner_skill;
pub mod summary_skill;

use async_trait::async_trait;

use crate::state::{SharedState, StateUpdate};
use crate::swarm::registry::StatusReporter;

pub use analyst_skill::{AnalystSkill, ANALYST};
pub use executor_skill::{ExecutorSkill, EXECUTOR};
pub use planner_skill::{PlannerSkill, PLANNER};
pub use reasoning::{
    OutputShape, PlanDraft, RadkitReasoning, Reasoned, ReasoningError, ReasoningService, StepDraft,
};
pub use summary_skill::{SummarySkill, SUMMARIZER};

/// One processing step of the pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    /// Entity name used for status updates and the message log
    fn name(&self) -> &'static str;

    /// Produce a partial update from the current state. Must not fail.
    async fn run(&self, state: &SharedState, status: &StatusReporter) -> StateUpdate;
}

//! # Pipeline State
//!
//! The per-query record shared by all stages and the rules for merging
//! stage updates into it.

pub mod merge;
pub mod shared;

pub use merge::{merge_policy, MergePolicy, StateField};
pub use shared::{
    Analysis, ErrorReport, FinalSummary, LogEntry, Plan, PlanStep, SharedState, StateUpdate,
    ToolExecutionResult, ToolInput,
};

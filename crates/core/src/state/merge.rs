//! # Merge Policy
//!
//! Per-field rules for folding a [`StateUpdate`] into a [`SharedState`].
//! The table is consulted by [`SharedState::apply`] so the rules live in
//! one place instead of being implied by field types.

use serde::{Deserialize, Serialize};

use super::shared::{ErrorReport, SharedState, StateUpdate};

/// Fields of the shared state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Query,
    Plan,
    ToolResults,
    Analysis,
    Summary,
    MessageLog,
    LastSender,
    Error,
}

impl StateField {
    pub const ALL: [StateField; 8] = [
        StateField::Query,
        StateField::Plan,
        StateField::ToolResults,
        StateField::Analysis,
        StateField::Summary,
        StateField::MessageLog,
        StateField::LastSender,
        StateField::Error,
    ];
}

/// How updates to a field are combined with its current value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Set at creation, never touched by updates
    Immutable,
    /// New value replaces the old one
    Overwrite,
    /// New items are concatenated after the existing ones
    Append,
    /// Only the first value sticks, unless explicitly superseded
    FirstWriteWins,
}

/// The merge-policy table
pub fn merge_policy(field: StateField) -> MergePolicy {
    match field {
        StateField::Query => MergePolicy::Immutable,
        StateField::Plan
        | StateField::Analysis
        | StateField::Summary
        | StateField::LastSender => MergePolicy::Overwrite,
        StateField::ToolResults | StateField::MessageLog => MergePolicy::Append,
        StateField::Error => MergePolicy::FirstWriteWins,
    }
}

fn merge_value<T>(field: StateField, current: &mut Option<T>, incoming: Option<T>) {
    let Some(value) = incoming else { return };
    match merge_policy(field) {
        MergePolicy::Overwrite => *current = Some(value),
        MergePolicy::FirstWriteWins => {
            if current.is_none() {
                *current = Some(value);
            }
        }
        MergePolicy::Append | MergePolicy::Immutable => {}
    }
}

fn merge_seq<T>(field: StateField, current: &mut Vec<T>, incoming: Vec<T>) {
    match merge_policy(field) {
        MergePolicy::Append => current.extend(incoming),
        MergePolicy::Overwrite if !incoming.is_empty() => *current = incoming,
        _ => {}
    }
}

fn merge_error(current: &mut Option<String>, incoming: Option<ErrorReport>) {
    match incoming {
        Some(ErrorReport::Supersede(message)) if !message.is_empty() => *current = Some(message),
        Some(ErrorReport::IfAbsent(message)) if !message.is_empty() => {
            if current.as_deref().is_some_and(str::is_empty) {
                *current = None;
            }
            merge_value(StateField::Error, current, Some(message));
        }
        _ => {}
    }
}

impl SharedState {
    /// Fold a stage update into this state according to the policy table
    pub fn apply(&mut self, update: StateUpdate) {
        merge_value(StateField::Plan, &mut self.plan, update.plan);
        merge_seq(
            StateField::ToolResults,
            &mut self.tool_results,
            update.tool_results,
        );
        merge_value(StateField::Analysis, &mut self.analysis, update.analysis);
        merge_value(StateField::Summary, &mut self.summary, update.summary);
        merge_seq(StateField::MessageLog, &mut self.message_log, update.messages);
        if let Some(sender) = update.sender {
            if merge_policy(StateField::LastSender) == MergePolicy::Overwrite {
                self.last_sender = sender;
            }
        }
        merge_error(&mut self.error, update.error);
    }
}

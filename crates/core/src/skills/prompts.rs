//! Default system prompts bundled at compile time.

/// Planner - breaks the query into capability steps
pub const PLANNER: &str = include_str!("defaults/planner.md");

/// Analyst - digests tool results into an analysis
pub const ANALYST: &str = include_str!("defaults/analyst.md");

/// Summary - writes the user-facing answer
pub const SUMMARY: &str = include_str!("defaults/summary.md");

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![("planner", PLANNER), ("analyst", ANALYST), ("summary", SUMMARY)]
}

//! Trainee memory: weakness profiling and read-only context queries.
//!
//! The profiler turns a window of scored attempts into a ranked,
//! trend-aware skill profile and persists it as dimension rows. The query
//! layer is a read-only facade over those rows plus practice-cadence
//! aggregation, consumed by agent handlers and notification builders.

mod profiler;
mod query;

pub use profiler::{extract_dimension_averages, generate_weakness_profile};
pub use query::{
    agent_context, practice_pattern, skill_levels, weakness_profile, AgentContext,
};

//! Practice cadence derived from attempt timestamps.

use serde::{Deserialize, Serialize};

/// Snapshot of how regularly a trainee practices.
///
/// Recomputed from attempt timestamps on every query; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticePattern {
    /// Completed attempts on record.
    pub total_attempts: usize,
    /// Average completed attempts per week over the trainee's active span.
    pub avg_attempts_per_week: f64,
    /// Whole days since the most recent attempt, if any.
    pub last_attempt_days_ago: Option<i64>,
    /// Consecutive days with at least one attempt, counting backward from
    /// today. A quiet today does not break an otherwise live streak.
    pub streak_days: u32,
}

impl PracticePattern {
    /// Pattern for a trainee with no completed attempts.
    pub fn empty() -> Self {
        Self {
            total_attempts: 0,
            avg_attempts_per_week: 0.0,
            last_attempt_days_ago: None,
            streak_days: 0,
        }
    }
}

//! Weakness profiles: per-dimension skill summaries.

use serde::{Deserialize, Serialize};

/// Direction a skill dimension (or a whole trainee) is moving.
///
/// `New` doubles as the insufficient-data value: a dimension with too few
/// observations, or a trainee with no profile yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Recent scores are meaningfully above earlier scores.
    Improving,
    /// Recent scores are meaningfully below earlier scores.
    Declining,
    /// No meaningful movement either way.
    Stable,
    /// Not enough evidence to judge.
    New,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
            Trend::New => "new",
        };
        f.write_str(s)
    }
}

/// Which side of the weakness threshold a persisted dimension row sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    /// Scored below the weakness threshold.
    Weakness,
    /// Scored at or above the weakness threshold.
    Skill,
}

/// Per-dimension summary derived from an evidence window of attempts.
///
/// `evidence_count` is at least 1 whenever a result exists: dimensions with
/// no observations are omitted from profiles rather than zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionResult {
    /// Dimension name, e.g. `objection_handling`.
    pub key: String,
    /// Average score (0-100) over the evidence window.
    pub score: f64,
    /// Direction the dimension is moving.
    pub trend: Trend,
    /// Number of attempts contributing to `score`.
    pub evidence_count: usize,
}

/// Human-readable form of a dimension key (`objection_handling` becomes
/// `objection handling`).
pub fn dimension_label(key: &str) -> String {
    key.replace('_', " ")
}

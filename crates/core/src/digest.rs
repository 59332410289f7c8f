//! Daily trainee digest: a 24h-over-24h comparative report.

use serde::{Deserialize, Serialize};

/// Trend classification for a digest period.
///
/// Distinct from [`crate::Trend`]: a digest compares two fixed time windows
/// and reports `InsufficientData` when either window lacks scored attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestTrend {
    /// Current window average beats the previous by more than the threshold.
    Improving,
    /// Current window average trails the previous by more than the threshold.
    Declining,
    /// Averages within the threshold of each other.
    Stable,
    /// One or both windows had no scored attempts.
    InsufficientData,
}

/// A single dimension's score movement between the two digest windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionDelta {
    /// Dimension name.
    pub key: String,
    /// Current-window average minus previous-window average.
    pub delta: f64,
}

impl std::fmt::Display for DimensionDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:+}", self.key, self.delta)
    }
}

/// Headline numbers for a digest period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestSummary {
    /// Completed attempts in the current 24h window.
    pub attempts: usize,
    /// Rounded average overall score for the window, if any were scored.
    pub avg_score: Option<i64>,
    /// Day-over-day trend classification.
    pub trend: DigestTrend,
    /// Strongest dimension for the period (or all-time when the window is
    /// empty).
    pub best_dimension: Option<String>,
    /// Weakest dimension for the period (or all-time when the window is
    /// empty).
    pub worst_dimension: Option<String>,
}

/// Complete daily digest for one trainee.
///
/// Constructed on demand and consumed immediately; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraineeDigest {
    /// Headline numbers.
    pub summary: DigestSummary,
    /// Dimension with the largest positive day-over-day delta.
    pub top_improvement: Option<DimensionDelta>,
    /// Dimension with the largest negative day-over-day delta.
    pub top_decline: Option<DimensionDelta>,
    /// Recommended next actions; always non-empty.
    pub next_actions: Vec<String>,
    /// Current practice streak in days.
    pub streak: u32,
    /// True when the current window had zero attempts.
    pub no_recent_activity: bool,
}

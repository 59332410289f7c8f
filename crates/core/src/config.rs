//! Tunable thresholds for the coaching pipeline.

use serde::{Deserialize, Serialize};

/// Configuration for profile, digest, and cron computations.
///
/// Defaults match the platform's production values. Handlers take a
/// `CoachConfig` by value, so a deployment that wants per-org tuning can
/// resolve one per org before wiring its handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachConfig {
    /// Dimensions scoring below this are weaknesses; at or above,
    /// strengths.
    pub weakness_threshold: f64,
    /// Day-over-day average-score movement needed before a digest calls a
    /// trend (exclusive boundary).
    pub digest_trend_threshold: f64,
    /// Per-dimension movement needed before the profiler calls a trend
    /// (exclusive boundary).
    pub dimension_trend_threshold: f64,
    /// Observations of a dimension required before its trend is judged.
    pub min_trend_evidence: usize,
    /// Most recent completed attempts considered by the profiler.
    pub evidence_window: usize,
    /// Days without practice before a trainee counts as inactive.
    pub inactivity_threshold_days: i64,
    /// Days of lookback defining an "active" trainee for the daily digest.
    pub active_window_days: i64,
    /// Base URL notification action links are built against.
    pub app_url: String,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            weakness_threshold: 70.0,
            digest_trend_threshold: 3.0,
            dimension_trend_threshold: 3.0,
            min_trend_evidence: 2,
            evidence_window: 50,
            inactivity_threshold_days: 3,
            active_window_days: 14,
            app_url: "http://localhost:3000".to_string(),
        }
    }
}

impl CoachConfig {
    /// Create a config with default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the weakness threshold.
    pub fn with_weakness_threshold(mut self, threshold: f64) -> Self {
        self.weakness_threshold = threshold;
        self
    }

    /// Set the digest trend threshold.
    pub fn with_digest_trend_threshold(mut self, threshold: f64) -> Self {
        self.digest_trend_threshold = threshold;
        self
    }

    /// Set the per-dimension trend threshold.
    pub fn with_dimension_trend_threshold(mut self, threshold: f64) -> Self {
        self.dimension_trend_threshold = threshold;
        self
    }

    /// Set the profiler's evidence window.
    pub fn with_evidence_window(mut self, attempts: usize) -> Self {
        self.evidence_window = attempts;
        self
    }

    /// Set the inactivity threshold in days.
    pub fn with_inactivity_threshold_days(mut self, days: i64) -> Self {
        self.inactivity_threshold_days = days;
        self
    }

    /// Set the base URL for action links.
    pub fn with_app_url(mut self, url: impl Into<String>) -> Self {
        self.app_url = url.into();
        self
    }

    /// Build an absolute action URL from an app-relative path.
    pub fn action_url(&self, path: &str) -> String {
        format!("{}{}", self.app_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_url_strips_trailing_slashes() {
        let config = CoachConfig::new().with_app_url("https://app.example.com///");
        assert_eq!(
            config.action_url("/training"),
            "https://app.example.com/training"
        );
    }

    #[test]
    fn builders_override_defaults() {
        let config = CoachConfig::new()
            .with_weakness_threshold(60.0)
            .with_evidence_window(20);
        assert_eq!(config.weakness_threshold, 60.0);
        assert_eq!(config.evidence_window, 20);
        assert_eq!(config.min_trend_evidence, 2);
    }
}

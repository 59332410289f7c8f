//! Team-level analysis and manager insights.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Headline numbers for one org's trainee roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    /// Trainees on the roster.
    pub total_trainees: usize,
    /// Trainees with a completed attempt in the last 7 days.
    pub active_trainees: usize,
    /// Average overall score across all completed attempts, if any.
    pub avg_score: Option<f64>,
    /// Completed attempts across the roster.
    pub total_completed_attempts: usize,
}

/// A skill three or more trainees are weak in at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemicGap {
    /// The shared weak dimension.
    pub skill: String,
    /// How many trainees share it.
    pub affected_count: usize,
    /// Average score among the affected trainees.
    pub avg_score: f64,
}

/// A trainee flagged for manager attention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtRiskRep {
    /// The flagged trainee.
    pub user_id: UserId,
    /// Human-readable reasons for the flag.
    pub reasons: Vec<String>,
}

/// A trainee performing notably well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPerformer {
    /// The trainee.
    pub user_id: UserId,
    /// Average overall score.
    pub avg_score: f64,
    /// Completed attempts contributing to the average.
    pub attempt_count: usize,
}

/// Full team analysis for one org.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamAnalysis {
    /// Headline numbers.
    pub team_stats: TeamStats,
    /// Skills several trainees are weak in, most widespread first.
    pub systemic_gaps: Vec<SystemicGap>,
    /// Trainees needing attention.
    pub at_risk_reps: Vec<AtRiskRep>,
    /// Best performers, highest average first.
    pub top_performers: Vec<TopPerformer>,
    /// Suggested manager actions.
    pub recommendations: Vec<String>,
}

impl TeamAnalysis {
    /// Analysis for an org with no trainees.
    pub fn empty() -> Self {
        Self {
            team_stats: TeamStats {
                total_trainees: 0,
                active_trainees: 0,
                avg_score: None,
                total_completed_attempts: 0,
            },
            systemic_gaps: Vec::new(),
            at_risk_reps: Vec::new(),
            top_performers: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Category of a manager insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// Several trainees share the same weakness.
    SystemicGap,
    /// A trainee is declining or disengaged.
    AtRiskRep,
    /// Too few trainees are practicing.
    EngagementDrop,
    /// A trainee hit a performance milestone.
    Milestone,
}

/// Urgency of a manager insight; orders high to low.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum InsightPriority {
    /// Needs attention this week.
    High,
    /// Worth a look.
    Medium,
    /// Nice to know.
    Low,
}

/// One actionable finding for a manager, ready to become a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerInsight {
    /// Category.
    pub kind: InsightKind,
    /// Urgency.
    pub priority: InsightPriority,
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub message: String,
    /// Dimension involved, for gap insights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    /// Structured details carried through to the notification.
    pub metadata: serde_json::Value,
}

//! Converts a team analysis into prioritized manager insights.

use repcoach_core::{
    dimension_label, InsightKind, InsightPriority, ManagerInsight, TeamAnalysis,
};
use serde_json::json;

const ENGAGEMENT_THRESHOLD: f64 = 0.5;
const MILESTONE_SCORE_THRESHOLD: f64 = 90.0;
const MILESTONE_MIN_ATTEMPTS: usize = 5;

/// Convert a [`TeamAnalysis`] into actionable insights, highest priority
/// first.
///
/// Priority rules: systemic gaps and at-risk reps are high, an engagement
/// drop (under half the team active) is medium, milestones are low.
pub fn generate_insights(analysis: &TeamAnalysis) -> Vec<ManagerInsight> {
    let mut insights: Vec<ManagerInsight> = Vec::new();
    insights.extend(systemic_gap_insights(analysis));
    insights.extend(at_risk_insights(analysis));
    insights.extend(engagement_insights(analysis));
    insights.extend(milestone_insights(analysis));

    insights.sort_by_key(|i| i.priority);
    insights
}

fn systemic_gap_insights(analysis: &TeamAnalysis) -> Vec<ManagerInsight> {
    analysis
        .systemic_gaps
        .iter()
        .map(|gap| {
            let label = dimension_label(&gap.skill);
            ManagerInsight {
                kind: InsightKind::SystemicGap,
                priority: InsightPriority::High,
                title: format!("Systemic gap in {label}: {} reps affected", gap.affected_count),
                message: format!(
                    "{} reps are struggling with {label}, averaging {:.0}%. \
                     Consider scheduling team-wide training.",
                    gap.affected_count, gap.avg_score
                ),
                skill: Some(gap.skill.clone()),
                metadata: json!({
                    "skill": gap.skill,
                    "affected_count": gap.affected_count,
                    "avg_score": gap.avg_score,
                }),
            }
        })
        .collect()
}

fn at_risk_insights(analysis: &TeamAnalysis) -> Vec<ManagerInsight> {
    analysis
        .at_risk_reps
        .iter()
        .map(|rep| ManagerInsight {
            kind: InsightKind::AtRiskRep,
            priority: InsightPriority::High,
            title: "At-risk rep identified".to_string(),
            message: format!(
                "Rep flagged as at risk: {}. Consider scheduling a 1:1.",
                rep.reasons.join(", ")
            ),
            skill: None,
            metadata: json!({
                "user_id": rep.user_id,
                "reasons": rep.reasons,
            }),
        })
        .collect()
}

fn engagement_insights(analysis: &TeamAnalysis) -> Vec<ManagerInsight> {
    let stats = &analysis.team_stats;
    if stats.total_trainees == 0 {
        return Vec::new();
    }

    let active_ratio = stats.active_trainees as f64 / stats.total_trainees as f64;
    if active_ratio >= ENGAGEMENT_THRESHOLD {
        return Vec::new();
    }

    let pct = (active_ratio * 100.0).round() as i64;
    vec![ManagerInsight {
        kind: InsightKind::EngagementDrop,
        priority: InsightPriority::Medium,
        title: format!("Low team engagement: {pct}% active"),
        message: format!(
            "Only {} of {} trainees ({pct}%) practiced in the last 7 days. \
             Consider sending reminders.",
            stats.active_trainees, stats.total_trainees
        ),
        skill: None,
        metadata: json!({
            "active_trainees": stats.active_trainees,
            "total_trainees": stats.total_trainees,
            "active_percent": pct,
        }),
    }]
}

fn milestone_insights(analysis: &TeamAnalysis) -> Vec<ManagerInsight> {
    analysis
        .top_performers
        .iter()
        .filter(|p| {
            p.avg_score >= MILESTONE_SCORE_THRESHOLD && p.attempt_count >= MILESTONE_MIN_ATTEMPTS
        })
        .map(|performer| ManagerInsight {
            kind: InsightKind::Milestone,
            priority: InsightPriority::Low,
            title: format!("Top performer averaging {:.0}%", performer.avg_score),
            message: format!(
                "A rep is averaging {:.0}% across {} attempts. \
                 Consider recognizing their achievement.",
                performer.avg_score, performer.attempt_count
            ),
            skill: None,
            metadata: json!({
                "user_id": performer.user_id,
                "avg_score": performer.avg_score,
                "attempt_count": performer.attempt_count,
            }),
        })
        .collect()
}

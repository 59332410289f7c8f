//! Read-only context queries over persisted profile rows and attempts.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use repcoach_core::{
    dimension_label, DimensionKind, DimensionResult, OrgId, PracticePattern, Time, Trend, UserId,
};
use repcoach_storage::{AttemptStamp, Result, Storage};

/// Overall-score trend compares this many recent attempts against the same
/// number before them.
const TREND_RECENT_COUNT: usize = 5;

/// Overall-score movement needed before the trajectory leaves `Stable`.
const TRAJECTORY_THRESHOLD: f64 = 5.0;

/// Composite snapshot of everything an agent knows about one trainee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    /// Dimensions below the weakness threshold, weakest first.
    pub weaknesses: Vec<DimensionResult>,
    /// Dimensions at or above the threshold, strongest first.
    pub strengths: Vec<DimensionResult>,
    /// Practice cadence snapshot.
    pub practice_pattern: PracticePattern,
    /// Overall direction of recent attempt scores.
    pub trajectory: Trend,
    /// Human-readable observations derived from the above.
    pub insights: Vec<String>,
}

/// Persisted weakness rows for a user, weakest first.
pub async fn weakness_profile<S: Storage + ?Sized>(
    storage: &S,
    org: &OrgId,
    user: &UserId,
) -> Result<Vec<DimensionResult>> {
    storage.dimension_rows(org, user, DimensionKind::Weakness).await
}

/// Persisted skill rows for a user, strongest first.
pub async fn skill_levels<S: Storage + ?Sized>(
    storage: &S,
    org: &OrgId,
    user: &UserId,
) -> Result<Vec<DimensionResult>> {
    let mut rows = storage.dimension_rows(org, user, DimensionKind::Skill).await?;
    rows.reverse();
    Ok(rows)
}

/// Practice frequency, streak, and recency for a user.
pub async fn practice_pattern<S: Storage + ?Sized>(
    storage: &S,
    org: &OrgId,
    user: &UserId,
) -> Result<PracticePattern> {
    let stamps = storage.completed_attempt_stamps(org, user).await?;
    Ok(compute_practice_pattern(&stamps, Utc::now()))
}

/// Compute a practice pattern from pre-fetched stamps (newest first).
fn compute_practice_pattern(stamps: &[AttemptStamp], now: Time) -> PracticePattern {
    let (Some(last), Some(first)) = (stamps.first(), stamps.last()) else {
        return PracticePattern::empty();
    };

    let last_attempt_days_ago = (now - last.started_at).num_days();

    let span_days = (last.started_at - first.started_at).num_days();
    let span_weeks = (span_days as f64 / 7.0).max(1.0);
    let avg_attempts_per_week = (stamps.len() as f64 / span_weeks * 10.0).round() / 10.0;

    PracticePattern {
        total_attempts: stamps.len(),
        avg_attempts_per_week,
        last_attempt_days_ago: Some(last_attempt_days_ago),
        streak_days: streak_days(stamps, now),
    }
}

/// Count consecutive days with at least one attempt, walking backward from
/// today. A quiet today is tolerated so a live streak is not reported as
/// broken before the day is over.
fn streak_days(stamps: &[AttemptStamp], now: Time) -> u32 {
    let practice_days: HashSet<chrono::NaiveDate> =
        stamps.iter().map(|s| s.started_at.date_naive()).collect();

    let today = now.date_naive();
    let mut streak = 0u32;
    for i in 0..365 {
        let day = today - Duration::days(i);
        if practice_days.contains(&day) {
            streak += 1;
        } else if i == 0 {
            continue;
        } else {
            break;
        }
    }
    streak
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Judge the overall direction of recent attempt scores (stamps newest
/// first): last `TREND_RECENT_COUNT` scored attempts against the same
/// count before them.
fn compute_trajectory(stamps: &[AttemptStamp]) -> Trend {
    let scores: Vec<f64> = stamps.iter().filter_map(|s| s.score).collect();
    if scores.len() < TREND_RECENT_COUNT {
        return Trend::New;
    }

    // Newest-first from storage; flip for chronological slicing.
    let chronological: Vec<f64> = scores.into_iter().rev().collect();
    let recent = &chronological[chronological.len() - TREND_RECENT_COUNT..];
    let previous_start = chronological.len().saturating_sub(TREND_RECENT_COUNT * 2);
    let previous = &chronological[previous_start..chronological.len() - TREND_RECENT_COUNT];

    if previous.is_empty() {
        return Trend::New;
    }

    let diff = average(recent) - average(previous);
    if diff > TRAJECTORY_THRESHOLD {
        Trend::Improving
    } else if diff < -TRAJECTORY_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Full trainee context in one call: profile views, practice pattern,
/// trajectory, and readable insights.
pub async fn agent_context<S: Storage + ?Sized>(
    storage: &S,
    org: &OrgId,
    user: &UserId,
) -> Result<AgentContext> {
    let weaknesses = weakness_profile(storage, org, user).await?;
    let strengths = skill_levels(storage, org, user).await?;
    let stamps = storage.completed_attempt_stamps(org, user).await?;

    let practice_pattern = compute_practice_pattern(&stamps, Utc::now());
    let trajectory = compute_trajectory(&stamps[..stamps.len().min(TREND_RECENT_COUNT * 2)]);

    let insights = build_insights(&weaknesses, &strengths, &practice_pattern, trajectory);

    Ok(AgentContext {
        weaknesses,
        strengths,
        practice_pattern,
        trajectory,
        insights,
    })
}

/// Generate human-readable insight strings from the context data.
fn build_insights(
    weaknesses: &[DimensionResult],
    strengths: &[DimensionResult],
    pattern: &PracticePattern,
    trajectory: Trend,
) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(worst) = weaknesses.first() {
        insights.push(format!(
            "Weakest area: {} (score: {:.0})",
            dimension_label(&worst.key),
            worst.score
        ));
    }

    if let Some(best) = strengths.first() {
        insights.push(format!(
            "Strongest area: {} (score: {:.0})",
            dimension_label(&best.key),
            best.score
        ));
    }

    if pattern.total_attempts == 0 {
        insights.push("No completed attempts yet".to_string());
        return insights;
    }

    if let Some(days) = pattern.last_attempt_days_ago {
        if days > 3 {
            insights.push(format!("Inactive for {days} days"));
        }
    }
    if pattern.streak_days > 0 {
        let plural = if pattern.streak_days > 1 { "s" } else { "" };
        insights.push(format!(
            "Current practice streak: {} day{plural}",
            pattern.streak_days
        ));
    }
    match trajectory {
        Trend::Improving => insights.push("Performance trending upward".to_string()),
        Trend::Declining => {
            insights.push("Performance trending downward, may need intervention".to_string())
        }
        Trend::Stable | Trend::New => {}
    }

    insights
}

//! Daily trainee digest generation.

use chrono::{Duration, Utc};
use std::collections::BTreeMap;

use repcoach_core::{
    dimension_label, CoachConfig, DigestSummary, DigestTrend, DimensionDelta, OrgId,
    TraineeDigest, UserId,
};
use repcoach_memory::{extract_dimension_averages, practice_pattern, skill_levels, weakness_profile};
use repcoach_storage::{Result, Storage};

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[derive(Clone, Copy)]
enum Direction {
    Improvement,
    Decline,
}

/// Find the dimension with the largest movement between periods.
///
/// A dimension must appear in both windows to be eligible. The strict
/// comparisons keep the first-seen dimension on ties and exclude deltas of
/// exactly zero.
fn find_top_delta(
    current: &BTreeMap<String, f64>,
    previous: &BTreeMap<String, f64>,
    direction: Direction,
) -> Option<DimensionDelta> {
    let mut best: Option<DimensionDelta> = None;

    for (key, current_score) in current {
        let Some(prev_score) = previous.get(key) else {
            continue;
        };
        let delta = current_score - prev_score;
        let best_delta = best.as_ref().map(|b| b.delta).unwrap_or(0.0);

        let better = match direction {
            Direction::Improvement => delta > best_delta,
            Direction::Decline => delta < best_delta,
        };
        if better {
            best = Some(DimensionDelta {
                key: key.clone(),
                delta,
            });
        }
    }

    best
}

/// Recommended next actions: reverse a decline first, then shore up the
/// worst dimension, falling back to a generic nudge.
fn build_next_actions(
    has_recent_activity: bool,
    worst_dimension: Option<&str>,
    top_decline: Option<&DimensionDelta>,
) -> Vec<String> {
    if !has_recent_activity {
        return match worst_dimension {
            Some(worst) => vec![format!(
                "Try a session focused on {} to strengthen this skill.",
                dimension_label(worst)
            )],
            None => vec!["Complete a practice session to build momentum.".to_string()],
        };
    }

    let mut actions = Vec::new();

    if let Some(decline) = top_decline {
        actions.push(format!(
            "Practice {} to reverse the recent dip.",
            dimension_label(&decline.key)
        ));
    }

    if let Some(worst) = worst_dimension {
        let label = dimension_label(worst);
        if !actions.iter().any(|a| a.contains(&label)) {
            actions.push(format!("Strengthen {label} with focused practice."));
        }
    }

    if actions.is_empty() {
        actions.push("Complete another session to keep building your skills.".to_string());
    }

    actions
}

/// Generate a daily progress digest for a trainee.
///
/// Compares the last 24h of completed attempts against the previous 24h to
/// classify the day-over-day trend and surface the biggest per-dimension
/// movers. A digest is presented to a human as current truth, so storage
/// failures propagate instead of degrading silently.
pub async fn generate_trainee_digest<S: Storage + ?Sized>(
    storage: &S,
    config: &CoachConfig,
    org: &OrgId,
    user: &UserId,
) -> Result<TraineeDigest> {
    let now = Utc::now();
    let one_day_ago = now - Duration::hours(24);
    let two_days_ago = now - Duration::hours(48);

    let current = storage
        .completed_attempts_between(org, user, one_day_ago, now)
        .await?;
    let previous = storage
        .completed_attempts_between(org, user, two_days_ago, one_day_ago)
        .await?;
    let weaknesses = weakness_profile(storage, org, user).await?;
    let strengths = skill_levels(storage, org, user).await?;
    let pattern = practice_pattern(storage, org, user).await?;

    // All-time views from persisted rows; overridden below when the
    // current window has its own dimension data.
    let worst_dimension = weaknesses.first().map(|d| d.key.clone());
    let best_dimension = strengths.first().map(|d| d.key.clone());

    if current.is_empty() {
        return Ok(TraineeDigest {
            summary: DigestSummary {
                attempts: 0,
                avg_score: None,
                trend: DigestTrend::InsufficientData,
                best_dimension,
                worst_dimension: worst_dimension.clone(),
            },
            top_improvement: None,
            top_decline: None,
            next_actions: build_next_actions(false, worst_dimension.as_deref(), None),
            streak: pattern.streak_days,
            no_recent_activity: true,
        });
    }

    let scores: Vec<f64> = current.iter().filter_map(|a| a.score).collect();
    let avg_score = (!scores.is_empty()).then(|| average(&scores).round() as i64);

    let prev_scores: Vec<f64> = previous.iter().filter_map(|a| a.score).collect();
    let prev_avg = (!prev_scores.is_empty()).then(|| average(&prev_scores));

    let trend = match (avg_score, prev_avg) {
        (Some(avg), Some(prev)) => {
            let diff = avg as f64 - prev;
            if diff > config.digest_trend_threshold {
                DigestTrend::Improving
            } else if diff < -config.digest_trend_threshold {
                DigestTrend::Declining
            } else {
                DigestTrend::Stable
            }
        }
        _ => DigestTrend::InsufficientData,
    };

    let current_dims = extract_dimension_averages(&current);
    let previous_dims = extract_dimension_averages(&previous);

    let top_improvement = find_top_delta(&current_dims, &previous_dims, Direction::Improvement);
    let top_decline = find_top_delta(&current_dims, &previous_dims, Direction::Decline);

    // This period's own data wins over the all-time profile view.
    let mut period_best = best_dimension;
    let mut period_worst = worst_dimension;
    if !current_dims.is_empty() {
        let mut max_score = -1.0f64;
        let mut min_score = 101.0f64;
        for (key, score) in &current_dims {
            if *score > max_score {
                max_score = *score;
                period_best = Some(key.clone());
            }
            if *score < min_score {
                min_score = *score;
                period_worst = Some(key.clone());
            }
        }
    }

    let next_actions = build_next_actions(true, period_worst.as_deref(), top_decline.as_ref());

    Ok(TraineeDigest {
        summary: DigestSummary {
            attempts: current.len(),
            avg_score,
            trend,
            best_dimension: period_best,
            worst_dimension: period_worst,
        },
        top_improvement,
        top_decline,
        next_actions,
        streak: pattern.streak_days,
        no_recent_activity: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use repcoach_core::{Attempt, DimensionKind, DimensionResult, Trend};
    use repcoach_storage::MemStorage;
    use serde_json::json;

    fn org() -> OrgId {
        OrgId::from("org-1")
    }

    fn user() -> UserId {
        UserId::from("user-1")
    }

    async fn insert(storage: &MemStorage, hours_ago: i64, score: f64, breakdown: serde_json::Value) {
        storage
            .insert_attempt(Attempt::completed(
                org(),
                user(),
                Some(score),
                breakdown,
                Utc::now() - Duration::hours(hours_ago),
            ))
            .await;
    }

    async fn digest_for(storage: &MemStorage) -> TraineeDigest {
        generate_trainee_digest(storage, &CoachConfig::default(), &org(), &user())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn no_activity_digest_reports_known_profile_and_actions() {
        let storage = MemStorage::new();
        // Persisted profile from older history, nothing in the window.
        storage
            .replace_dimension_rows(
                &org(),
                &user(),
                &[
                    (
                        DimensionKind::Weakness,
                        DimensionResult {
                            key: "objection_handling".to_string(),
                            score: 55.0,
                            trend: Trend::Stable,
                            evidence_count: 3,
                        },
                    ),
                    (
                        DimensionKind::Skill,
                        DimensionResult {
                            key: "discovery".to_string(),
                            score: 85.0,
                            trend: Trend::Stable,
                            evidence_count: 3,
                        },
                    ),
                ],
            )
            .await
            .unwrap();
        // Old enough to sit outside both windows and any live streak.
        insert(&storage, 80, 72.0, json!({})).await;

        let digest = digest_for(&storage).await;

        assert!(digest.no_recent_activity);
        assert_eq!(digest.summary.attempts, 0);
        assert_eq!(digest.summary.avg_score, None);
        assert_eq!(digest.summary.trend, DigestTrend::InsufficientData);
        assert_eq!(
            digest.summary.worst_dimension.as_deref(),
            Some("objection_handling")
        );
        assert_eq!(digest.summary.best_dimension.as_deref(), Some("discovery"));
        assert!(!digest.next_actions.is_empty());
        assert!(digest.next_actions[0].contains("objection handling"));
        assert_eq!(digest.streak, 0);
    }

    #[tokio::test]
    async fn trend_boundaries_are_exclusive() {
        // diff = +4 -> improving
        let storage = MemStorage::new();
        insert(&storage, 30, 70.0, json!({})).await;
        insert(&storage, 2, 74.0, json!({})).await;
        assert_eq!(digest_for(&storage).await.summary.trend, DigestTrend::Improving);

        // diff = +3 exactly -> stable
        let storage = MemStorage::new();
        insert(&storage, 30, 70.0, json!({})).await;
        insert(&storage, 2, 73.0, json!({})).await;
        assert_eq!(digest_for(&storage).await.summary.trend, DigestTrend::Stable);

        // diff = -3 exactly -> stable
        let storage = MemStorage::new();
        insert(&storage, 30, 70.0, json!({})).await;
        insert(&storage, 2, 67.0, json!({})).await;
        assert_eq!(digest_for(&storage).await.summary.trend, DigestTrend::Stable);

        // diff = -4 -> declining
        let storage = MemStorage::new();
        insert(&storage, 30, 70.0, json!({})).await;
        insert(&storage, 2, 66.0, json!({})).await;
        assert_eq!(digest_for(&storage).await.summary.trend, DigestTrend::Declining);

        // equal averages -> stable
        let storage = MemStorage::new();
        insert(&storage, 30, 70.0, json!({})).await;
        insert(&storage, 2, 70.0, json!({})).await;
        assert_eq!(digest_for(&storage).await.summary.trend, DigestTrend::Stable);
    }

    #[tokio::test]
    async fn missing_previous_window_means_insufficient_data() {
        let storage = MemStorage::new();
        insert(&storage, 2, 80.0, json!({})).await;

        let digest = digest_for(&storage).await;
        assert_eq!(digest.summary.trend, DigestTrend::InsufficientData);
        assert_eq!(digest.summary.avg_score, Some(80));
        assert!(!digest.no_recent_activity);
    }

    #[tokio::test]
    async fn deltas_follow_the_two_attempt_example() {
        let storage = MemStorage::new();
        insert(
            &storage,
            30,
            70.0,
            json!({"objection_handling": 60.0, "discovery": 80.0}),
        )
        .await;
        insert(
            &storage,
            2,
            76.0,
            json!({"objection_handling": 75.0, "discovery": 78.0}),
        )
        .await;

        let digest = digest_for(&storage).await;

        let improvement = digest.top_improvement.unwrap();
        assert_eq!(improvement.key, "objection_handling");
        assert_eq!(improvement.delta, 15.0);
        assert_eq!(improvement.to_string(), "objection_handling +15");

        let decline = digest.top_decline.unwrap();
        assert_eq!(decline.key, "discovery");
        assert_eq!(decline.delta, -2.0);
        assert_eq!(decline.to_string(), "discovery -2");

        // Current-window data overrides the persisted best/worst view.
        assert_eq!(digest.summary.best_dimension.as_deref(), Some("discovery"));
        assert_eq!(
            digest.summary.worst_dimension.as_deref(),
            Some("objection_handling")
        );

        // Decline first, then the worst dimension.
        assert!(digest.next_actions[0].contains("discovery"));
        assert!(digest.next_actions[1].contains("objection handling"));
    }

    #[tokio::test]
    async fn zero_delta_is_not_reported() {
        let storage = MemStorage::new();
        insert(&storage, 30, 70.0, json!({"clarity": 80.0})).await;
        insert(&storage, 2, 70.0, json!({"clarity": 80.0})).await;

        let digest = digest_for(&storage).await;
        assert!(digest.top_improvement.is_none());
        assert!(digest.top_decline.is_none());
        // Neither improvement nor decline: generic fallback action... the
        // worst dimension is still known from the current window.
        assert!(digest.next_actions[0].contains("clarity"));
    }

    #[tokio::test]
    async fn dimension_absent_from_one_window_is_ineligible_for_deltas() {
        let storage = MemStorage::new();
        insert(&storage, 30, 70.0, json!({"discovery": 80.0})).await;
        insert(&storage, 2, 70.0, json!({"empathy": 90.0})).await;

        let digest = digest_for(&storage).await;
        assert!(digest.top_improvement.is_none());
        assert!(digest.top_decline.is_none());
    }
}

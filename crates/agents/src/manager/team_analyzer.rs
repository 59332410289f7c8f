//! Org-wide team performance analysis.

use chrono::{Duration, Utc};
use std::collections::BTreeMap;

use repcoach_core::{
    dimension_label, AtRiskRep, DimensionKind, DimensionResult, OrgId, SystemicGap, TeamAnalysis,
    TeamStats, TopPerformer, Trend, UserId,
};
use repcoach_storage::{AttemptStamp, Result, Role, Storage};

const INACTIVITY_DAYS: i64 = 7;
const SYSTEMIC_THRESHOLD: usize = 3;
const WEAKNESS_SCORE_THRESHOLD: f64 = 60.0;
const TOP_PERFORMER_LIMIT: usize = 5;
const MIN_PERFORMER_ATTEMPTS: usize = 3;

/// Analyze team performance for an entire org: systemic gaps, at-risk
/// reps, top performers, headline stats, and recommendations.
pub async fn analyze_team<S: Storage + ?Sized>(
    storage: &S,
    org: &OrgId,
) -> Result<TeamAnalysis> {
    let trainees = storage.org_members(org, &[Role::Trainee]).await?;
    if trainees.is_empty() {
        return Ok(TeamAnalysis::empty());
    }

    let mut profiles: Vec<(UserId, Vec<DimensionResult>)> = Vec::new();
    let mut attempts: Vec<(UserId, Vec<AttemptStamp>)> = Vec::new();
    for member in &trainees {
        profiles.push((
            member.user_id.clone(),
            storage
                .dimension_rows(org, &member.user_id, DimensionKind::Weakness)
                .await?,
        ));
        attempts.push((
            member.user_id.clone(),
            storage.completed_attempt_stamps(org, &member.user_id).await?,
        ));
    }

    let systemic_gaps = find_systemic_gaps(&profiles);
    let at_risk_reps = find_at_risk_reps(&profiles, &attempts);
    let top_performers = find_top_performers(&attempts);
    let team_stats = compute_team_stats(&attempts);
    let recommendations = build_recommendations(&systemic_gaps, &at_risk_reps, &team_stats);

    Ok(TeamAnalysis {
        team_stats,
        systemic_gaps,
        at_risk_reps,
        top_performers,
        recommendations,
    })
}

/// A systemic gap exists when enough trainees share the same weakness with
/// a score below the gap threshold.
fn find_systemic_gaps(profiles: &[(UserId, Vec<DimensionResult>)]) -> Vec<SystemicGap> {
    let mut users_by_skill: BTreeMap<&str, Vec<&UserId>> = BTreeMap::new();
    let mut scores_by_skill: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for (user, rows) in profiles {
        for row in rows {
            if row.score >= WEAKNESS_SCORE_THRESHOLD {
                continue;
            }
            let users = users_by_skill.entry(&row.key).or_default();
            if !users.contains(&user) {
                users.push(user);
            }
            scores_by_skill.entry(&row.key).or_default().push(row.score);
        }
    }

    let mut gaps: Vec<SystemicGap> = users_by_skill
        .into_iter()
        .filter(|(_, users)| users.len() >= SYSTEMIC_THRESHOLD)
        .map(|(skill, users)| {
            let scores = &scores_by_skill[skill];
            SystemicGap {
                skill: skill.to_string(),
                affected_count: users.len(),
                avg_score: (scores.iter().sum::<f64>() / scores.len() as f64).round(),
            }
        })
        .collect();

    gaps.sort_by(|a, b| b.affected_count.cmp(&a.affected_count));
    gaps
}

/// At-risk = declining in a weakness, inactive for a week, or no attempts
/// at all.
fn find_at_risk_reps(
    profiles: &[(UserId, Vec<DimensionResult>)],
    attempts: &[(UserId, Vec<AttemptStamp>)],
) -> Vec<AtRiskRep> {
    let now = Utc::now();
    let mut reps = Vec::new();

    for ((user, rows), (_, stamps)) in profiles.iter().zip(attempts) {
        let mut reasons = Vec::new();

        let declining: Vec<&DimensionResult> =
            rows.iter().filter(|r| r.trend == Trend::Declining).collect();
        if let Some(first) = declining.first() {
            reasons.push(format!("declining in {}", dimension_label(&first.key)));
        }

        match stamps.first() {
            None => reasons.push("no completed attempts yet".to_string()),
            Some(latest) => {
                let days = (now - latest.started_at).num_days();
                if days >= INACTIVITY_DAYS {
                    reasons.push(format!("inactive for {days} days"));
                }
            }
        }

        if !reasons.is_empty() {
            reps.push(AtRiskRep {
                user_id: user.clone(),
                reasons,
            });
        }
    }

    reps
}

fn find_top_performers(attempts: &[(UserId, Vec<AttemptStamp>)]) -> Vec<TopPerformer> {
    let mut performers: Vec<TopPerformer> = attempts
        .iter()
        .filter_map(|(user, stamps)| {
            let scores: Vec<f64> = stamps.iter().filter_map(|s| s.score).collect();
            if scores.len() < MIN_PERFORMER_ATTEMPTS {
                return None;
            }
            Some(TopPerformer {
                user_id: user.clone(),
                avg_score: (scores.iter().sum::<f64>() / scores.len() as f64).round(),
                attempt_count: scores.len(),
            })
        })
        .collect();

    performers.sort_by(|a, b| {
        b.avg_score
            .partial_cmp(&a.avg_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    performers.truncate(TOP_PERFORMER_LIMIT);
    performers
}

fn compute_team_stats(attempts: &[(UserId, Vec<AttemptStamp>)]) -> TeamStats {
    let active_cutoff = Utc::now() - Duration::days(INACTIVITY_DAYS);

    let total_trainees = attempts.len();
    let active_trainees = attempts
        .iter()
        .filter(|(_, stamps)| stamps.iter().any(|s| s.started_at >= active_cutoff))
        .count();

    let all_scores: Vec<f64> = attempts
        .iter()
        .flat_map(|(_, stamps)| stamps.iter().filter_map(|s| s.score))
        .collect();
    let avg_score =
        (!all_scores.is_empty()).then(|| all_scores.iter().sum::<f64>() / all_scores.len() as f64);

    TeamStats {
        total_trainees,
        active_trainees,
        avg_score,
        total_completed_attempts: attempts.iter().map(|(_, stamps)| stamps.len()).sum(),
    }
}

fn build_recommendations(
    gaps: &[SystemicGap],
    at_risk: &[AtRiskRep],
    stats: &TeamStats,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if let Some(gap) = gaps.first() {
        recommendations.push(format!(
            "Schedule team-wide training on {}; {} reps are struggling with it.",
            dimension_label(&gap.skill),
            gap.affected_count
        ));
    }

    if !at_risk.is_empty() {
        let plural = if at_risk.len() > 1 { "s" } else { "" };
        recommendations.push(format!(
            "Check in with {} at-risk rep{plural} this week.",
            at_risk.len()
        ));
    }

    if stats.total_trainees > 0
        && (stats.active_trainees as f64) < stats.total_trainees as f64 * 0.5
    {
        recommendations
            .push("Re-engage the team; fewer than half practiced this week.".to_string());
    }

    if recommendations.is_empty() {
        recommendations.push("Team is on track; keep the current cadence.".to_string());
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use repcoach_core::Attempt;
    use repcoach_storage::{Member, MemStorage};

    fn org() -> OrgId {
        OrgId::from("org-1")
    }

    fn trainee(id: &str) -> Member {
        Member {
            user_id: UserId::from(id),
            role: Role::Trainee,
            name: None,
            email: None,
        }
    }

    fn weakness_row(key: &str, score: f64, trend: Trend) -> (DimensionKind, DimensionResult) {
        (
            DimensionKind::Weakness,
            DimensionResult {
                key: key.to_string(),
                score,
                trend,
                evidence_count: 3,
            },
        )
    }

    async fn seed_attempts(storage: &MemStorage, user: &str, scores: &[f64], days_ago: i64) {
        for (i, score) in scores.iter().enumerate() {
            storage
                .insert_attempt(Attempt::completed(
                    org(),
                    UserId::from(user),
                    Some(*score),
                    serde_json::json!({}),
                    Utc::now() - Duration::days(days_ago) - Duration::hours(i as i64),
                ))
                .await;
        }
    }

    #[tokio::test]
    async fn empty_roster_yields_empty_analysis() {
        let storage = MemStorage::new();
        let analysis = analyze_team(&storage, &org()).await.unwrap();
        assert_eq!(analysis, TeamAnalysis::empty());
    }

    #[tokio::test]
    async fn shared_weakness_becomes_a_systemic_gap() {
        let storage = MemStorage::new();
        for id in ["u1", "u2", "u3"] {
            storage.add_member(org(), trainee(id)).await;
            storage
                .replace_dimension_rows(
                    &org(),
                    &UserId::from(id),
                    &[weakness_row("objection_handling", 50.0, Trend::Stable)],
                )
                .await
                .unwrap();
            seed_attempts(&storage, id, &[70.0], 1).await;
        }

        let analysis = analyze_team(&storage, &org()).await.unwrap();
        assert_eq!(analysis.systemic_gaps.len(), 1);
        let gap = &analysis.systemic_gaps[0];
        assert_eq!(gap.skill, "objection_handling");
        assert_eq!(gap.affected_count, 3);
        assert_eq!(gap.avg_score, 50.0);
        assert!(analysis.recommendations[0].contains("objection handling"));
    }

    #[tokio::test]
    async fn two_reps_sharing_a_weakness_is_not_systemic() {
        let storage = MemStorage::new();
        for id in ["u1", "u2"] {
            storage.add_member(org(), trainee(id)).await;
            storage
                .replace_dimension_rows(
                    &org(),
                    &UserId::from(id),
                    &[weakness_row("clarity", 55.0, Trend::Stable)],
                )
                .await
                .unwrap();
            seed_attempts(&storage, id, &[70.0], 1).await;
        }

        let analysis = analyze_team(&storage, &org()).await.unwrap();
        assert!(analysis.systemic_gaps.is_empty());
    }

    #[tokio::test]
    async fn at_risk_flags_cover_decline_inactivity_and_silence() {
        let storage = MemStorage::new();
        for id in ["declining", "inactive", "silent", "healthy"] {
            storage.add_member(org(), trainee(id)).await;
        }
        storage
            .replace_dimension_rows(
                &org(),
                &UserId::from("declining"),
                &[weakness_row("discovery", 55.0, Trend::Declining)],
            )
            .await
            .unwrap();
        seed_attempts(&storage, "declining", &[60.0], 1).await;
        seed_attempts(&storage, "inactive", &[70.0], 10).await;
        seed_attempts(&storage, "healthy", &[80.0], 1).await;

        let analysis = analyze_team(&storage, &org()).await.unwrap();
        let flagged: Vec<&str> = analysis
            .at_risk_reps
            .iter()
            .map(|r| r.user_id.as_str())
            .collect();
        assert!(flagged.contains(&"declining"));
        assert!(flagged.contains(&"inactive"));
        assert!(flagged.contains(&"silent"));
        assert!(!flagged.contains(&"healthy"));
    }

    #[tokio::test]
    async fn top_performers_need_enough_attempts() {
        let storage = MemStorage::new();
        storage.add_member(org(), trainee("steady")).await;
        storage.add_member(org(), trainee("one-hit")).await;
        seed_attempts(&storage, "steady", &[92.0, 90.0, 94.0], 1).await;
        seed_attempts(&storage, "one-hit", &[99.0], 1).await;

        let analysis = analyze_team(&storage, &org()).await.unwrap();
        assert_eq!(analysis.top_performers.len(), 1);
        assert_eq!(analysis.top_performers[0].user_id.as_str(), "steady");
        assert_eq!(analysis.top_performers[0].avg_score, 92.0);
        assert_eq!(analysis.team_stats.total_trainees, 2);
        assert_eq!(analysis.team_stats.total_completed_attempts, 4);
    }
}

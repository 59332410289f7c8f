//! Daily cron generating and emitting trainee digests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use repcoach_core::{
    dimension_label, ActivityRecord, CoachConfig, CoachEvent, DigestTrend, OrgId,
    RecommendationType, TraineeDigest, UserId,
};
use repcoach_runtime::{Handler, RuntimeError, StepContext, Trigger};
use repcoach_storage::Storage;
use serde_json::json;

use super::digest::generate_trainee_digest;
use crate::AGENT_COACH;

/// Schedule: daily at 08:00 UTC.
pub const CRON_DAILY_DIGEST: &str = "0 8 * * *";

/// Generates a progress digest for every active trainee and emits a
/// `daily_digest` recommendation for each.
///
/// Active = at least one completed attempt within the configured window.
pub struct SendDailyDigest<S> {
    storage: Arc<S>,
    config: CoachConfig,
}

impl<S: Storage> SendDailyDigest<S> {
    /// Create the handler.
    pub fn new(storage: Arc<S>, config: CoachConfig) -> Self {
        Self { storage, config }
    }
}

#[async_trait]
impl<S: Storage + 'static> Handler for SendDailyDigest<S> {
    fn id(&self) -> &'static str {
        "coach-send-daily-digest"
    }

    fn trigger(&self) -> Trigger {
        Trigger::Cron(CRON_DAILY_DIGEST)
    }

    async fn handle(
        &self,
        ctx: &StepContext,
        _event: Option<&CoachEvent>,
    ) -> Result<serde_json::Value, RuntimeError> {
        let trainees: Vec<(OrgId, UserId)> = ctx
            .run("find-active-trainees", || async {
                let since = Utc::now() - Duration::days(self.config.active_window_days);
                self.storage
                    .active_trainees(since)
                    .await
                    .map_err(RuntimeError::handler)
            })
            .await?;

        let mut digests_sent = 0usize;

        for (org, user) in &trainees {
            let digest: TraineeDigest = ctx
                .run(&format!("generate-digest-{org}-{user}"), || async {
                    generate_trainee_digest(self.storage.as_ref(), &self.config, org, user)
                        .await
                        .map_err(RuntimeError::handler)
                })
                .await?;

            ctx.run(&format!("log-and-emit-{org}-{user}"), || async {
                self.storage
                    .record_activity(&ActivityRecord::new(
                        org.clone(),
                        Some(user.clone()),
                        AGENT_COACH,
                        "daily_digest",
                        "generate_daily_digest",
                        json!({
                            "attempts": digest.summary.attempts,
                            "avg_score": digest.summary.avg_score,
                            "trend": digest.summary.trend,
                            "no_recent_activity": digest.no_recent_activity,
                            "streak": digest.streak,
                        }),
                    ))
                    .await
                    .map_err(RuntimeError::handler)?;

                ctx.events().send(CoachEvent::RecommendationReady {
                    user_id: user.clone(),
                    org_id: org.clone(),
                    recommendation: RecommendationType::DailyDigest,
                    message: format_digest_message(&digest),
                    scenario_id: None,
                })
            })
            .await?;

            digests_sent += 1;
        }

        Ok(json!({
            "active_trainees": trainees.len(),
            "digests_sent": digests_sent,
        }))
    }
}

/// Render a digest as the human-readable notification body.
pub fn format_digest_message(digest: &TraineeDigest) -> String {
    if digest.no_recent_activity {
        let streak_note = if digest.streak > 0 {
            format!(" You have a {}-day streak going; don't lose it!", digest.streak)
        } else {
            String::new()
        };
        let action = digest.next_actions.first().cloned().unwrap_or_default();
        return format!("No practice sessions in the last 24 hours.{streak_note} {action}")
            .trim_end()
            .to_string();
    }

    let summary = &digest.summary;
    let mut parts = Vec::new();

    let session_label = if summary.attempts == 1 { "session" } else { "sessions" };
    let mut head = format!(
        "You completed {} practice {session_label} yesterday",
        summary.attempts
    );
    if let Some(avg) = summary.avg_score {
        head.push_str(&format!(" with an average score of {avg}%"));
    }
    head.push('.');
    parts.push(head);

    match summary.trend {
        DigestTrend::Improving => parts.push("Your scores are trending upward.".to_string()),
        DigestTrend::Declining => {
            parts.push("Your scores dipped compared to the previous day.".to_string())
        }
        DigestTrend::Stable | DigestTrend::InsufficientData => {}
    }

    if let Some(improvement) = &digest.top_improvement {
        parts.push(format!(
            "Top improvement: {} ({:+}).",
            dimension_label(&improvement.key),
            improvement.delta
        ));
    }
    if let Some(decline) = &digest.top_decline {
        parts.push(format!(
            "Needs attention: {} ({:+}).",
            dimension_label(&decline.key),
            decline.delta
        ));
    }

    if digest.streak > 0 {
        let plural = if digest.streak > 1 { "s" } else { "" };
        parts.push(format!("Current streak: {} day{plural}.", digest.streak));
    }

    if let Some(action) = digest.next_actions.first() {
        parts.push(action.clone());
    }

    parts.join(" ")
}

//! Pipeline reacting to `attempt.scored`.

use std::sync::Arc;

use async_trait::async_trait;
use repcoach_core::{
    ActivityRecord, CoachConfig, CoachEvent, DimensionResult, EventKind, Trend,
};
use repcoach_memory::generate_weakness_profile;
use repcoach_runtime::{Handler, RuntimeError, StepContext, Trigger};
use repcoach_storage::Storage;
use serde_json::json;

use crate::AGENT_COACH;

/// Recalculates the trainee's weakness profile after a scored attempt,
/// logs the activity, and emits a weakness-updated event.
///
/// Each step is independently retryable; a profile-generation failure is
/// swallowed inside the first step so it can never block activity logging
/// or event emission.
pub struct OnAttemptScored<S> {
    storage: Arc<S>,
    config: CoachConfig,
}

impl<S: Storage> OnAttemptScored<S> {
    /// Create the handler.
    pub fn new(storage: Arc<S>, config: CoachConfig) -> Self {
        Self { storage, config }
    }
}

#[async_trait]
impl<S: Storage + 'static> Handler for OnAttemptScored<S> {
    fn id(&self) -> &'static str {
        "coach-on-attempt-scored"
    }

    fn trigger(&self) -> Trigger {
        Trigger::Event(EventKind::AttemptScored)
    }

    async fn handle(
        &self,
        ctx: &StepContext,
        event: Option<&CoachEvent>,
    ) -> Result<serde_json::Value, RuntimeError> {
        let Some(CoachEvent::AttemptScored {
            org_id,
            user_id,
            attempt_id,
        }) = event
        else {
            return Err(RuntimeError::handler("expected an attempt.scored payload"));
        };

        // A profile bug must never stall the rest of the pipeline: degrade
        // to an empty profile and keep the original error in the logs.
        let profile: Vec<DimensionResult> = ctx
            .run("update-weakness-profile", || async {
                match generate_weakness_profile(self.storage.as_ref(), &self.config, org_id, user_id)
                    .await
                {
                    Ok(profile) => Ok(profile),
                    Err(err) => {
                        tracing::error!(
                            org = %org_id,
                            user = %user_id,
                            error = %err,
                            "weakness profile generation failed; continuing with empty profile"
                        );
                        Ok(Vec::new())
                    }
                }
            })
            .await?;

        ctx.run("log-activity", || async {
            self.storage
                .record_activity(&ActivityRecord::new(
                    org_id.clone(),
                    Some(user_id.clone()),
                    AGENT_COACH,
                    EventKind::AttemptScored.name(),
                    "update_weakness_profile",
                    json!({
                        "attempt_id": attempt_id,
                        "dimensions_updated": profile.len(),
                    }),
                ))
                .await
                .map_err(RuntimeError::handler)
        })
        .await?;

        ctx.run("emit-weakness-updated", || async {
            let (weaknesses, strengths): (Vec<DimensionResult>, Vec<DimensionResult>) = profile
                .iter()
                .cloned()
                .partition(|d| d.score < self.config.weakness_threshold);

            ctx.events().send(CoachEvent::WeaknessUpdated {
                user_id: user_id.clone(),
                org_id: org_id.clone(),
                weaknesses,
                strengths,
                trajectory: determine_trajectory(&profile),
            })
        })
        .await?;

        Ok(json!({ "updated": profile.len() }))
    }
}

/// Overall trajectory: whichever of improving/declining dominates the
/// per-dimension trends. Empty profiles are `New`.
fn determine_trajectory(profile: &[DimensionResult]) -> Trend {
    if profile.is_empty() {
        return Trend::New;
    }

    let improving = profile.iter().filter(|d| d.trend == Trend::Improving).count();
    let declining = profile.iter().filter(|d| d.trend == Trend::Declining).count();

    if improving > declining {
        Trend::Improving
    } else if declining > improving {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{capture, drain_bus, FailingStorage};
    use chrono::{Duration, Utc};
    use repcoach_core::{Attempt, AttemptId, OrgId, UserId};
    use repcoach_storage::MemStorage;

    fn org() -> OrgId {
        OrgId::from("org-1")
    }

    fn user() -> UserId {
        UserId::from("user-1")
    }

    fn scored_event() -> CoachEvent {
        CoachEvent::AttemptScored {
            org_id: org(),
            user_id: user(),
            attempt_id: AttemptId::from("att-1"),
        }
    }

    #[test]
    fn trajectory_follows_the_dominant_trend() {
        let dim = |trend| DimensionResult {
            key: "k".to_string(),
            score: 50.0,
            trend,
            evidence_count: 3,
        };

        assert_eq!(determine_trajectory(&[]), Trend::New);
        assert_eq!(
            determine_trajectory(&[dim(Trend::Improving), dim(Trend::Stable)]),
            Trend::Improving
        );
        assert_eq!(
            determine_trajectory(&[dim(Trend::Declining), dim(Trend::New)]),
            Trend::Declining
        );
        assert_eq!(
            determine_trajectory(&[dim(Trend::Improving), dim(Trend::Declining)]),
            Trend::Stable
        );
    }

    #[tokio::test]
    async fn scored_attempt_updates_profile_and_emits_event() {
        let storage = Arc::new(MemStorage::new());
        for days_ago in [2, 1] {
            storage
                .insert_attempt(Attempt::completed(
                    org(),
                    user(),
                    Some(70.0),
                    serde_json::json!({"objection_handling": 55.0, "discovery": 85.0}),
                    Utc::now() - Duration::days(days_ago),
                ))
                .await;
        }

        let handler = Arc::new(OnAttemptScored::new(storage.clone(), CoachConfig::default()));
        let (captured, capture_handler) = capture(EventKind::WeaknessUpdated);
        let outcomes = drain_bus(vec![handler, capture_handler], scored_event()).await;

        let scored = &outcomes[0];
        assert!(scored.success());
        assert_eq!(scored.output.as_ref().unwrap()["updated"], 2);

        let activities = storage.activities().await;
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].action, "update_weakness_profile");
        assert_eq!(activities[0].details["dimensions_updated"], 2);

        let events = captured.lock().await;
        assert_eq!(events.len(), 1);
        let CoachEvent::WeaknessUpdated {
            weaknesses,
            strengths,
            trajectory,
            ..
        } = &events[0]
        else {
            panic!("expected weakness.updated");
        };
        assert_eq!(weaknesses.len(), 1);
        assert_eq!(weaknesses[0].key, "objection_handling");
        assert_eq!(strengths.len(), 1);
        assert_eq!(*trajectory, Trend::Stable);
    }

    #[tokio::test]
    async fn profile_failure_degrades_to_empty_and_still_completes() {
        let storage = Arc::new(FailingStorage::new(MemStorage::new()).fail_attempt_reads());
        let handler = Arc::new(OnAttemptScored::new(storage.clone(), CoachConfig::default()));
        let (captured, capture_handler) = capture(EventKind::WeaknessUpdated);

        let outcomes = drain_bus(vec![handler, capture_handler], scored_event()).await;

        let scored = &outcomes[0];
        assert!(scored.success());
        assert_eq!(scored.attempts, 1);
        assert_eq!(scored.output.as_ref().unwrap()["updated"], 0);

        // Logging and emission still happened.
        let activities = storage.inner().activities().await;
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].details["dimensions_updated"], 0);

        let events = captured.lock().await;
        assert_eq!(events.len(), 1);
        let CoachEvent::WeaknessUpdated {
            weaknesses,
            strengths,
            trajectory,
            ..
        } = &events[0]
        else {
            panic!("expected weakness.updated");
        };
        assert!(weaknesses.is_empty());
        assert!(strengths.is_empty());
        assert_eq!(*trajectory, Trend::New);
    }
}

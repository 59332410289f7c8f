//! Pipeline reacting to `user.inactive`.

use std::sync::Arc;

use async_trait::async_trait;
use repcoach_core::{
    dimension_label, ActivityRecord, CoachEvent, DimensionResult, EventKind, RecommendationType,
};
use repcoach_memory::{agent_context, AgentContext};
use repcoach_runtime::{Handler, RuntimeError, StepContext, Trigger};
use repcoach_storage::Storage;
use serde_json::json;

use crate::AGENT_COACH;

/// Triggered when a trainee goes quiet. Fetches their context, logs the
/// reminder, and emits a personalized practice-reminder recommendation.
pub struct OnUserInactive<S> {
    storage: Arc<S>,
}

impl<S: Storage> OnUserInactive<S> {
    /// Create the handler.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S: Storage + 'static> Handler for OnUserInactive<S> {
    fn id(&self) -> &'static str {
        "coach-on-user-inactive"
    }

    fn trigger(&self) -> Trigger {
        Trigger::Event(EventKind::UserInactive)
    }

    async fn handle(
        &self,
        ctx: &StepContext,
        event: Option<&CoachEvent>,
    ) -> Result<serde_json::Value, RuntimeError> {
        let Some(CoachEvent::UserInactive {
            org_id,
            user_id,
            days_since_last_attempt,
        }) = event
        else {
            return Err(RuntimeError::handler("expected a user.inactive payload"));
        };
        let days = *days_since_last_attempt;

        let context: AgentContext = ctx
            .run("fetch-context", || async {
                agent_context(self.storage.as_ref(), org_id, user_id)
                    .await
                    .map_err(RuntimeError::handler)
            })
            .await?;

        let message = build_reminder_message(&context.weaknesses, days);

        ctx.run("log-activity", || async {
            self.storage
                .record_activity(&ActivityRecord::new(
                    org_id.clone(),
                    Some(user_id.clone()),
                    AGENT_COACH,
                    EventKind::UserInactive.name(),
                    "send_practice_reminder",
                    json!({
                        "days_since_last_attempt": days,
                        "weakness_count": context.weaknesses.len(),
                    }),
                ))
                .await
                .map_err(RuntimeError::handler)
        })
        .await?;

        ctx.run("emit-recommendation", || async {
            ctx.events().send(CoachEvent::RecommendationReady {
                user_id: user_id.clone(),
                org_id: org_id.clone(),
                recommendation: RecommendationType::PracticeReminder,
                message: message.clone(),
                scenario_id: None,
            })
        })
        .await?;

        Ok(json!({ "reminded": true, "days_since_last_attempt": days }))
    }
}

/// Build a reminder message, naming the weakest known dimension when the
/// profile has one.
fn build_reminder_message(weaknesses: &[DimensionResult], days: i64) -> String {
    let day_label = if days == 1 { "day" } else { "days" };

    match weaknesses.first() {
        None => format!(
            "You haven't practiced in {days} {day_label}. \
             A quick session will keep your skills sharp."
        ),
        Some(weakest) => format!(
            "You haven't practiced in {days} {day_label}. \
             Your weakest area is {} (score: {:.0}). \
             A focused practice session could help improve it.",
            dimension_label(&weakest.key),
            weakest.score
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{capture, drain_bus};
    use repcoach_core::{DimensionKind, OrgId, Trend, UserId};
    use repcoach_storage::MemStorage;

    fn org() -> OrgId {
        OrgId::from("org-1")
    }

    fn user() -> UserId {
        UserId::from("user-1")
    }

    fn weakness(key: &str, score: f64) -> (DimensionKind, DimensionResult) {
        (
            DimensionKind::Weakness,
            DimensionResult {
                key: key.to_string(),
                score,
                trend: Trend::Stable,
                evidence_count: 3,
            },
        )
    }

    #[test]
    fn reminder_message_names_the_weakest_dimension() {
        let weaknesses = vec![
            DimensionResult {
                key: "objection_handling".to_string(),
                score: 55.0,
                trend: Trend::Declining,
                evidence_count: 4,
            },
        ];
        let message = build_reminder_message(&weaknesses, 4);
        assert!(message.contains("4 days"));
        assert!(message.contains("objection handling"));
        assert!(message.contains("(score: 55)"));

        let generic = build_reminder_message(&[], 1);
        assert!(generic.contains("1 day."));
        assert!(generic.contains("quick session"));
    }

    #[tokio::test]
    async fn inactive_user_gets_a_practice_reminder() {
        let storage = Arc::new(MemStorage::new());
        storage
            .replace_dimension_rows(
                &org(),
                &user(),
                &[weakness("objection_handling", 55.0), weakness("clarity", 65.0)],
            )
            .await
            .unwrap();

        let handler = Arc::new(OnUserInactive::new(storage.clone()));
        let (captured, capture_handler) = capture(EventKind::RecommendationReady);
        let outcomes = drain_bus(
            vec![handler, capture_handler],
            CoachEvent::UserInactive {
                org_id: org(),
                user_id: user(),
                days_since_last_attempt: 5,
            },
        )
        .await;

        assert!(outcomes[0].success());
        assert_eq!(outcomes[0].output.as_ref().unwrap()["reminded"], true);

        let activities = storage.activities().await;
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].action, "send_practice_reminder");
        assert_eq!(activities[0].details["weakness_count"], 2);

        let events = captured.lock().await;
        assert_eq!(events.len(), 1);
        let CoachEvent::RecommendationReady {
            recommendation,
            message,
            scenario_id,
            ..
        } = &events[0]
        else {
            panic!("expected recommendation.ready");
        };
        assert_eq!(*recommendation, RecommendationType::PracticeReminder);
        assert!(message.contains("objection handling"));
        assert!(scenario_id.is_none());
    }
}

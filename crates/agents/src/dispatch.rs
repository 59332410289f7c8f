//! Maps recommendation events to notifications and sends them.

use std::sync::Arc;

use async_trait::async_trait;
use repcoach_core::{
    ActivityRecord, CoachConfig, CoachEvent, EventKind, NotificationKind, NotificationReceipt,
    NotificationRequest, RecommendationType, ScenarioId,
};
use repcoach_runtime::{Handler, RuntimeError, StepContext, Trigger};
use repcoach_storage::Storage;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::notify::Notifier;
use crate::AGENT_COACH;

/// Notification content resolved from a recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NotificationContent {
    kind: NotificationKind,
    title: String,
    body: String,
    action_url: String,
}

/// Subscribes to `coach.recommendation.ready`, maps the recommendation to
/// notification content, sends it, and logs the delivery.
///
/// Unknown recommendation types never reach this handler: the bus rejects
/// them at the decode boundary with a `dispatched: false` outcome.
pub struct DispatchCoachNotification<S> {
    storage: Arc<S>,
    notifier: Arc<dyn Notifier>,
    config: CoachConfig,
}

impl<S: Storage> DispatchCoachNotification<S> {
    /// Create the handler.
    pub fn new(storage: Arc<S>, notifier: Arc<dyn Notifier>, config: CoachConfig) -> Self {
        Self {
            storage,
            notifier,
            config,
        }
    }

    /// Resolve a scenario id to its training path.
    ///
    /// Missing ids, vanished scenarios, and lookup failures all fall back
    /// to the generic training page; a lookup failure is logged, not
    /// raised, because a degraded link beats a dropped notification.
    async fn resolve_scenario_path(&self, scenario: Option<&ScenarioId>) -> String {
        let Some(id) = scenario else {
            return "/training".to_string();
        };

        match self.storage.scenario_exists(id).await {
            Ok(true) => format!("/training/scenarios/{id}"),
            Ok(false) => "/training".to_string(),
            Err(err) => {
                tracing::error!(
                    scenario = %id,
                    error = %err,
                    "failed to verify scenario; falling back to the training page"
                );
                "/training".to_string()
            }
        }
    }

    async fn map_recommendation(
        &self,
        recommendation: RecommendationType,
        message: &str,
        scenario: Option<&ScenarioId>,
    ) -> NotificationContent {
        match recommendation {
            RecommendationType::NextScenario => {
                let path = self.resolve_scenario_path(scenario).await;
                NotificationContent {
                    kind: NotificationKind::CoachRecommendation,
                    title: "Your coach recommends...".to_string(),
                    body: message.to_string(),
                    action_url: self.config.action_url(&path),
                }
            }
            RecommendationType::ReviewDrill => {
                let path = self.resolve_scenario_path(scenario).await;
                NotificationContent {
                    kind: NotificationKind::CoachRecommendation,
                    title: "Skill review due".to_string(),
                    body: message.to_string(),
                    action_url: self.config.action_url(&path),
                }
            }
            RecommendationType::PracticeReminder => NotificationContent {
                kind: NotificationKind::PracticeReminder,
                title: "Time to practice!".to_string(),
                body: message.to_string(),
                action_url: self.config.action_url("/training"),
            },
            RecommendationType::DailyDigest => NotificationContent {
                kind: NotificationKind::DailyDigest,
                title: "Your daily progress".to_string(),
                body: message.to_string(),
                action_url: self.config.action_url("/dashboard"),
            },
        }
    }
}

#[async_trait]
impl<S: Storage + 'static> Handler for DispatchCoachNotification<S> {
    fn id(&self) -> &'static str {
        "dispatch-coach-notification"
    }

    fn trigger(&self) -> Trigger {
        Trigger::Event(EventKind::RecommendationReady)
    }

    async fn handle(
        &self,
        ctx: &StepContext,
        event: Option<&CoachEvent>,
    ) -> Result<serde_json::Value, RuntimeError> {
        let Some(CoachEvent::RecommendationReady {
            user_id,
            org_id,
            recommendation,
            message,
            scenario_id,
        }) = event
        else {
            return Err(RuntimeError::handler(
                "expected a coach.recommendation.ready payload",
            ));
        };

        let content: NotificationContent = ctx
            .run("map-recommendation", || async {
                Ok(self
                    .map_recommendation(*recommendation, message, scenario_id.as_ref())
                    .await)
            })
            .await?;

        let receipt: NotificationReceipt = ctx
            .run("send-notification", || async {
                self.notifier
                    .send(&NotificationRequest {
                        user_id: user_id.clone(),
                        org_id: org_id.clone(),
                        agent_id: AGENT_COACH.to_string(),
                        kind: content.kind,
                        title: content.title.clone(),
                        body: content.body.clone(),
                        action_url: content.action_url.clone(),
                        recipient_email: None,
                        recipient_name: None,
                        metadata: json!({
                            "recommendation_type": recommendation.as_str(),
                        }),
                    })
                    .await
                    .map_err(RuntimeError::handler)
            })
            .await?;

        ctx.run("log-activity", || async {
            self.storage
                .record_activity(&ActivityRecord::new(
                    org_id.clone(),
                    Some(user_id.clone()),
                    AGENT_COACH,
                    EventKind::RecommendationReady.name(),
                    "dispatch_notification",
                    json!({
                        "recommendation_type": recommendation.as_str(),
                        "notification_id": receipt.notification_id.to_string(),
                        "email_sent": receipt.email_sent,
                        "action_url": content.action_url,
                    }),
                ))
                .await
                .map_err(RuntimeError::handler)
        })
        .await?;

        Ok(json!({
            "dispatched": true,
            "notification_id": receipt.notification_id.to_string(),
            "email_sent": receipt.email_sent,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::testutil::drain_bus;
    use repcoach_core::{OrgId, UserId};
    use repcoach_runtime::{EventBus, IngestOutcome, MemoryJournal};
    use repcoach_storage::MemStorage;

    fn org() -> OrgId {
        OrgId::from("org-1")
    }

    fn user() -> UserId {
        UserId::from("user-1")
    }

    fn handler(
        storage: Arc<MemStorage>,
        notifier: Arc<RecordingNotifier>,
    ) -> Arc<DispatchCoachNotification<MemStorage>> {
        Arc::new(DispatchCoachNotification::new(
            storage,
            notifier,
            CoachConfig::default().with_app_url("https://app.example.com"),
        ))
    }

    fn recommendation(
        recommendation: RecommendationType,
        scenario_id: Option<ScenarioId>,
    ) -> CoachEvent {
        CoachEvent::RecommendationReady {
            user_id: user(),
            org_id: org(),
            recommendation,
            message: "do the thing".to_string(),
            scenario_id,
        }
    }

    #[tokio::test]
    async fn practice_reminder_links_to_the_training_page() {
        let storage = Arc::new(MemStorage::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let outcomes = drain_bus(
            vec![handler(storage.clone(), notifier.clone())],
            recommendation(RecommendationType::PracticeReminder, None),
        )
        .await;

        assert!(outcomes[0].success());
        assert_eq!(outcomes[0].output.as_ref().unwrap()["dispatched"], true);

        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "Time to practice!");
        assert_eq!(sent[0].action_url, "https://app.example.com/training");
        assert_eq!(sent[0].kind, NotificationKind::PracticeReminder);

        let activities = storage.activities().await;
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].action, "dispatch_notification");
        assert_eq!(activities[0].details["email_sent"], false);
    }

    #[tokio::test]
    async fn next_scenario_resolves_or_falls_back() {
        let storage = Arc::new(MemStorage::new());
        storage.add_scenario(ScenarioId::from("sc-9")).await;
        let notifier = Arc::new(RecordingNotifier::new());

        // Known scenario resolves to its page.
        drain_bus(
            vec![handler(storage.clone(), notifier.clone())],
            recommendation(
                RecommendationType::NextScenario,
                Some(ScenarioId::from("sc-9")),
            ),
        )
        .await;

        // Vanished scenario falls back to the generic training page.
        drain_bus(
            vec![handler(storage.clone(), notifier.clone())],
            recommendation(
                RecommendationType::ReviewDrill,
                Some(ScenarioId::from("gone")),
            ),
        )
        .await;

        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[0].action_url,
            "https://app.example.com/training/scenarios/sc-9"
        );
        assert_eq!(sent[1].action_url, "https://app.example.com/training");
    }

    #[tokio::test]
    async fn daily_digest_links_to_the_dashboard() {
        let storage = Arc::new(MemStorage::new());
        let notifier = Arc::new(RecordingNotifier::new());

        drain_bus(
            vec![handler(storage, notifier.clone())],
            recommendation(RecommendationType::DailyDigest, None),
        )
        .await;

        let sent = notifier.sent().await;
        assert_eq!(sent[0].action_url, "https://app.example.com/dashboard");
        assert_eq!(sent[0].title, "Your daily progress");
    }

    #[tokio::test]
    async fn unknown_recommendation_type_is_rejected_without_a_send() {
        let storage = Arc::new(MemStorage::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let mut bus = EventBus::new(Arc::new(MemoryJournal::new()));
        bus.register(handler(storage.clone(), notifier.clone()));

        let outcome = bus.ingest(
            "coach.recommendation.ready",
            json!({
                "user_id": "user-1",
                "org_id": "org-1",
                "recommendation": "unknown_type",
                "message": "??",
            }),
        );

        assert_eq!(
            outcome,
            IngestOutcome::Rejected {
                reason: "unknown_recommendation_type".to_string()
            }
        );
        assert!(bus.drain().await.is_empty());
        assert!(notifier.sent().await.is_empty());
        assert!(storage.activities().await.is_empty());
    }
}

//! Daily cron detecting trainees who stopped practicing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use repcoach_core::{CoachConfig, CoachEvent, OrgId, UserId};
use repcoach_runtime::{Handler, RuntimeError, StepContext, Trigger};
use repcoach_storage::Storage;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Schedule: daily at 09:00 UTC.
pub const CRON_DETECT_INACTIVE: &str = "0 9 * * *";

/// Emits `user.inactive` for every trainee whose last completed attempt is
/// at least the configured threshold of days old.
pub struct DetectInactiveUsers<S> {
    storage: Arc<S>,
    config: CoachConfig,
}

impl<S: Storage> DetectInactiveUsers<S> {
    /// Create the handler.
    pub fn new(storage: Arc<S>, config: CoachConfig) -> Self {
        Self { storage, config }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InactiveUser {
    org_id: OrgId,
    user_id: UserId,
    days_since_last_attempt: i64,
}

#[async_trait]
impl<S: Storage + 'static> Handler for DetectInactiveUsers<S> {
    fn id(&self) -> &'static str {
        "detect-inactive-users"
    }

    fn trigger(&self) -> Trigger {
        Trigger::Cron(CRON_DETECT_INACTIVE)
    }

    async fn handle(
        &self,
        ctx: &StepContext,
        _event: Option<&CoachEvent>,
    ) -> Result<serde_json::Value, RuntimeError> {
        let inactive: Vec<InactiveUser> = ctx
            .run("query-inactive-users", || async {
                let rows = self
                    .storage
                    .latest_attempts_by_user()
                    .await
                    .map_err(RuntimeError::handler)?;

                let now = Utc::now();
                Ok(rows
                    .into_iter()
                    .filter_map(|row| {
                        let days = (now - row.last_attempt_at).num_days();
                        (days >= self.config.inactivity_threshold_days).then(|| InactiveUser {
                            org_id: row.org_id,
                            user_id: row.user_id,
                            days_since_last_attempt: days,
                        })
                    })
                    .collect())
            })
            .await?;

        let detected = inactive.len();

        ctx.run("emit-inactive-events", || async {
            for user in &inactive {
                ctx.events().send(CoachEvent::UserInactive {
                    org_id: user.org_id.clone(),
                    user_id: user.user_id.clone(),
                    days_since_last_attempt: user.days_since_last_attempt,
                })?;
            }
            Ok(())
        })
        .await?;

        Ok(json!({ "detected_count": detected }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::capture;
    use chrono::Duration;
    use repcoach_core::{Attempt, EventKind};
    use repcoach_runtime::{EventBus, MemoryJournal};
    use repcoach_storage::MemStorage;

    #[tokio::test]
    async fn only_stale_users_are_flagged() {
        let storage = Arc::new(MemStorage::new());
        let org = OrgId::from("org-1");
        storage
            .insert_attempt(Attempt::completed(
                org.clone(),
                UserId::from("fresh"),
                Some(80.0),
                serde_json::json!({}),
                Utc::now() - Duration::days(1),
            ))
            .await;
        storage
            .insert_attempt(Attempt::completed(
                org.clone(),
                UserId::from("stale"),
                Some(60.0),
                serde_json::json!({}),
                Utc::now() - Duration::days(5),
            ))
            .await;

        let mut bus = EventBus::new(Arc::new(MemoryJournal::new()));
        bus.register(Arc::new(DetectInactiveUsers::new(
            storage,
            CoachConfig::default(),
        )));
        let (captured, capture_handler) = capture(EventKind::UserInactive);
        bus.register(capture_handler);

        let outcome = bus.run_cron("detect-inactive-users").await.unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.output.as_ref().unwrap()["detected_count"], 1);

        bus.drain().await;
        let events = captured.lock().await;
        assert_eq!(events.len(), 1);
        let CoachEvent::UserInactive {
            user_id,
            days_since_last_attempt,
            ..
        } = &events[0]
        else {
            panic!("expected user.inactive");
        };
        assert_eq!(user_id.as_str(), "stale");
        assert_eq!(*days_since_last_attempt, 5);
    }
}

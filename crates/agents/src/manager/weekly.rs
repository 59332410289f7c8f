//! Weekly cron fanning team insights out to managers.

use std::sync::Arc;

use async_trait::async_trait;
use repcoach_core::{
    CoachConfig, CoachEvent, InsightPriority, ManagerInsight, NotificationKind,
    NotificationRequest, OrgId, TeamAnalysis, UserId,
};
use repcoach_runtime::{Handler, RuntimeError, StepContext, Trigger};
use repcoach_storage::{Role, Storage};
use serde_json::json;

use super::{analyze_team, generate_insights};
use crate::notify::Notifier;
use crate::AGENT_MANAGER;

/// Schedule: Mondays at 09:00 UTC.
pub const CRON_WEEKLY_ANALYSIS: &str = "0 9 * * 1";

/// Runs team analysis per org, converts it to insights, and notifies every
/// manager and admin, honoring their low-priority-alert preference.
///
/// Orgs are processed sequentially and independently: one tenant's failure
/// is logged and collected, never allowed to abort the rest of the run.
pub struct ManagerWeeklyAnalysis<S> {
    storage: Arc<S>,
    notifier: Arc<dyn Notifier>,
    config: CoachConfig,
}

struct ManagerInfo {
    user_id: UserId,
    name: Option<String>,
    email: Option<String>,
    low_priority_alerts: bool,
}

impl<S: Storage> ManagerWeeklyAnalysis<S> {
    /// Create the handler.
    pub fn new(storage: Arc<S>, notifier: Arc<dyn Notifier>, config: CoachConfig) -> Self {
        Self {
            storage,
            notifier,
            config,
        }
    }

    /// Managers and admins of an org with their alert preference resolved.
    /// Lookup failures degrade to an empty list or the default preference;
    /// they are logged rather than raised so the org still counts as
    /// processed.
    async fn find_org_managers(&self, org: &OrgId) -> Vec<ManagerInfo> {
        let members = match self
            .storage
            .org_members(org, &[Role::Manager, Role::Admin])
            .await
        {
            Ok(members) => members,
            Err(err) => {
                tracing::error!(org = %org, error = %err, "failed to fetch managers");
                return Vec::new();
            }
        };

        let mut managers = Vec::new();
        for member in members {
            let low_priority_alerts = match self
                .storage
                .notification_preference(org, &member.user_id)
                .await
            {
                Ok(Some(prefs)) => prefs.low_priority_alerts,
                // Absent row means the preference was never touched:
                // default to enabled.
                Ok(None) => true,
                Err(err) => {
                    tracing::error!(
                        org = %org,
                        user = %member.user_id,
                        error = %err,
                        "failed to fetch notification preferences"
                    );
                    true
                }
            };
            managers.push(ManagerInfo {
                user_id: member.user_id,
                name: member.name,
                email: member.email,
                low_priority_alerts,
            });
        }
        managers
    }

    async fn process_org(
        &self,
        ctx: &StepContext,
        org: &OrgId,
    ) -> Result<(usize, usize), RuntimeError> {
        let analysis: TeamAnalysis = ctx
            .run(&format!("analyze-{org}"), || async {
                analyze_team(self.storage.as_ref(), org)
                    .await
                    .map_err(RuntimeError::handler)
            })
            .await?;

        let insights: Vec<ManagerInsight> = ctx
            .run(&format!("insights-{org}"), || async {
                Ok(generate_insights(&analysis))
            })
            .await?;

        if insights.is_empty() {
            return Ok((0, 0));
        }

        let notified: usize = ctx
            .run(&format!("notify-{org}"), || async {
                let managers = self.find_org_managers(org).await;
                let mut notified = 0usize;

                for manager in &managers {
                    let filtered = insights.iter().filter(|i| {
                        manager.low_priority_alerts || i.priority != InsightPriority::Low
                    });

                    for insight in filtered {
                        let request = NotificationRequest {
                            user_id: manager.user_id.clone(),
                            org_id: org.clone(),
                            agent_id: AGENT_MANAGER.to_string(),
                            kind: NotificationKind::WeeklyInsight,
                            title: insight.title.clone(),
                            body: insight.message.clone(),
                            action_url: self.config.action_url("/dashboard/team"),
                            recipient_email: manager.email.clone(),
                            recipient_name: manager.name.clone(),
                            metadata: json!({
                                "insight_kind": insight.kind,
                                "priority": insight.priority,
                                "details": insight.metadata,
                            }),
                        };

                        match self.notifier.send(&request).await {
                            Ok(_) => notified += 1,
                            Err(err) => {
                                tracing::error!(
                                    org = %org,
                                    manager = %manager.user_id,
                                    error = %err,
                                    "failed to notify manager"
                                );
                            }
                        }
                    }
                }

                Ok(notified)
            })
            .await?;

        Ok((insights.len(), notified))
    }
}

#[async_trait]
impl<S: Storage + 'static> Handler for ManagerWeeklyAnalysis<S> {
    fn id(&self) -> &'static str {
        "manager-weekly-analysis"
    }

    fn trigger(&self) -> Trigger {
        Trigger::Cron(CRON_WEEKLY_ANALYSIS)
    }

    async fn handle(
        &self,
        ctx: &StepContext,
        _event: Option<&CoachEvent>,
    ) -> Result<serde_json::Value, RuntimeError> {
        let org_ids: Vec<OrgId> = ctx
            .run("list-active-orgs", || async {
                self.storage.list_orgs().await.map_err(RuntimeError::handler)
            })
            .await?;

        let mut total_insights = 0usize;
        let mut total_notifications = 0usize;
        let mut failed_orgs: Vec<String> = Vec::new();

        for org in &org_ids {
            match self.process_org(ctx, org).await {
                Ok((insights, notified)) => {
                    total_insights += insights;
                    total_notifications += notified;
                }
                Err(err) => {
                    tracing::error!(org = %org, error = %err, "weekly analysis failed for org");
                    failed_orgs.push(org.to_string());
                }
            }
        }

        Ok(json!({
            "orgs_processed": org_ids.len(),
            "total_insights": total_insights,
            "total_notifications": total_notifications,
            "failures": failed_orgs.len(),
            "failed_orgs": failed_orgs,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::testutil::FailingStorage;
    use chrono::{Duration, Utc};
    use repcoach_core::{Attempt, DimensionKind, DimensionResult, Trend};
    use repcoach_runtime::{EventBus, MemoryJournal};
    use repcoach_storage::{Member, MemStorage, NotificationPrefs};

    async fn seed_org_with_gap(storage: &MemStorage, org: &OrgId) {
        for id in ["t1", "t2", "t3"] {
            let user = UserId::from(format!("{org}-{id}").as_str());
            storage.add_member(
                org.clone(),
                Member {
                    user_id: user.clone(),
                    role: Role::Trainee,
                    name: None,
                    email: None,
                },
            )
            .await;
            storage
                .replace_dimension_rows(
                    org,
                    &user,
                    &[(
                        DimensionKind::Weakness,
                        DimensionResult {
                            key: "objection_handling".to_string(),
                            score: 50.0,
                            trend: Trend::Stable,
                            evidence_count: 3,
                        },
                    )],
                )
                .await
                .unwrap();
            storage
                .insert_attempt(Attempt::completed(
                    org.clone(),
                    user,
                    Some(70.0),
                    serde_json::json!({}),
                    Utc::now() - Duration::days(1),
                ))
                .await;
        }
        storage
            .add_member(
                org.clone(),
                Member {
                    user_id: UserId::from(format!("{org}-mgr").as_str()),
                    role: Role::Manager,
                    name: Some("Sam".to_string()),
                    email: Some("sam@example.com".to_string()),
                },
            )
            .await;
    }

    #[tokio::test]
    async fn one_failing_org_does_not_block_the_others() {
        let inner = MemStorage::new();
        for org_name in ["A", "B", "C"] {
            let org = OrgId::from(org_name);
            inner.add_org(org.clone()).await;
            seed_org_with_gap(&inner, &org).await;
        }

        let storage = Arc::new(FailingStorage::new(inner).fail_members_for(OrgId::from("B")));
        let notifier = Arc::new(RecordingNotifier::new());

        let mut bus = EventBus::new(Arc::new(MemoryJournal::new()));
        bus.register(Arc::new(ManagerWeeklyAnalysis::new(
            storage,
            notifier.clone(),
            CoachConfig::default(),
        )));

        let outcome = bus.run_cron("manager-weekly-analysis").await.unwrap();
        assert!(outcome.success());

        let output = outcome.output.unwrap();
        assert_eq!(output["orgs_processed"], 3);
        assert_eq!(output["failures"], 1);
        assert_eq!(output["failed_orgs"], serde_json::json!(["B"]));
        // Orgs A and C still produced insights and notifications.
        assert!(output["total_insights"].as_u64().unwrap() >= 2);

        let sent = notifier.sent().await;
        assert!(!sent.is_empty());
        assert!(sent.iter().all(|n| n.org_id.as_str() != "B"));
        assert!(sent.iter().any(|n| n.org_id.as_str() == "A"));
        assert!(sent.iter().any(|n| n.org_id.as_str() == "C"));
        assert!(sent.iter().all(|n| n.kind == NotificationKind::WeeklyInsight));
        assert_eq!(sent[0].recipient_email.as_deref(), Some("sam@example.com"));
    }

    #[tokio::test]
    async fn low_priority_insights_honor_the_preference() {
        let storage = Arc::new(MemStorage::new());
        let org = OrgId::from("A");
        storage.add_org(org.clone()).await;

        // One trainee with enough high scores for a milestone (low
        // priority) and nothing else.
        let star = UserId::from("star");
        storage
            .add_member(
                org.clone(),
                Member {
                    user_id: star.clone(),
                    role: Role::Trainee,
                    name: None,
                    email: None,
                },
            )
            .await;
        for i in 0..5 {
            storage
                .insert_attempt(Attempt::completed(
                    org.clone(),
                    star.clone(),
                    Some(95.0),
                    serde_json::json!({}),
                    Utc::now() - Duration::hours(i),
                ))
                .await;
        }
        let manager = UserId::from("mgr");
        storage
            .add_member(
                org.clone(),
                Member {
                    user_id: manager.clone(),
                    role: Role::Manager,
                    name: None,
                    email: None,
                },
            )
            .await;
        storage
            .set_preference(
                org.clone(),
                manager,
                NotificationPrefs {
                    low_priority_alerts: false,
                },
            )
            .await;

        let notifier = Arc::new(RecordingNotifier::new());
        let mut bus = EventBus::new(Arc::new(MemoryJournal::new()));
        bus.register(Arc::new(ManagerWeeklyAnalysis::new(
            storage,
            notifier.clone(),
            CoachConfig::default(),
        )));

        let outcome = bus.run_cron("manager-weekly-analysis").await.unwrap();
        let output = outcome.output.unwrap();
        // The milestone insight exists but the manager opted out of low
        // priority alerts, so nothing was sent.
        assert_eq!(output["total_insights"], 1);
        assert_eq!(output["total_notifications"], 0);
        assert!(notifier.sent().await.is_empty());
    }
}

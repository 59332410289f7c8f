//! In-memory storage backend.
//!
//! The default backend for tests, seeds, and local pipeline runs. All
//! state lives behind one `RwLock`; clones share the same store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use repcoach_core::{
    ActivityRecord, Attempt, AttemptStatus, DimensionKind, DimensionResult, OrgId, ScenarioId,
    Time, UserId,
};
use tokio::sync::RwLock;

use super::{AttemptStamp, LastAttempt, Member, NotificationPrefs, Result, Role, Storage};

#[derive(Default)]
struct Inner {
    attempts: Vec<Attempt>,
    dimension_rows: HashMap<(OrgId, UserId), Vec<(DimensionKind, DimensionResult)>>,
    orgs: Vec<OrgId>,
    members: HashMap<OrgId, Vec<Member>>,
    scenarios: Vec<ScenarioId>,
    prefs: HashMap<(OrgId, UserId), NotificationPrefs>,
    activities: Vec<ActivityRecord>,
}

/// Shared in-memory backend.
#[derive(Clone, Default)]
pub struct MemStorage {
    inner: Arc<RwLock<Inner>>,
}

impl MemStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an organization.
    pub async fn add_org(&self, org: OrgId) {
        let mut inner = self.inner.write().await;
        if !inner.orgs.contains(&org) {
            inner.orgs.push(org);
        }
    }

    /// Register an org member.
    pub async fn add_member(&self, org: OrgId, member: Member) {
        self.inner
            .write()
            .await
            .members
            .entry(org)
            .or_default()
            .push(member);
    }

    /// Register a scenario id the dispatcher may link to.
    pub async fn add_scenario(&self, scenario: ScenarioId) {
        self.inner.write().await.scenarios.push(scenario);
    }

    /// Set a user's notification preference row.
    pub async fn set_preference(&self, org: OrgId, user: UserId, prefs: NotificationPrefs) {
        self.inner.write().await.prefs.insert((org, user), prefs);
    }

    /// Insert an attempt record.
    pub async fn insert_attempt(&self, attempt: Attempt) {
        self.inner.write().await.attempts.push(attempt);
    }

    /// Snapshot of the audit log, oldest first.
    pub async fn activities(&self) -> Vec<ActivityRecord> {
        self.inner.read().await.activities.clone()
    }
}

fn completed_for<'a>(
    attempts: &'a [Attempt],
    org: &'a OrgId,
    user: &'a UserId,
) -> impl Iterator<Item = &'a Attempt> {
    attempts.iter().filter(move |a| {
        a.status == AttemptStatus::Completed && &a.org_id == org && &a.user_id == user
    })
}

#[async_trait]
impl Storage for MemStorage {
    async fn recent_completed_attempts(
        &self,
        org: &OrgId,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<Attempt>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Attempt> = completed_for(&inner.attempts, org, user).cloned().collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn completed_attempts_between(
        &self,
        org: &OrgId,
        user: &UserId,
        from: Time,
        to: Time,
    ) -> Result<Vec<Attempt>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Attempt> = completed_for(&inner.attempts, org, user)
            .filter(|a| a.started_at >= from && a.started_at < to)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(rows)
    }

    async fn completed_attempt_stamps(
        &self,
        org: &OrgId,
        user: &UserId,
    ) -> Result<Vec<AttemptStamp>> {
        let inner = self.inner.read().await;
        let mut stamps: Vec<AttemptStamp> = completed_for(&inner.attempts, org, user)
            .map(|a| AttemptStamp {
                started_at: a.started_at,
                score: a.score,
            })
            .collect();
        stamps.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(stamps)
    }

    async fn latest_attempts_by_user(&self) -> Result<Vec<LastAttempt>> {
        let inner = self.inner.read().await;
        let mut latest: HashMap<(OrgId, UserId), Time> = HashMap::new();
        for attempt in inner
            .attempts
            .iter()
            .filter(|a| a.status == AttemptStatus::Completed)
        {
            let key = (attempt.org_id.clone(), attempt.user_id.clone());
            let entry = latest.entry(key).or_insert(attempt.started_at);
            if attempt.started_at > *entry {
                *entry = attempt.started_at;
            }
        }
        let mut rows: Vec<LastAttempt> = latest
            .into_iter()
            .map(|((org_id, user_id), last_attempt_at)| LastAttempt {
                org_id,
                user_id,
                last_attempt_at,
            })
            .collect();
        rows.sort_by(|a, b| (&a.org_id, &a.user_id).cmp(&(&b.org_id, &b.user_id)));
        Ok(rows)
    }

    async fn active_trainees(&self, since: Time) -> Result<Vec<(OrgId, UserId)>> {
        let inner = self.inner.read().await;
        let mut seen: Vec<(OrgId, UserId)> = Vec::new();
        for attempt in inner.attempts.iter().filter(|a| {
            a.status == AttemptStatus::Completed && a.started_at >= since
        }) {
            let key = (attempt.org_id.clone(), attempt.user_id.clone());
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
        Ok(seen)
    }

    async fn replace_dimension_rows(
        &self,
        org: &OrgId,
        user: &UserId,
        rows: &[(DimensionKind, DimensionResult)],
    ) -> Result<()> {
        self.inner
            .write()
            .await
            .dimension_rows
            .insert((org.clone(), user.clone()), rows.to_vec());
        Ok(())
    }

    async fn dimension_rows(
        &self,
        org: &OrgId,
        user: &UserId,
        kind: DimensionKind,
    ) -> Result<Vec<DimensionResult>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<DimensionResult> = inner
            .dimension_rows
            .get(&(org.clone(), user.clone()))
            .map(|rows| {
                rows.iter()
                    .filter(|(k, _)| *k == kind)
                    .map(|(_, r)| r.clone())
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.evidence_count.cmp(&b.evidence_count))
                .then(a.key.cmp(&b.key))
        });
        Ok(rows)
    }

    async fn list_orgs(&self) -> Result<Vec<OrgId>> {
        Ok(self.inner.read().await.orgs.clone())
    }

    async fn org_members(&self, org: &OrgId, roles: &[Role]) -> Result<Vec<Member>> {
        let inner = self.inner.read().await;
        Ok(inner
            .members
            .get(org)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| roles.contains(&m.role))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn notification_preference(
        &self,
        org: &OrgId,
        user: &UserId,
    ) -> Result<Option<NotificationPrefs>> {
        let inner = self.inner.read().await;
        Ok(inner.prefs.get(&(org.clone(), user.clone())).copied())
    }

    async fn scenario_exists(&self, scenario: &ScenarioId) -> Result<bool> {
        Ok(self.inner.read().await.scenarios.contains(scenario))
    }

    async fn record_activity(&self, record: &ActivityRecord) -> Result<()> {
        self.inner.write().await.activities.push(record.clone());
        Ok(())
    }
}

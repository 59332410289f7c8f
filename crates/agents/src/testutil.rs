//! Shared fixtures for handler tests.

use std::sync::Arc;

use async_trait::async_trait;
use repcoach_core::{
    ActivityRecord, Attempt, CoachEvent, DimensionKind, DimensionResult, EventKind, OrgId,
    ScenarioId, Time, UserId,
};
use repcoach_runtime::{
    EventBus, Handler, InvocationOutcome, MemoryJournal, RuntimeError, StepContext, Trigger,
};
use repcoach_storage::{
    AttemptStamp, LastAttempt, Member, MemStorage, NotificationPrefs, Role, Storage, StorageError,
};
use tokio::sync::Mutex;

/// Handler that records every event of one kind.
pub struct CaptureHandler {
    kind: EventKind,
    events: Arc<Mutex<Vec<CoachEvent>>>,
}

/// Build a capture handler and the list it records into.
pub fn capture(kind: EventKind) -> (Arc<Mutex<Vec<CoachEvent>>>, Arc<CaptureHandler>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(CaptureHandler {
        kind,
        events: events.clone(),
    });
    (events, handler)
}

#[async_trait]
impl Handler for CaptureHandler {
    fn id(&self) -> &'static str {
        "capture"
    }

    fn trigger(&self) -> Trigger {
        Trigger::Event(self.kind)
    }

    async fn handle(
        &self,
        _ctx: &StepContext,
        event: Option<&CoachEvent>,
    ) -> Result<serde_json::Value, RuntimeError> {
        if let Some(event) = event {
            self.events.lock().await.push(event.clone());
        }
        Ok(serde_json::Value::Null)
    }
}

/// Build a bus over a fresh journal, emit one event, and drain it.
pub async fn drain_bus(
    handlers: Vec<Arc<dyn Handler>>,
    event: CoachEvent,
) -> Vec<InvocationOutcome> {
    let mut bus = EventBus::new(Arc::new(MemoryJournal::new()));
    for handler in handlers {
        bus.register(handler);
    }
    bus.emit(event).expect("bus accepts events before drain");
    bus.drain().await
}

/// Storage wrapper with injectable failures, delegating everything else to
/// an inner [`MemStorage`].
pub struct FailingStorage {
    inner: MemStorage,
    fail_attempt_reads: bool,
    fail_members_for: Option<OrgId>,
}

impl FailingStorage {
    /// Wrap a store with no failures armed.
    pub fn new(inner: MemStorage) -> Self {
        Self {
            inner,
            fail_attempt_reads: false,
            fail_members_for: None,
        }
    }

    /// Make every attempt-window read fail.
    pub fn fail_attempt_reads(mut self) -> Self {
        self.fail_attempt_reads = true;
        self
    }

    /// Make member lookups fail for one org.
    pub fn fail_members_for(mut self, org: OrgId) -> Self {
        self.fail_members_for = Some(org);
        self
    }

    /// The wrapped store.
    pub fn inner(&self) -> &MemStorage {
        &self.inner
    }

    fn injected() -> StorageError {
        StorageError::Unavailable("injected failure".to_string())
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn recent_completed_attempts(
        &self,
        org: &OrgId,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<Attempt>, StorageError> {
        if self.fail_attempt_reads {
            return Err(Self::injected());
        }
        self.inner.recent_completed_attempts(org, user, limit).await
    }

    async fn completed_attempts_between(
        &self,
        org: &OrgId,
        user: &UserId,
        from: Time,
        to: Time,
    ) -> Result<Vec<Attempt>, StorageError> {
        if self.fail_attempt_reads {
            return Err(Self::injected());
        }
        self.inner
            .completed_attempts_between(org, user, from, to)
            .await
    }

    async fn completed_attempt_stamps(
        &self,
        org: &OrgId,
        user: &UserId,
    ) -> Result<Vec<AttemptStamp>, StorageError> {
        self.inner.completed_attempt_stamps(org, user).await
    }

    async fn latest_attempts_by_user(&self) -> Result<Vec<LastAttempt>, StorageError> {
        self.inner.latest_attempts_by_user().await
    }

    async fn active_trainees(&self, since: Time) -> Result<Vec<(OrgId, UserId)>, StorageError> {
        self.inner.active_trainees(since).await
    }

    async fn replace_dimension_rows(
        &self,
        org: &OrgId,
        user: &UserId,
        rows: &[(DimensionKind, DimensionResult)],
    ) -> Result<(), StorageError> {
        self.inner.replace_dimension_rows(org, user, rows).await
    }

    async fn dimension_rows(
        &self,
        org: &OrgId,
        user: &UserId,
        kind: DimensionKind,
    ) -> Result<Vec<DimensionResult>, StorageError> {
        self.inner.dimension_rows(org, user, kind).await
    }

    async fn list_orgs(&self) -> Result<Vec<OrgId>, StorageError> {
        self.inner.list_orgs().await
    }

    async fn org_members(&self, org: &OrgId, roles: &[Role]) -> Result<Vec<Member>, StorageError> {
        if self.fail_members_for.as_ref() == Some(org) {
            return Err(Self::injected());
        }
        self.inner.org_members(org, roles).await
    }

    async fn notification_preference(
        &self,
        org: &OrgId,
        user: &UserId,
    ) -> Result<Option<NotificationPrefs>, StorageError> {
        self.inner.notification_preference(org, user).await
    }

    async fn scenario_exists(&self, scenario: &ScenarioId) -> Result<bool, StorageError> {
        self.inner.scenario_exists(scenario).await
    }

    async fn record_activity(&self, record: &ActivityRecord) -> Result<(), StorageError> {
        self.inner.record_activity(record).await
    }
}

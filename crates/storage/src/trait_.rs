//! Storage trait abstraction.

use async_trait::async_trait;
use repcoach_core::{
    ActivityRecord, Attempt, DimensionKind, DimensionResult, OrgId, ScenarioId, Time, UserId,
};
use serde::{Deserialize, Serialize};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error
    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Item not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Backend temporarily unreachable
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// A member's role within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A rep being trained.
    Trainee,
    /// A manager of trainees.
    Manager,
    /// An org administrator.
    Admin,
}

/// An organization member row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// The member's user id.
    pub user_id: UserId,
    /// Role within the org.
    pub role: Role,
    /// Display name, when the directory has one.
    pub name: Option<String>,
    /// Email address, when the directory has one.
    pub email: Option<String>,
}

/// Per-user notification preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    /// Whether the user wants low-priority alerts. An absent preference
    /// row means enabled.
    pub low_priority_alerts: bool,
}

/// Timestamp-and-score slice of a completed attempt, for cadence queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptStamp {
    /// When the attempt started.
    pub started_at: Time,
    /// Overall score, when scored.
    pub score: Option<f64>,
}

/// Latest completed attempt per (org, user), for inactivity detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastAttempt {
    /// Owning organization.
    pub org_id: OrgId,
    /// Owning user.
    pub user_id: UserId,
    /// When their most recent completed attempt started.
    pub last_attempt_at: Time,
}

/// Storage abstraction over the host platform's database.
///
/// Every query is explicitly scoped by org (and user where applicable);
/// there is no implicit tenant state. The pipeline never mutates attempts,
/// only reads them; its writes are limited to dimension rows and the audit
/// log.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Attempt queries ===

    /// Most recent completed attempts for a user, newest first.
    async fn recent_completed_attempts(
        &self,
        org: &OrgId,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<Attempt>>;

    /// Completed attempts within `[from, to)`, oldest first.
    async fn completed_attempts_between(
        &self,
        org: &OrgId,
        user: &UserId,
        from: Time,
        to: Time,
    ) -> Result<Vec<Attempt>>;

    /// Timestamp/score slices of all completed attempts, newest first.
    async fn completed_attempt_stamps(
        &self,
        org: &OrgId,
        user: &UserId,
    ) -> Result<Vec<AttemptStamp>>;

    /// Latest completed attempt per (org, user) across all tenants.
    async fn latest_attempts_by_user(&self) -> Result<Vec<LastAttempt>>;

    /// Distinct (org, user) pairs with a completed attempt since `since`.
    async fn active_trainees(&self, since: Time) -> Result<Vec<(OrgId, UserId)>>;

    // === Dimension rows ===

    /// Overwrite a user's persisted profile with freshly computed rows.
    async fn replace_dimension_rows(
        &self,
        org: &OrgId,
        user: &UserId,
        rows: &[(DimensionKind, DimensionResult)],
    ) -> Result<()>;

    /// Persisted dimension rows of one kind, ascending by score.
    async fn dimension_rows(
        &self,
        org: &OrgId,
        user: &UserId,
        kind: DimensionKind,
    ) -> Result<Vec<DimensionResult>>;

    // === Org directory ===

    /// All organization ids.
    async fn list_orgs(&self) -> Result<Vec<OrgId>>;

    /// Members of an org holding any of the given roles.
    async fn org_members(&self, org: &OrgId, roles: &[Role]) -> Result<Vec<Member>>;

    /// A user's notification preferences, if a row exists.
    async fn notification_preference(
        &self,
        org: &OrgId,
        user: &UserId,
    ) -> Result<Option<NotificationPrefs>>;

    /// Whether a scenario still exists.
    async fn scenario_exists(&self, scenario: &ScenarioId) -> Result<bool>;

    // === Audit log ===

    /// Append an agent activity record.
    async fn record_activity(&self, record: &ActivityRecord) -> Result<()>;
}

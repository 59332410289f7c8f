//! Scored training attempts.

use serde::{Deserialize, Serialize};

use crate::id::{AttemptId, OrgId, UserId};
use crate::Time;

/// Lifecycle state of a training attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The session is still running or awaiting scoring.
    InProgress,
    /// The session finished and was scored.
    Completed,
    /// The session was abandoned before scoring.
    Abandoned,
}

/// A completed training session record.
///
/// Attempts are produced by an external scoring process and are immutable
/// once scored; this pipeline only ever reads them. `breakdown` holds the
/// raw per-dimension sub-scores: a JSON object mapping dimension name to
/// either a plain 0-100 number or an object carrying a numeric
/// `percentage` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// Identifier assigned by the host platform.
    pub id: AttemptId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Owning user.
    pub user_id: UserId,
    /// Overall score (0-100) when scoring produced one.
    pub score: Option<f64>,
    /// Raw per-dimension sub-score mapping.
    pub breakdown: serde_json::Value,
    /// When the session started.
    pub started_at: Time,
    /// Lifecycle state.
    pub status: AttemptStatus,
}

impl Attempt {
    /// Build a completed attempt. Used by seeds and tests; real attempts
    /// arrive from the host platform's scoring process.
    pub fn completed(
        org_id: OrgId,
        user_id: UserId,
        score: Option<f64>,
        breakdown: serde_json::Value,
        started_at: Time,
    ) -> Self {
        Self {
            id: AttemptId::new(ulid::Ulid::new().to_string()),
            org_id,
            user_id,
            score,
            breakdown,
            started_at,
            status: AttemptStatus::Completed,
        }
    }
}

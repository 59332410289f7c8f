//! Agent activity audit records.

use serde::{Deserialize, Serialize};

use crate::id::{ActivityId, OrgId, UserId};
use crate::Time;

/// One audit log entry describing something an agent did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Unique id of the entry.
    pub id: ActivityId,
    /// Organization scope.
    pub org_id: OrgId,
    /// User the action concerned, when user-scoped.
    pub user_id: Option<UserId>,
    /// Agent that acted, e.g. `coach-agent`.
    pub agent_id: String,
    /// Event (or cron) that triggered the action.
    pub event_type: String,
    /// What the agent did, e.g. `update_weakness_profile`.
    pub action: String,
    /// Structured details for operators.
    pub details: serde_json::Value,
    /// When the action happened.
    pub at: Time,
}

impl ActivityRecord {
    /// Build a record stamped now.
    pub fn new(
        org_id: OrgId,
        user_id: Option<UserId>,
        agent_id: impl Into<String>,
        event_type: impl Into<String>,
        action: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: ActivityId::new(),
            org_id,
            user_id,
            agent_id: agent_id.into(),
            event_type: event_type.into(),
            action: action.into(),
            details,
            at: chrono::Utc::now(),
        }
    }
}

//! Notification contracts consumed by the dispatcher.

use serde::{Deserialize, Serialize};

use crate::id::{NotificationId, OrgId, UserId};

/// Category of an outbound notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Coach suggested a scenario or drill.
    CoachRecommendation,
    /// Nudge to get back to practicing.
    PracticeReminder,
    /// Daily progress digest.
    DailyDigest,
    /// Weekly manager insight.
    WeeklyInsight,
}

/// Everything the notification sender needs for one delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Recipient user.
    pub user_id: UserId,
    /// Recipient's organization.
    pub org_id: OrgId,
    /// Agent that produced the notification.
    pub agent_id: String,
    /// Category.
    pub kind: NotificationKind,
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Where the notification should take the recipient.
    pub action_url: String,
    /// Email address for the optional email leg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,
    /// Display name for the optional email leg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
    /// Structured details for downstream display.
    pub metadata: serde_json::Value,
}

/// What the sender reports back after a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationReceipt {
    /// Id of the stored notification.
    pub notification_id: NotificationId,
    /// Whether an email leg went out alongside the in-app record.
    pub email_sent: bool,
}

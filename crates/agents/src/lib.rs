//! Agent handlers for the coaching pipeline.
//!
//! Two event-triggered coach pipelines (attempt scored, user inactive),
//! the daily digest generator and its cron, the inactivity-detection cron,
//! the notification dispatcher, and the weekly manager analysis cron.

pub mod coach;
pub mod dispatch;
pub mod manager;
pub mod notify;

/// Agent id stamped on coach-side activity and notifications.
pub const AGENT_COACH: &str = "coach-agent";

/// Agent id stamped on manager-side activity and notifications.
pub const AGENT_MANAGER: &str = "manager-intelligence";

#[cfg(test)]
pub(crate) mod testutil;

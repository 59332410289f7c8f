//! RepCoach core data models.
//!
//! This crate defines the domain types shared by the coaching pipeline:
//! attempts, weakness profiles, digests, the typed event vocabulary, and
//! the configuration knobs the rest of the workspace reads.

#![warn(missing_docs)]

// Identities
mod id;

// Performance data
mod attempt;
mod pattern;
mod profile;

// Derived reports
mod digest;
mod insight;

// Pipeline plumbing
mod activity;
mod config;
mod event;
mod notify;

/// Timestamp type used across the workspace.
pub type Time = chrono::DateTime<chrono::Utc>;

// Identities
pub use id::{ActivityId, AttemptId, NotificationId, OrgId, ScenarioId, UserId};

// Performance data
pub use attempt::{Attempt, AttemptStatus};
pub use pattern::PracticePattern;
pub use profile::{dimension_label, DimensionKind, DimensionResult, Trend};

// Derived reports
pub use digest::{DigestSummary, DigestTrend, DimensionDelta, TraineeDigest};
pub use insight::{
    AtRiskRep, InsightKind, InsightPriority, ManagerInsight, SystemicGap, TeamAnalysis,
    TeamStats, TopPerformer,
};

// Pipeline plumbing
pub use activity::ActivityRecord;
pub use config::CoachConfig;
pub use event::{CoachEvent, EventDecodeError, EventKind, RecommendationType};
pub use notify::{NotificationKind, NotificationReceipt, NotificationRequest};

//! Typed domain events flowing through the coaching pipeline.
//!
//! The event vocabulary is a closed tagged union: unknown event names or
//! recommendation types are a decode failure at the bus boundary, not a
//! runtime default branch.

use serde::{Deserialize, Serialize};

use crate::id::{AttemptId, OrgId, ScenarioId, UserId};
use crate::profile::{DimensionResult, Trend};

/// The registered event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A training attempt finished scoring.
    AttemptScored,
    /// A trainee went quiet for several days.
    UserInactive,
    /// The coach regenerated a trainee's weakness profile.
    WeaknessUpdated,
    /// The coach produced a recommendation for dispatch.
    RecommendationReady,
}

impl EventKind {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::AttemptScored => "attempt.scored",
            EventKind::UserInactive => "user.inactive",
            EventKind::WeaknessUpdated => "coach.weakness.updated",
            EventKind::RecommendationReady => "coach.recommendation.ready",
        }
    }

    /// Parse a wire name back into a kind.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "attempt.scored" => Some(EventKind::AttemptScored),
            "user.inactive" => Some(EventKind::UserInactive),
            "coach.weakness.updated" => Some(EventKind::WeaknessUpdated),
            "coach.recommendation.ready" => Some(EventKind::RecommendationReady),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a coach recommendation asks the trainee to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    /// Try a specific scenario next.
    NextScenario,
    /// Generic nudge to get back to practicing.
    PracticeReminder,
    /// Re-run a drill for a skill that slipped.
    ReviewDrill,
    /// The daily progress digest.
    DailyDigest,
}

impl RecommendationType {
    /// Wire name of the recommendation type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::NextScenario => "next_scenario",
            RecommendationType::PracticeReminder => "practice_reminder",
            RecommendationType::ReviewDrill => "review_drill",
            RecommendationType::DailyDigest => "daily_digest",
        }
    }

    /// Parse a wire name back into a recommendation type.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "next_scenario" => Some(RecommendationType::NextScenario),
            "practice_reminder" => Some(RecommendationType::PracticeReminder),
            "review_drill" => Some(RecommendationType::ReviewDrill),
            "daily_digest" => Some(RecommendationType::DailyDigest),
            _ => None,
        }
    }
}

/// Why an incoming event payload could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum EventDecodeError {
    /// The event name is not in the registry.
    #[error("unknown event name `{0}`")]
    UnknownEvent(String),

    /// A recommendation event carried an unregistered type.
    #[error("unknown recommendation type `{0}`")]
    UnknownRecommendationType(String),

    /// The payload did not match the event's schema.
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A typed domain event.
///
/// Serializes to the wire shape `{"name": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data")]
pub enum CoachEvent {
    /// `attempt.scored`: an attempt finished scoring.
    #[serde(rename = "attempt.scored")]
    AttemptScored {
        /// Owning organization.
        org_id: OrgId,
        /// Owning user.
        user_id: UserId,
        /// The attempt that was scored.
        attempt_id: AttemptId,
    },

    /// `user.inactive`: a trainee has not practiced recently.
    #[serde(rename = "user.inactive")]
    UserInactive {
        /// Owning organization.
        org_id: OrgId,
        /// The quiet trainee.
        user_id: UserId,
        /// Whole days since their last completed attempt.
        days_since_last_attempt: i64,
    },

    /// `coach.weakness.updated`: a fresh profile was computed.
    #[serde(rename = "coach.weakness.updated")]
    WeaknessUpdated {
        /// The trainee whose profile changed.
        user_id: UserId,
        /// Owning organization.
        org_id: OrgId,
        /// Dimensions below the weakness threshold, weakest first.
        weaknesses: Vec<DimensionResult>,
        /// Dimensions at or above the threshold.
        strengths: Vec<DimensionResult>,
        /// Overall direction across the profile.
        trajectory: Trend,
    },

    /// `coach.recommendation.ready`: a recommendation awaits dispatch.
    #[serde(rename = "coach.recommendation.ready")]
    RecommendationReady {
        /// The trainee to notify.
        user_id: UserId,
        /// Owning organization.
        org_id: OrgId,
        /// What kind of recommendation this is.
        recommendation: RecommendationType,
        /// Human-readable recommendation text.
        message: String,
        /// Scenario the recommendation points at, when it has one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scenario_id: Option<ScenarioId>,
    },
}

impl CoachEvent {
    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            CoachEvent::AttemptScored { .. } => EventKind::AttemptScored,
            CoachEvent::UserInactive { .. } => EventKind::UserInactive,
            CoachEvent::WeaknessUpdated { .. } => EventKind::WeaknessUpdated,
            CoachEvent::RecommendationReady { .. } => EventKind::RecommendationReady,
        }
    }

    /// Organization the event is scoped to.
    pub fn org_id(&self) -> &OrgId {
        match self {
            CoachEvent::AttemptScored { org_id, .. }
            | CoachEvent::UserInactive { org_id, .. }
            | CoachEvent::WeaknessUpdated { org_id, .. }
            | CoachEvent::RecommendationReady { org_id, .. } => org_id,
        }
    }

    /// Decode an external `(name, payload)` pair into a typed event.
    ///
    /// Unknown names and unknown recommendation types get their own error
    /// variants so the bus can soft-fail them precisely.
    pub fn decode(name: &str, data: serde_json::Value) -> Result<Self, EventDecodeError> {
        let kind = EventKind::parse(name)
            .ok_or_else(|| EventDecodeError::UnknownEvent(name.to_string()))?;

        if kind == EventKind::RecommendationReady {
            if let Some(raw) = data.get("recommendation").and_then(|v| v.as_str()) {
                if RecommendationType::parse(raw).is_none() {
                    return Err(EventDecodeError::UnknownRecommendationType(raw.to_string()));
                }
            }
        }

        let wire = serde_json::json!({ "name": name, "data": data });
        Ok(serde_json::from_value(wire)?)
    }
}

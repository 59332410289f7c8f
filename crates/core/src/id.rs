//! Unique identifiers for RepCoach entities.
//!
//! Org, user, attempt, and scenario ids are assigned by the host platform
//! and treated as opaque strings. Ids for records this pipeline creates
//! (notifications, activity log entries) are ULIDs.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! opaque_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an externally assigned identifier.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// View as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Identifier for a tenant organization.
    OrgId
);
opaque_id!(
    /// Identifier for a platform user (trainee or manager).
    UserId
);
opaque_id!(
    /// Identifier for a scored training attempt.
    AttemptId
);
opaque_id!(
    /// Identifier for a training scenario.
    ScenarioId
);

/// Unique identifier for a dispatched notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(Ulid);

impl NotificationId {
    /// Generate a new NotificationId.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for an agent activity log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityId(Ulid);

impl ActivityId {
    /// Generate a new ActivityId.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActivityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

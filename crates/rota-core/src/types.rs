use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Accepts both `"123"` and `123` so hand-edited files with bare numeric ids load.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into_string()))
            }
        }
    };
}

opaque_id!(
    /// Identifier of the privilege being rotated, as known to the external service.
    RoleId
);

opaque_id!(
    /// Identifier of a roster participant, as known to the external service.
    ParticipantId
);

impl RoleId {
    /// Placeholder written into freshly materialized configs.
    pub const UNSET: &'static str = "0";

    pub fn unset() -> Self {
        Self(Self::UNSET.to_string())
    }

    pub fn is_unset(&self) -> bool {
        self.0 == Self::UNSET
    }
}

// ---------------------------------------------------------------------------
// EngineState
// ---------------------------------------------------------------------------

/// Lifecycle of a rotation engine. Only a load moves an engine out of
/// `Unloaded` or `Invalid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineState {
    Unloaded,
    Loading,
    Configured,
    Invalid { reason: InvalidReason },
}

impl EngineState {
    pub fn is_configured(&self) -> bool {
        matches!(self, EngineState::Configured)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Unloaded => f.write_str("unloaded"),
            EngineState::Loading => f.write_str("loading"),
            EngineState::Configured => f.write_str("configured"),
            EngineState::Invalid { reason } => write!(f, "invalid: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidReason {
    EmptyRoster,
    IndexOutOfRange { index: usize, len: usize },
    UnresolvedParticipants { ids: Vec<ParticipantId> },
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::EmptyRoster => f.write_str("roster is empty"),
            InvalidReason::IndexOutOfRange { index, len } => {
                write!(f, "index {index} is out of range for a roster of {len}")
            }
            InvalidReason::UnresolvedParticipants { ids } => {
                let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
                write!(f, "participants could not be resolved: {}", ids.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_bare_numbers() {
        let id: ParticipantId = serde_yaml::from_str("123456789012345678").unwrap();
        assert_eq!(id.as_str(), "123456789012345678");
        let role: RoleId = serde_yaml::from_str("'42'").unwrap();
        assert_eq!(role, RoleId::from("42"));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&ParticipantId::from("7")).unwrap();
        assert_eq!(json, "\"7\"");
    }

    #[test]
    fn unset_role_sentinel() {
        assert!(RoleId::unset().is_unset());
        assert!(!RoleId::from("99").is_unset());
    }

    #[test]
    fn invalid_state_display_names_reason() {
        let state = EngineState::Invalid {
            reason: InvalidReason::IndexOutOfRange { index: 4, len: 2 },
        };
        assert_eq!(
            state.to_string(),
            "invalid: index 4 is out of range for a roster of 2"
        );
    }
}

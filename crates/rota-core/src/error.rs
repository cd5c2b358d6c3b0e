use crate::types::{ParticipantId, RoleId};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RotaError {
    #[error("no rotation config at {} (a default is written on load; set role_id and roster, then reload)", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("malformed config: missing keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("malformed config: {0}")]
    MalformedConfig(String),

    #[error("insufficient permission to manage {0}")]
    Permission(String),

    #[error("role not found: {0}")]
    RoleNotFound(RoleId),

    #[error("participant cannot be resolved: {0}")]
    UnresolvableParticipant(ParticipantId),

    #[error("role service unavailable: {0}")]
    Transient(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("rotation is not configured ({0}): fix the config and reload")]
    NotConfigured(String),

    #[error("participant already in the rotation: {0}")]
    DuplicateMember(ParticipantId),

    #[error("participant not in the rotation: {0}")]
    MemberNotFound(ParticipantId),

    #[error("failed to grant the duty role to {participant}: {reason}")]
    GrantFailed {
        participant: ParticipantId,
        reason: String,
    },

    #[error("background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RotaError>;

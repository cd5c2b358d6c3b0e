//! Role assignment capability consumed by the rotation engine.
//!
//! The engine never touches the external service directly: every lookup,
//! grant and revoke goes through a [`RoleAdapter`]. Each call is independently
//! fallible and the engine acts only on the result it observes.

pub mod memory;

use crate::types::{ParticipantId, RoleId};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// A resolved role, as seen by the external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleHandle {
    pub id: RoleId,
    pub name: String,
}

/// A resolved participant, as seen by the external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantHandle {
    pub id: ParticipantId,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("transient failure: {0}")]
    Transient(String),
}

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

#[async_trait]
pub trait RoleAdapter: Send + Sync {
    async fn resolve_role(&self, role_id: &RoleId) -> AdapterResult<RoleHandle>;

    async fn resolve_participant(
        &self,
        participant_id: &ParticipantId,
    ) -> AdapterResult<ParticipantHandle>;

    /// Whether the caller is allowed to grant and revoke `role`.
    async fn caller_can_manage(&self, role: &RoleHandle) -> AdapterResult<bool>;

    async fn grant(&self, role: &RoleHandle, participant: &ParticipantHandle) -> AdapterResult<()>;

    async fn revoke(&self, role: &RoleHandle, participant: &ParticipantHandle)
        -> AdapterResult<()>;

    async fn currently_holds(
        &self,
        participant: &ParticipantHandle,
        role: &RoleHandle,
    ) -> AdapterResult<bool>;
}

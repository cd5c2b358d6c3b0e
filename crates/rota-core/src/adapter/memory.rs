//! In-memory [`RoleAdapter`] for tests and dry runs.
//!
//! Keeps a table of known roles and participants, the current holders of each
//! role, and a log of every grant/revoke call. Failures can be injected per
//! participant to exercise degraded paths.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{AdapterError, AdapterResult, ParticipantHandle, RoleAdapter, RoleHandle};
use crate::types::{ParticipantId, RoleId};

/// One recorded side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    Grant(ParticipantId),
    Revoke(ParticipantId),
}

#[derive(Debug, Default)]
struct MemoryState {
    permissive: bool,
    roles: HashMap<RoleId, (String, bool)>,
    participants: HashMap<ParticipantId, String>,
    holders: HashMap<RoleId, BTreeSet<ParticipantId>>,
    calls: Vec<AdapterCall>,
    grant_failures: HashMap<ParticipantId, AdapterError>,
    revoke_failures: HashMap<ParticipantId, AdapterError>,
    resolve_failures: HashMap<ParticipantId, AdapterError>,
}

#[derive(Debug, Default)]
pub struct MemoryRoleAdapter {
    state: Mutex<MemoryState>,
}

impl MemoryRoleAdapter {
    /// An empty adapter: nothing resolves until registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves any role or participant id and lets every call succeed.
    pub fn permissive() -> Self {
        let adapter = Self::default();
        adapter.lock().permissive = true;
        adapter
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a role the caller may manage.
    pub fn with_role(self, id: impl Into<RoleId>, name: &str) -> Self {
        self.lock().roles.insert(id.into(), (name.to_string(), true));
        self
    }

    pub fn with_participant(self, id: impl Into<ParticipantId>, name: &str) -> Self {
        self.add_participant(id, name);
        self
    }

    pub fn add_participant(&self, id: impl Into<ParticipantId>, name: &str) {
        self.lock().participants.insert(id.into(), name.to_string());
    }

    /// Forget a participant, as if they left the service.
    pub fn remove_participant(&self, id: &ParticipantId) {
        let mut state = self.lock();
        state.participants.remove(id);
        for holders in state.holders.values_mut() {
            holders.remove(id);
        }
    }

    pub fn set_manageable(&self, role: &RoleId, manageable: bool) {
        if let Some(entry) = self.lock().roles.get_mut(role) {
            entry.1 = manageable;
        }
    }

    /// Mark `participant` as holding `role` without recording a call.
    pub fn set_holding(&self, role: &RoleId, participant: &ParticipantId) {
        self.lock()
            .holders
            .entry(role.clone())
            .or_default()
            .insert(participant.clone());
    }

    pub fn holders(&self, role: &RoleId) -> Vec<ParticipantId> {
        self.lock()
            .holders
            .get(role)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn fail_grant(&self, participant: impl Into<ParticipantId>, err: AdapterError) {
        self.lock().grant_failures.insert(participant.into(), err);
    }

    pub fn fail_revoke(&self, participant: impl Into<ParticipantId>, err: AdapterError) {
        self.lock().revoke_failures.insert(participant.into(), err);
    }

    pub fn fail_resolve(&self, participant: impl Into<ParticipantId>, err: AdapterError) {
        self.lock().resolve_failures.insert(participant.into(), err);
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.grant_failures.clear();
        state.revoke_failures.clear();
        state.resolve_failures.clear();
    }
}

#[async_trait]
impl RoleAdapter for MemoryRoleAdapter {
    async fn resolve_role(&self, role_id: &RoleId) -> AdapterResult<RoleHandle> {
        let state = self.lock();
        match state.roles.get(role_id) {
            Some((name, _)) => Ok(RoleHandle {
                id: role_id.clone(),
                name: name.clone(),
            }),
            None if state.permissive => Ok(RoleHandle {
                id: role_id.clone(),
                name: role_id.to_string(),
            }),
            None => Err(AdapterError::NotFound(format!("role {role_id}"))),
        }
    }

    async fn resolve_participant(
        &self,
        participant_id: &ParticipantId,
    ) -> AdapterResult<ParticipantHandle> {
        let state = self.lock();
        if let Some(err) = state.resolve_failures.get(participant_id) {
            return Err(err.clone());
        }
        match state.participants.get(participant_id) {
            Some(name) => Ok(ParticipantHandle {
                id: participant_id.clone(),
                display_name: name.clone(),
            }),
            None if state.permissive => Ok(ParticipantHandle {
                id: participant_id.clone(),
                display_name: participant_id.to_string(),
            }),
            None => Err(AdapterError::NotFound(format!(
                "participant {participant_id}"
            ))),
        }
    }

    async fn caller_can_manage(&self, role: &RoleHandle) -> AdapterResult<bool> {
        let state = self.lock();
        Ok(state
            .roles
            .get(&role.id)
            .map(|(_, manageable)| *manageable)
            .unwrap_or(state.permissive))
    }

    async fn grant(&self, role: &RoleHandle, participant: &ParticipantHandle) -> AdapterResult<()> {
        let mut state = self.lock();
        state.calls.push(AdapterCall::Grant(participant.id.clone()));
        if let Some(err) = state.grant_failures.get(&participant.id) {
            return Err(err.clone());
        }
        state
            .holders
            .entry(role.id.clone())
            .or_default()
            .insert(participant.id.clone());
        Ok(())
    }

    async fn revoke(
        &self,
        role: &RoleHandle,
        participant: &ParticipantHandle,
    ) -> AdapterResult<()> {
        let mut state = self.lock();
        state.calls.push(AdapterCall::Revoke(participant.id.clone()));
        if let Some(err) = state.revoke_failures.get(&participant.id) {
            return Err(err.clone());
        }
        if let Some(holders) = state.holders.get_mut(&role.id) {
            holders.remove(&participant.id);
        }
        Ok(())
    }

    async fn currently_holds(
        &self,
        participant: &ParticipantHandle,
        role: &RoleHandle,
    ) -> AdapterResult<bool> {
        let state = self.lock();
        Ok(state
            .holders
            .get(&role.id)
            .is_some_and(|h| h.contains(&participant.id)))
    }
}

//! The rotation engine: owns the roster, the on-duty index, the resolved role
//! and the schedule, and is the only writer of the rotation file.
//!
//! Every mutating operation holds one async mutex for its whole duration,
//! remote calls included, so a scheduled rotation and a manual command can
//! never interleave. Status reads go through a `watch` snapshot and never wait
//! on that lock.
//!
//! Each public mutation runs on its own task. A caller that gives up (a
//! dropped HTTP request, a timeout) leaves the mutation running to completion.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::adapter::{AdapterError, ParticipantHandle, RoleAdapter, RoleHandle};
use crate::config::{ConfigStore, RotationConfig, Schedule};
use crate::error::{Result, RotaError};
use crate::scheduler::Scheduler;
use crate::types::{EngineState, InvalidReason, ParticipantId, RoleId};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// A revoke that did not go through. Collected, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevokeFailure {
    pub participant: ParticipantId,
    pub reason: String,
}

/// Result of a rotation or an index jump whose grant succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationOutcome {
    pub previous_index: usize,
    pub index: usize,
    pub on_duty: ParticipantId,
    pub revoke_failures: Vec<RevokeFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexUpdate {
    /// Index written straight to storage; a reload is needed to pick it up.
    Forced { index: usize },
    Assigned(RotationOutcome),
}

// ---------------------------------------------------------------------------
// Status snapshot
// ---------------------------------------------------------------------------

/// Best-effort view of the engine, readable without the mutation lock.
#[derive(Debug, Clone, Serialize)]
pub struct RotationStatus {
    pub state: EngineState,
    pub role: Option<RoleHandle>,
    pub schedule: Option<Schedule>,
    pub index: Option<usize>,
    pub on_duty: Option<ParticipantHandle>,
    pub roster: Vec<ParticipantHandle>,
    pub next_rotation: Option<DateTime<Local>>,
}

impl RotationStatus {
    fn unloaded() -> Self {
        Self {
            state: EngineState::Unloaded,
            role: None,
            schedule: None,
            index: None,
            on_duty: None,
            roster: Vec::new(),
            next_rotation: None,
        }
    }
}

impl fmt::Display for RotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "State: {}", self.state)?;
        let Some(role) = &self.role else {
            return Ok(());
        };
        writeln!(f, "Role: {} ({})", role.name, role.id)?;
        if let Some(schedule) = &self.schedule {
            writeln!(f, "Schedule: {schedule}")?;
        }
        if let Some(next) = &self.next_rotation {
            writeln!(f, "Next rotation: {}", next.format("%Y-%m-%d %H:%M %Z"))?;
        }
        if let Some(index) = self.index {
            writeln!(f, "Current index: {index}")?;
        }
        match &self.on_duty {
            Some(p) => writeln!(f, "On duty: {}", p.display_name)?,
            None => writeln!(f, "On duty: none")?,
        }
        let names: Vec<&str> = self
            .roster
            .iter()
            .map(|p| p.display_name.as_str())
            .collect();
        write!(f, "Roster: [{}]", names.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Runtime state
// ---------------------------------------------------------------------------

/// Everything a successful load produced. `members` is parallel to
/// `config.roster`.
struct Loaded {
    config: RotationConfig,
    role: RoleHandle,
    members: Vec<ParticipantHandle>,
    unresolved: Vec<ParticipantId>,
}

impl Loaded {
    fn evaluate(&self) -> EngineState {
        let len = self.config.roster.len();
        let reason = if !self.unresolved.is_empty() {
            InvalidReason::UnresolvedParticipants {
                ids: self.unresolved.clone(),
            }
        } else if len == 0 {
            InvalidReason::EmptyRoster
        } else if self.config.index >= len {
            InvalidReason::IndexOutOfRange {
                index: self.config.index,
                len,
            }
        } else {
            return EngineState::Configured;
        };
        EngineState::Invalid { reason }
    }

    fn on_duty(&self) -> &ParticipantHandle {
        &self.members[self.config.index]
    }
}

struct Runtime {
    state: EngineState,
    loaded: Option<Loaded>,
}

impl Runtime {
    fn loaded_mut(&mut self) -> Result<&mut Loaded> {
        match self.loaded.as_mut() {
            Some(loaded) if self.state != EngineState::Loading => Ok(loaded),
            _ => Err(RotaError::NotConfigured(self.state.to_string())),
        }
    }

    fn configured_mut(&mut self) -> Result<&mut Loaded> {
        if !self.state.is_configured() {
            return Err(RotaError::NotConfigured(self.state.to_string()));
        }
        self.loaded_mut()
    }

    fn refresh_state(&mut self) {
        if let Some(loaded) = &self.loaded {
            self.state = loaded.evaluate();
        }
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn role_error(id: &RoleId, err: AdapterError) -> RotaError {
    match err {
        AdapterError::NotFound(_) => RotaError::RoleNotFound(id.clone()),
        AdapterError::Forbidden(msg) => RotaError::Permission(format!("role {id}: {msg}")),
        AdapterError::Transient(msg) => RotaError::Transient(msg),
    }
}

fn participant_error(id: &ParticipantId, err: AdapterError) -> RotaError {
    match err {
        AdapterError::NotFound(_) => RotaError::UnresolvableParticipant(id.clone()),
        AdapterError::Forbidden(msg) => {
            RotaError::Permission(format!("participant {id}: {msg}"))
        }
        AdapterError::Transient(msg) => RotaError::Transient(msg),
    }
}

// ---------------------------------------------------------------------------
// RotationEngine
// ---------------------------------------------------------------------------

pub struct RotationEngine {
    store: ConfigStore,
    adapter: Arc<dyn RoleAdapter>,
    runtime: Mutex<Runtime>,
    status: watch::Sender<RotationStatus>,
    scheduler: Scheduler,
    this: Weak<RotationEngine>,
}

impl RotationEngine {
    /// Create an unloaded engine. Nothing is read until [`load`](Self::load).
    pub fn new(store: ConfigStore, adapter: Arc<dyn RoleAdapter>) -> Arc<Self> {
        let (status, _) = watch::channel(RotationStatus::unloaded());
        Arc::new_cyclic(|this| Self {
            store,
            adapter,
            runtime: Mutex::new(Runtime {
                state: EngineState::Unloaded,
                loaded: None,
            }),
            status,
            scheduler: Scheduler::new(),
            this: this.clone(),
        })
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Introspection (lock-free)
    // -----------------------------------------------------------------------

    pub fn status(&self) -> RotationStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> EngineState {
        self.status.borrow().state.clone()
    }

    pub fn current_holder(&self) -> Option<ParticipantHandle> {
        self.status.borrow().on_duty.clone()
    }

    /// Receive a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<RotationStatus> {
        self.status.subscribe()
    }

    fn publish(&self, rt: &Runtime) {
        let snapshot = match &rt.loaded {
            None => RotationStatus {
                state: rt.state.clone(),
                ..RotationStatus::unloaded()
            },
            Some(loaded) => {
                let index = loaded.config.index;
                RotationStatus {
                    state: rt.state.clone(),
                    role: Some(loaded.role.clone()),
                    schedule: Some(loaded.config.schedule),
                    index: Some(index),
                    on_duty: if rt.state.is_configured() {
                        loaded.members.get(index).cloned()
                    } else {
                        None
                    },
                    roster: loaded.members.clone(),
                    next_rotation: self.scheduler.next_fire(),
                }
            }
        };
        self.status.send_replace(snapshot);
    }

    // -----------------------------------------------------------------------
    // Persistence helpers
    // -----------------------------------------------------------------------

    async fn read_config(&self) -> Result<RotationConfig> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|e| RotaError::Task(e.to_string()))?
    }

    async fn persist(&self, config: &RotationConfig) -> Result<()> {
        let store = self.store.clone();
        let config = config.clone();
        tokio::task::spawn_blocking(move || store.save(&config))
            .await
            .map_err(|e| RotaError::Task(e.to_string()))?
    }

    fn arm_scheduler(&self, schedule: Schedule) {
        let this = self.this.clone();
        self.scheduler.arm(schedule, move || {
            let this = this.clone();
            async move {
                let Some(engine) = this.upgrade() else {
                    return;
                };
                match engine.rotate().await {
                    Ok(outcome) => info!(
                        on_duty = %outcome.on_duty,
                        index = outcome.index,
                        revoke_failures = outcome.revoke_failures.len(),
                        "scheduled rotation complete"
                    ),
                    Err(RotaError::NotConfigured(state)) => {
                        warn!(%state, "scheduled rotation skipped: not configured")
                    }
                    Err(e) => error!(error = %e, "scheduled rotation failed"),
                }
            }
        });
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    /// Run a mutation on its own task. Dropping the returned future does not
    /// stop the mutation: it runs to completion or failure and its result is
    /// discarded.
    async fn detached<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let engine = self
            .this
            .upgrade()
            .ok_or_else(|| RotaError::Task("engine is shutting down".to_string()))?;
        tokio::spawn(op(engine))
            .await
            .map_err(|e| RotaError::Task(e.to_string()))?
    }

    /// Read the rotation file and resolve everything it names.
    pub async fn load(&self) -> Result<EngineState> {
        self.detached(|engine| async move { engine.load_now().await })
            .await
    }

    pub async fn rotate(&self) -> Result<RotationOutcome> {
        self.detached(|engine| async move { engine.rotate_now().await })
            .await
    }

    pub async fn clear_role(&self) -> Result<Vec<RevokeFailure>> {
        self.detached(|engine| async move { engine.clear_role_now().await })
            .await
    }

    pub async fn add_member(&self, id: ParticipantId, position: Option<usize>) -> Result<usize> {
        self.detached(move |engine| async move { engine.add_member_now(id, position).await })
            .await
    }

    pub async fn remove_member(&self, id: &ParticipantId) -> Result<ParticipantId> {
        let id = id.clone();
        self.detached(move |engine| async move { engine.remove_member_now(&id).await })
            .await
    }

    pub async fn move_member(&self, id: &ParticipantId, new_position: usize) -> Result<()> {
        let id = id.clone();
        self.detached(move |engine| async move { engine.move_member_now(&id, new_position).await })
            .await
    }

    pub async fn set_index(&self, index: usize, force: bool) -> Result<IndexUpdate> {
        self.detached(move |engine| async move { engine.set_index_now(index, force).await })
            .await
    }

    pub async fn set_schedule(
        &self,
        day_of_week: Option<u8>,
        hour: Option<u8>,
        minute: Option<u8>,
    ) -> Result<Schedule> {
        self.detached(move |engine| async move {
            engine.set_schedule_now(day_of_week, hour, minute).await
        })
        .await
    }

    pub async fn refresh_members(&self) -> Result<Vec<ParticipantId>> {
        self.detached(|engine| async move { engine.refresh_members_now().await })
            .await
    }

    // -----------------------------------------------------------------------
    // load
    // -----------------------------------------------------------------------

    /// Read the rotation file and resolve everything it names.
    ///
    /// Either the engine ends in a new coherent state (`Configured`, or
    /// `Invalid` for recoverable conditions like an empty roster) and the
    /// scheduler is re-armed, or an error is returned and the previous state
    /// is kept as it was.
    async fn load_now(&self) -> Result<EngineState> {
        let mut rt = self.runtime.lock().await;
        let previous = std::mem::replace(&mut rt.state, EngineState::Loading);
        self.publish(&rt);

        match self.load_fresh().await {
            Ok(loaded) => {
                let schedule = loaded.config.schedule;
                rt.state = loaded.evaluate();
                rt.loaded = Some(loaded);
                self.arm_scheduler(schedule);
                self.publish(&rt);
                info!(state = %rt.state, %schedule, "rotation config loaded");
                Ok(rt.state.clone())
            }
            Err(e) => {
                rt.state = previous;
                self.publish(&rt);
                warn!(error = %e, "rotation config load failed");
                Err(e)
            }
        }
    }

    async fn load_fresh(&self) -> Result<Loaded> {
        let config = match self.read_config().await {
            Ok(config) => config,
            Err(RotaError::ConfigNotFound(path)) => {
                let store = self.store.clone();
                tokio::task::spawn_blocking(move || store.init_default(None, false))
                    .await
                    .map_err(|e| RotaError::Task(e.to_string()))??;
                warn!(path = %path.display(), "rotation config missing; wrote a default");
                return Err(RotaError::ConfigNotFound(path));
            }
            Err(e) => return Err(e),
        };

        let role = self
            .adapter
            .resolve_role(&config.role_id)
            .await
            .map_err(|e| role_error(&config.role_id, e))?;

        let can_manage = self
            .adapter
            .caller_can_manage(&role)
            .await
            .map_err(|e| role_error(&config.role_id, e))?;
        if !can_manage {
            return Err(RotaError::Permission(format!(
                "role '{}' ({})",
                role.name, role.id
            )));
        }

        let mut members = Vec::with_capacity(config.roster.len());
        for id in &config.roster {
            let member = self
                .adapter
                .resolve_participant(id)
                .await
                .map_err(|e| participant_error(id, e))?;
            members.push(member);
        }

        Ok(Loaded {
            config,
            role,
            members,
            unresolved: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // rotate / clear
    // -----------------------------------------------------------------------

    /// Revoke from every current holder in the roster, continuing past failures.
    async fn revoke_holders(&self, loaded: &Loaded) -> Vec<RevokeFailure> {
        let mut failures = Vec::new();
        for member in &loaded.members {
            let result = match self.adapter.currently_holds(member, &loaded.role).await {
                Ok(true) => self.adapter.revoke(&loaded.role, member).await,
                Ok(false) => Ok(()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(participant = %member.id, error = %e, "failed to revoke duty role");
                failures.push(RevokeFailure {
                    participant: member.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
        failures
    }

    /// Hand the role to the next participant in the roster.
    ///
    /// The index always advances, even when revokes fail. If the grant fails
    /// the advanced index is still persisted and `GrantFailed` is returned;
    /// nothing is rolled back.
    async fn rotate_now(&self) -> Result<RotationOutcome> {
        let mut rt = self.runtime.lock().await;
        let loaded = rt.configured_mut()?;

        let revoke_failures = self.revoke_holders(loaded).await;

        let mut next = loaded.config.clone();
        let previous_index = next.index;
        next.index = (previous_index + 1) % next.roster.len();
        let target = loaded.members[next.index].clone();
        let grant = self.adapter.grant(&loaded.role, &target).await;

        self.persist(&next).await?;
        loaded.config = next;
        let index = loaded.config.index;
        self.publish(&rt);

        match grant {
            Ok(()) => {
                info!(participant = %target.id, index, "duty role rotated");
                Ok(RotationOutcome {
                    previous_index,
                    index,
                    on_duty: target.id,
                    revoke_failures,
                })
            }
            Err(e) => {
                error!(participant = %target.id, index, error = %e, "duty role grant failed");
                Err(RotaError::GrantFailed {
                    participant: target.id,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Revoke the role from every roster participant holding it. The index
    /// does not move.
    async fn clear_role_now(&self) -> Result<Vec<RevokeFailure>> {
        let mut rt = self.runtime.lock().await;
        let loaded = rt.configured_mut()?;
        let failures = self.revoke_holders(loaded).await;
        info!(failures = failures.len(), "duty role cleared");
        Ok(failures)
    }

    // -----------------------------------------------------------------------
    // Roster mutations
    // -----------------------------------------------------------------------

    /// Insert a participant at `position` (default: the end). Allowed while
    /// `Invalid` so an empty roster can be repaired.
    async fn add_member_now(&self, id: ParticipantId, position: Option<usize>) -> Result<usize> {
        let mut rt = self.runtime.lock().await;
        let loaded = rt.loaded_mut()?;

        if loaded.config.position_of(&id).is_some() {
            return Err(RotaError::DuplicateMember(id));
        }
        let len = loaded.config.roster.len();
        let at = position.unwrap_or(len);
        if at > len {
            return Err(RotaError::InvariantViolation(format!(
                "position {at} is past the end of a roster of {len}"
            )));
        }

        let member = self
            .adapter
            .resolve_participant(&id)
            .await
            .map_err(|e| participant_error(&id, e))?;

        let mut next = loaded.config.clone();
        next.roster.insert(at, id.clone());
        if len == 0 {
            next.index = 0;
        } else if at <= next.index {
            next.index += 1;
        }

        self.persist(&next).await?;
        loaded.config = next;
        loaded.members.insert(at, member);
        rt.refresh_state();
        self.publish(&rt);
        info!(participant = %id, position = at, state = %rt.state, "participant added");
        Ok(at)
    }

    /// Remove a participant who is not currently on duty.
    async fn remove_member_now(&self, id: &ParticipantId) -> Result<ParticipantId> {
        let mut rt = self.runtime.lock().await;
        let loaded = rt.configured_mut()?;

        let pos = loaded
            .config
            .position_of(id)
            .ok_or_else(|| RotaError::MemberNotFound(id.clone()))?;
        if pos == loaded.config.index {
            return Err(RotaError::InvariantViolation(format!(
                "{id} is on duty and cannot be removed; move the duty to someone else first"
            )));
        }

        let mut next = loaded.config.clone();
        let removed = next.roster.remove(pos);
        if pos < next.index {
            next.index -= 1;
        }

        self.persist(&next).await?;
        loaded.config = next;
        loaded.members.remove(pos);
        rt.refresh_state();
        self.publish(&rt);
        info!(participant = %removed, position = pos, "participant removed");
        Ok(removed)
    }

    /// Move a participant to `new_position`, keeping the index on whoever is
    /// on duty.
    async fn move_member_now(&self, id: &ParticipantId, new_position: usize) -> Result<()> {
        let mut rt = self.runtime.lock().await;
        let loaded = rt.configured_mut()?;

        let from = loaded
            .config
            .position_of(id)
            .ok_or_else(|| RotaError::MemberNotFound(id.clone()))?;
        let len = loaded.config.roster.len();
        if new_position >= len {
            return Err(RotaError::InvariantViolation(format!(
                "position {new_position} is outside 0..{len}"
            )));
        }
        if from == new_position {
            return Ok(());
        }

        let on_duty = loaded.on_duty().id.clone();
        let mut next = loaded.config.clone();
        let entry = next.roster.remove(from);
        next.roster.insert(new_position, entry);
        next.index = next
            .position_of(&on_duty)
            .ok_or_else(|| RotaError::InvariantViolation(format!("lost track of {on_duty}")))?;

        self.persist(&next).await?;
        loaded.config = next;
        let member = loaded.members.remove(from);
        loaded.members.insert(new_position, member);
        let index = loaded.config.index;
        self.publish(&rt);
        info!(participant = %id, from, to = new_position, index, "participant moved");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Index and schedule
    // -----------------------------------------------------------------------

    /// Jump the duty to `roster[index]`.
    ///
    /// With `force`, the index is written straight to storage without any
    /// grant or revoke and regardless of state; call [`load`](Self::load)
    /// afterwards to pick it up.
    async fn set_index_now(&self, index: usize, force: bool) -> Result<IndexUpdate> {
        let mut rt = self.runtime.lock().await;

        if force {
            let store = self.store.clone();
            tokio::task::spawn_blocking(move || store.write_index(index))
                .await
                .map_err(|e| RotaError::Task(e.to_string()))??;
            warn!(index, "index forced in storage; reload required");
            return Ok(IndexUpdate::Forced { index });
        }

        let loaded = rt.configured_mut()?;
        let len = loaded.config.roster.len();
        if index >= len {
            return Err(RotaError::InvariantViolation(format!(
                "index {index} is outside 0..{len}"
            )));
        }

        let previous_index = loaded.config.index;
        let mut revoke_failures = Vec::new();
        if index != previous_index {
            let old = loaded.on_duty();
            let result = match self.adapter.currently_holds(old, &loaded.role).await {
                Ok(true) => self.adapter.revoke(&loaded.role, old).await,
                Ok(false) => Ok(()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(participant = %old.id, error = %e, "failed to revoke duty role");
                revoke_failures.push(RevokeFailure {
                    participant: old.id.clone(),
                    reason: e.to_string(),
                });
            }
        }

        let target = loaded.members[index].clone();
        let grant = self.adapter.grant(&loaded.role, &target).await;

        let mut next = loaded.config.clone();
        next.index = index;
        self.persist(&next).await?;
        loaded.config = next;
        self.publish(&rt);

        match grant {
            Ok(()) => {
                info!(participant = %target.id, index, "duty role assigned");
                Ok(IndexUpdate::Assigned(RotationOutcome {
                    previous_index,
                    index,
                    on_duty: target.id,
                    revoke_failures,
                }))
            }
            Err(e) => Err(RotaError::GrantFailed {
                participant: target.id,
                reason: e.to_string(),
            }),
        }
    }

    /// Change any of day, hour and minute, persist, and re-arm the scheduler.
    async fn set_schedule_now(
        &self,
        day_of_week: Option<u8>,
        hour: Option<u8>,
        minute: Option<u8>,
    ) -> Result<Schedule> {
        let mut rt = self.runtime.lock().await;
        let loaded = rt.configured_mut()?;

        let schedule = loaded.config.schedule.merge(day_of_week, hour, minute)?;
        let mut next = loaded.config.clone();
        next.schedule = schedule;

        self.persist(&next).await?;
        loaded.config = next;
        self.arm_scheduler(schedule);
        self.publish(&rt);
        info!(%schedule, "rotation schedule updated");
        Ok(schedule)
    }

    // -----------------------------------------------------------------------
    // refresh
    // -----------------------------------------------------------------------

    /// Re-resolve every roster participant. Participants the service no
    /// longer knows put the engine into `Invalid` until the next load.
    async fn refresh_members_now(&self) -> Result<Vec<ParticipantId>> {
        let mut rt = self.runtime.lock().await;
        let loaded = rt.loaded_mut()?;

        let mut members = Vec::with_capacity(loaded.config.roster.len());
        let mut unresolved = Vec::new();
        for id in &loaded.config.roster {
            match self.adapter.resolve_participant(id).await {
                Ok(member) => members.push(member),
                Err(AdapterError::NotFound(_)) => unresolved.push(id.clone()),
                Err(e) => return Err(participant_error(id, e)),
            }
        }

        if unresolved.is_empty() {
            loaded.members = members;
        } else {
            warn!(count = unresolved.len(), "roster participants no longer resolve");
        }
        loaded.unresolved = unresolved.clone();
        rt.refresh_state();
        self.publish(&rt);
        Ok(unresolved)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Shared target and action state.
//!
//! Each registry sits behind one lock. Code that needs both takes the target
//! lock first, then the action lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{Result, ScalingError};
use crate::types::{ActionId, ActionStatus, ScalingAction, ScalingTarget, TargetId, TargetStatus};

/// All registered scaling targets.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: RwLock<HashMap<TargetId, ScalingTarget>>,
}

impl TargetRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a target after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::Configuration`] if the target is invalid or
    /// its ID is taken.
    pub fn register(&self, target: ScalingTarget) -> Result<()> {
        target.validate()?;
        let mut targets = self.targets.write();
        if targets.contains_key(&target.id) {
            return Err(ScalingError::config(format!(
                "target {} already registered",
                target.id
            )));
        }
        targets.insert(target.id.clone(), target);
        Ok(())
    }

    /// A copy of one target.
    #[must_use]
    pub fn get(&self, id: &TargetId) -> Option<ScalingTarget> {
        self.targets.read().get(id).cloned()
    }

    /// Copies of every target, ordered by ID.
    #[must_use]
    pub fn list(&self) -> Vec<ScalingTarget> {
        Self::sorted(&self.targets.read())
    }

    /// Every target ID, ordered.
    #[must_use]
    pub fn ids(&self) -> Vec<TargetId> {
        let mut ids: Vec<TargetId> = self.targets.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.read().len()
    }

    /// Whether no target is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.read().is_empty()
    }

    /// Sets a target's status. Returns the previous status.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::TargetNotFound`] for an unknown ID.
    pub fn set_status(&self, id: &TargetId, status: TargetStatus) -> Result<TargetStatus> {
        self.update(id, |target| std::mem::replace(&mut target.status, status))
    }

    /// Runs `f` on a target under the write lock.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::TargetNotFound`] for an unknown ID.
    pub(crate) fn update<R>(&self, id: &TargetId, f: impl FnOnce(&mut ScalingTarget) -> R) -> Result<R> {
        let mut targets = self.targets.write();
        let target = targets.get_mut(id).ok_or_else(|| ScalingError::TargetNotFound {
            target_id: id.to_string(),
        })?;
        Ok(f(target))
    }

    /// Runs `f` over every target under the read lock.
    pub(crate) fn with_all<R>(&self, f: impl FnOnce(&HashMap<TargetId, ScalingTarget>) -> R) -> R {
        f(&self.targets.read())
    }

    pub(crate) fn sorted(targets: &HashMap<TargetId, ScalingTarget>) -> Vec<ScalingTarget> {
        let mut list: Vec<ScalingTarget> = targets.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }
}

#[derive(Debug, Default)]
pub(crate) struct ActionTable {
    actions: HashMap<ActionId, ScalingAction>,
    in_flight: HashMap<TargetId, ActionId>,
}

impl ActionTable {
    pub(crate) fn sorted(&self) -> Vec<ScalingAction> {
        let mut list: Vec<ScalingAction> = self.actions.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    fn get_mut(&mut self, id: ActionId) -> Result<&mut ScalingAction> {
        self.actions
            .get_mut(&id)
            .ok_or(ScalingError::ActionNotFound { action_id: id })
    }

    fn finish(&mut self, id: ActionId, f: impl FnOnce(&mut ScalingAction) -> Result<()>) -> Result<()> {
        let action = self.get_mut(id)?;
        f(action)?;
        let target_id = action.target_id.clone();
        if self.in_flight.get(&target_id) == Some(&id) {
            self.in_flight.remove(&target_id);
        }
        Ok(())
    }

    pub(crate) fn complete(&mut self, id: ActionId, now: DateTime<Utc>) -> Result<()> {
        self.finish(id, |a| a.complete(now))
    }
}

/// Every scaling action the engine has proposed and not yet pruned.
///
/// At most one action per target is pending or in progress.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    table: RwLock<ActionTable>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pending action.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::ActionInFlight`] if the target already has a
    /// pending or in-progress action, or [`ScalingError::InvalidTransition`]
    /// if the action is not pending.
    pub fn submit(&self, action: ScalingAction) -> Result<ActionId> {
        if action.status != ActionStatus::Pending {
            return Err(ScalingError::InvalidTransition {
                action_id: action.id,
                from: action.status,
                to: ActionStatus::Pending,
            });
        }

        let mut table = self.table.write();
        if table.in_flight.contains_key(&action.target_id) {
            return Err(ScalingError::ActionInFlight {
                target_id: action.target_id.to_string(),
            });
        }

        let id = action.id;
        table.in_flight.insert(action.target_id.clone(), id);
        table.actions.insert(id, action);
        Ok(id)
    }

    /// A copy of one action.
    #[must_use]
    pub fn get(&self, id: ActionId) -> Option<ScalingAction> {
        self.table.read().actions.get(&id).cloned()
    }

    /// Copies of every action, ordered by creation time.
    #[must_use]
    pub fn list(&self) -> Vec<ScalingAction> {
        self.table.read().sorted()
    }

    /// Number of actions held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().actions.len()
    }

    /// Whether no action is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.read().actions.is_empty()
    }

    /// The pending or in-progress action of a target.
    #[must_use]
    pub fn in_flight_for(&self, target: &TargetId) -> Option<ActionId> {
        self.table.read().in_flight.get(target).copied()
    }

    /// Pending actions in execution order: highest priority first, then
    /// oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<ScalingAction> {
        let table = self.table.read();
        let mut pending: Vec<ScalingAction> = table
            .actions
            .values()
            .filter(|a| a.status == ActionStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        pending
    }

    /// Moves a pending action to in progress and returns a copy of it.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::ActionNotFound`] or
    /// [`ScalingError::InvalidTransition`].
    pub(crate) fn start(&self, id: ActionId, now: DateTime<Utc>) -> Result<ScalingAction> {
        let mut table = self.table.write();
        let action = table.get_mut(id)?;
        action.start(now)?;
        Ok(action.clone())
    }

    /// Marks an in-progress action completed.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::ActionNotFound`] or
    /// [`ScalingError::InvalidTransition`].
    pub(crate) fn complete(&self, id: ActionId, now: DateTime<Utc>) -> Result<()> {
        self.table.write().complete(id, now)
    }

    /// Marks an in-progress action failed.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::ActionNotFound`] or
    /// [`ScalingError::InvalidTransition`].
    pub(crate) fn fail(&self, id: ActionId, now: DateTime<Utc>, error: &str) -> Result<()> {
        self.table.write().finish(id, |a| a.fail(now, error))
    }

    /// Cancels a pending action.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::ActionNotFound`] for an unknown ID and
    /// [`ScalingError::InvalidTransition`] if the action is no longer pending.
    pub fn cancel(&self, id: ActionId, now: DateTime<Utc>) -> Result<()> {
        self.table.write().finish(id, |a| a.cancel(now))
    }

    /// Drops terminal actions that finished before `cutoff`. Returns how many.
    pub fn prune(&self, cutoff: DateTime<Utc>) -> usize {
        let mut table = self.table.write();
        let before = table.actions.len();
        table
            .actions
            .retain(|_, a| !(a.is_terminal() && a.completed_at.is_some_and(|t| t < cutoff)));
        before - table.actions.len()
    }

    /// Runs `f` under the read lock.
    pub(crate) fn with_table<R>(&self, f: impl FnOnce(&ActionTable) -> R) -> R {
        f(&self.table.read())
    }
}

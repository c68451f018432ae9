//! Priority-ordered execution of pending scaling actions.
//!
//! Each cycle takes every pending action, highest priority first, and runs
//! it against the [`ScalingBackend`] under a timeout. A failed or timed-out
//! action leaves its target untouched and is not retried.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::ScalingBackend;
use crate::clock::Clock;
use crate::config::{ExecutionMode, ExecutorConfig};
use crate::error::ScalingError;
use crate::registry::{ActionRegistry, TargetRegistry};
use crate::types::ScalingAction;

/// Outcome of one execution cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Actions that completed.
    pub completed: usize,
    /// Actions that failed or timed out.
    pub failed: usize,
    /// Pending actions left for a later cycle.
    pub skipped: usize,
}

impl ExecutionReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
    Skipped,
}

/// Runs pending actions against a backend.
pub struct ActionExecutor {
    config: ExecutorConfig,
    backend: Arc<dyn ScalingBackend>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

impl ActionExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(config: ExecutorConfig, backend: Arc<dyn ScalingBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            backend,
            clock,
        }
    }

    /// The executor settings.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Time allowed for one action: its estimate, capped by the hard timeout.
    #[must_use]
    pub fn time_bound(&self, action: &ScalingAction) -> Duration {
        if action.estimated_time.is_zero() {
            self.config.hard_timeout
        } else {
            action.estimated_time.min(self.config.hard_timeout)
        }
    }

    /// Runs every pending action once.
    pub async fn run_cycle(&self, targets: &TargetRegistry, actions: &ActionRegistry) -> ExecutionReport {
        let mut pending = actions.pending();
        let mut report = ExecutionReport::default();

        let mut seen = HashSet::new();
        pending.retain(|action| {
            let first = seen.insert(action.target_id.clone());
            if !first {
                report.skipped += 1;
            }
            first
        });

        match self.config.mode {
            ExecutionMode::Sequential => {
                for action in pending {
                    let outcome = self.execute(action, targets, actions).await;
                    report.record(outcome);
                }
            }
            ExecutionMode::Concurrent { max_in_flight } => {
                let outcomes: Vec<Outcome> = stream::iter(pending)
                    .map(|action| self.execute(action, targets, actions))
                    .buffered(max_in_flight.max(1))
                    .collect()
                    .await;
                for outcome in outcomes {
                    report.record(outcome);
                }
            }
        }

        debug!(
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            "execution cycle finished"
        );
        report
    }

    /// Drops terminal actions older than the retention window.
    pub fn prune(&self, actions: &ActionRegistry) -> usize {
        let retention = chrono::Duration::from_std(self.config.finished_retention)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let pruned = actions.prune(self.clock.now() - retention);
        if pruned > 0 {
            debug!(pruned, "pruned finished actions");
        }
        pruned
    }

    async fn execute(&self, action: ScalingAction, targets: &TargetRegistry, actions: &ActionRegistry) -> Outcome {
        let Some(target) = targets.get(&action.target_id) else {
            return Self::abort(actions, &action, self.clock.now(), &ScalingError::TargetNotFound {
                target_id: action.target_id.to_string(),
            });
        };

        if !target.is_active() {
            debug!(
                target_id = %target.id,
                action_id = %action.id,
                status = ?target.status,
                "target not active, leaving action pending"
            );
            return Outcome::Skipped;
        }

        let started = self.clock.now();
        if let Err(e) = actions.start(action.id, started) {
            debug!(action_id = %action.id, error = %e, "action no longer pending");
            return Outcome::Skipped;
        }

        let to = action.target_instances;
        if !target.contains(to) {
            let err = ScalingError::Execution {
                target_id: target.id.to_string(),
                reason: format!(
                    "target instances {to} outside bounds [{}, {}]",
                    target.min_instances, target.max_instances
                ),
            };
            return Self::fail(actions, &action, started, &err);
        }

        let from = target.current_instances;
        let bound = self.time_bound(&action);
        let result = tokio::time::timeout(bound, self.backend.execute(&target.id, from, to)).await;
        let finished = self.clock.now();

        match result {
            Ok(Ok(())) => {
                let applied = targets.update(&target.id, |t| {
                    t.current_instances = t.clamp(to);
                    t.last_action_time = Some(finished);
                    actions.complete(action.id, finished)
                });
                match applied {
                    Ok(Ok(())) => {
                        info!(
                            target_id = %target.id,
                            action_id = %action.id,
                            from,
                            to,
                            priority = ?action.priority,
                            "scaling action completed"
                        );
                        Outcome::Completed
                    }
                    Ok(Err(e)) | Err(e) => {
                        warn!(action_id = %action.id, error = %e, "failed to record completion");
                        Outcome::Failed
                    }
                }
            }
            Ok(Err(e)) => Self::fail(actions, &action, finished, &e),
            Err(_) => Self::fail(
                actions,
                &action,
                finished,
                &ScalingError::Timeout {
                    target_id: target.id.to_string(),
                    after: bound,
                },
            ),
        }
    }

    fn fail(
        actions: &ActionRegistry,
        action: &ScalingAction,
        now: chrono::DateTime<chrono::Utc>,
        error: &ScalingError,
    ) -> Outcome {
        warn!(
            target_id = %action.target_id,
            action_id = %action.id,
            error = %error,
            "scaling action failed"
        );
        if let Err(e) = actions.fail(action.id, now, &error.to_string()) {
            warn!(action_id = %action.id, error = %e, "failed to record failure");
        }
        Outcome::Failed
    }

    fn abort(
        actions: &ActionRegistry,
        action: &ScalingAction,
        now: chrono::DateTime<chrono::Utc>,
        error: &ScalingError,
    ) -> Outcome {
        if actions.start(action.id, now).is_err() {
            return Outcome::Skipped;
        }
        Self::fail(actions, action, now, error)
    }
}

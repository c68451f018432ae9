//! Threshold, cooldown and predictive scaling decisions.
//!
//! The engine is a pure function of a target, its latest sample and its
//! pattern. It never mutates anything; the caller submits whatever action it
//! returns.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use tide_metrics::MetricSample;
use tracing::debug;

use crate::analyzer::utilization_of;
use crate::config::DecisionConfig;
use crate::cost::CostModel;
use crate::types::{
    ActionType, LoadPattern, Priority, Recommendation, ScalingAction, ScalingTarget,
};

/// Turns the current state of a target into at most one scaling action.
pub struct DecisionEngine {
    config: DecisionConfig,
    cost_model: Arc<dyn CostModel>,
    max_estimated_time: Duration,
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("config", &self.config)
            .field("max_estimated_time", &self.max_estimated_time)
            .finish_non_exhaustive()
    }
}

impl DecisionEngine {
    /// Creates an engine. Time estimates are capped at `max_estimated_time`.
    #[must_use]
    pub fn new(
        config: DecisionConfig,
        cost_model: Arc<dyn CostModel>,
        max_estimated_time: Duration,
    ) -> Self {
        Self {
            config,
            cost_model,
            max_estimated_time,
        }
    }

    /// The decision settings.
    #[must_use]
    pub const fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Decides whether `target` should scale at `now`.
    ///
    /// Returns `None` for inactive targets, targets in cooldown, targets with
    /// no sample, and whenever the computed instance count equals the current
    /// one. A missing pattern means threshold rules only.
    #[must_use]
    pub fn decide(
        &self,
        target: &ScalingTarget,
        latest: Option<&MetricSample>,
        pattern: Option<&LoadPattern>,
        now: DateTime<Utc>,
    ) -> Option<ScalingAction> {
        if !target.is_active() {
            debug!(target_id = %target.id, status = ?target.status, "target not active, skipping");
            return None;
        }
        if target.in_cooldown(now) {
            debug!(target_id = %target.id, "target in cooldown, skipping");
            return None;
        }
        let Some(latest) = latest else {
            debug!(target_id = %target.id, "no metric sample yet, skipping");
            return None;
        };

        let utilization = utilization_of(target.kind, &latest.utilization, target.connection_capacity);
        let current = target.current_instances;

        let (action_type, to, priority, reason) = if utilization > target.scale_up_threshold {
            let priority = if utilization > self.config.critical_factor * target.scale_up_threshold {
                Priority::Critical
            } else {
                Priority::High
            };
            (
                ActionType::ScaleUp,
                current.saturating_add(1).min(target.max_instances),
                priority,
                format!(
                    "utilization {utilization:.1} above scale-up threshold {:.1}",
                    target.scale_up_threshold
                ),
            )
        } else if utilization < target.scale_down_threshold && current > target.min_instances {
            (
                ActionType::ScaleDown,
                current.saturating_sub(1).max(target.min_instances),
                Priority::Low,
                format!(
                    "utilization {utilization:.1} below scale-down threshold {:.1}",
                    target.scale_down_threshold
                ),
            )
        } else {
            let pattern = pattern.filter(|p| p.recommendation == Recommendation::Predictive)?;
            #[allow(clippy::cast_possible_truncation)]
            let hour = now.hour() as u8;
            let predicted = pattern.predict(hour);
            if predicted <= self.config.predictive_factor * target.scale_up_threshold {
                return None;
            }
            (
                ActionType::ScaleUp,
                current.saturating_add(1).min(target.max_instances),
                Priority::Medium,
                format!(
                    "predicted utilization {predicted:.1} at {hour:02}:00 approaching scale-up threshold {:.1}",
                    target.scale_up_threshold
                ),
            )
        };

        if to == current {
            debug!(target_id = %target.id, instances = current, "already at bound, no action");
            return None;
        }

        let delta = i64::from(to) - i64::from(current);
        let estimated_time = target
            .kind
            .provisioning_time()
            .saturating_mul(u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX))
            .min(self.max_estimated_time);

        Some(
            ScalingAction::new(
                target.id.clone(),
                action_type,
                current,
                to,
                priority,
                reason,
                now,
            )
            .with_estimated_cost(self.cost_model.estimate(target.kind, delta))
            .with_estimated_time(estimated_time),
        )
    }
}

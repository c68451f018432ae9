//! Core types for the autoscaler.
//!
//! This module provides the records the engine works with:
//! - [`ScalingTarget`]: a resource pool with instance bounds and thresholds
//! - [`LoadPattern`]: the statistical classification of a target's load
//! - [`ScalingAction`]: a proposed or executed change to a target's size
//! - [`Priority`]: the total order actions are executed in

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScalingError};

pub use tide_metrics::TargetId;

/// Default connection capacity used by the load balancer mapping.
pub const DEFAULT_CONNECTION_CAPACITY: f64 = 1000.0;

/// The kind of resource a target represents.
///
/// The kind selects which utilization dimension drives decisions and which
/// unit cost and provisioning estimate apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Virtual machines or bare compute.
    Compute,
    /// Container replicas.
    Container,
    /// Database replicas.
    Database,
    /// Cache nodes.
    Cache,
    /// Load balancer instances.
    LoadBalancer,
    /// Queue consumers.
    QueueWorker,
}

impl ResourceKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Compute,
        Self::Container,
        Self::Database,
        Self::Cache,
        Self::LoadBalancer,
        Self::QueueWorker,
    ];

    /// Returns the snake_case name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Container => "container",
            Self::Database => "database",
            Self::Cache => "cache",
            Self::LoadBalancer => "load_balancer",
            Self::QueueWorker => "queue_worker",
        }
    }

    /// Typical time to add or remove one instance of this kind.
    #[must_use]
    pub const fn provisioning_time(self) -> Duration {
        match self {
            Self::Compute => Duration::from_secs(180),
            Self::Container => Duration::from_secs(30),
            Self::Database => Duration::from_secs(600),
            Self::Cache => Duration::from_secs(120),
            Self::LoadBalancer => Duration::from_secs(60),
            Self::QueueWorker => Duration::from_secs(45),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Whether the decision engine may act on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    /// Scaling decisions are made for this target.
    #[default]
    Active,
    /// An operator paused scaling.
    Paused,
    /// The target is under maintenance.
    Maintenance,
}

fn default_connection_capacity() -> f64 {
    DEFAULT_CONNECTION_CAPACITY
}

/// A named resource pool whose instance count is adjustable within bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingTarget {
    /// Unique identifier.
    pub id: TargetId,
    /// Human-readable name.
    pub name: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Instances currently provisioned.
    pub current_instances: u32,
    /// Never scale below this.
    pub min_instances: u32,
    /// Never scale above this.
    pub max_instances: u32,
    /// Utilization the target is expected to sit at.
    pub target_utilization: f64,
    /// Utilization above which the target scales up.
    pub scale_up_threshold: f64,
    /// Utilization below which the target scales down.
    pub scale_down_threshold: f64,
    /// Minimum time between two actions on this target.
    #[serde(with = "tide_metrics::duration_secs")]
    pub cooldown: Duration,
    /// When the last action on this target completed.
    #[serde(default)]
    pub last_action_time: Option<DateTime<Utc>>,
    /// Scaling status.
    #[serde(default)]
    pub status: TargetStatus,
    /// Connections one instance set can hold, for the load balancer mapping.
    #[serde(default = "default_connection_capacity")]
    pub connection_capacity: f64,
    /// Free-form labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ScalingTarget {
    /// Creates a new target builder.
    #[must_use]
    pub fn builder(id: impl Into<String>, kind: ResourceKind) -> ScalingTargetBuilder {
        ScalingTargetBuilder::new(id, kind)
    }

    /// Validates this target definition.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::Configuration`] if bounds or thresholds are
    /// inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().is_empty() {
            return Err(ScalingError::config("target id cannot be empty"));
        }

        if self.max_instances == 0 {
            return Err(ScalingError::config(format!(
                "{}: max_instances must be at least 1",
                self.id
            )));
        }

        if self.min_instances > self.max_instances {
            return Err(ScalingError::config(format!(
                "{}: min_instances ({}) cannot exceed max_instances ({})",
                self.id, self.min_instances, self.max_instances
            )));
        }

        if !self.contains(self.current_instances) {
            return Err(ScalingError::config(format!(
                "{}: current_instances ({}) must be within [{}, {}]",
                self.id, self.current_instances, self.min_instances, self.max_instances
            )));
        }

        for (name, value) in [
            ("target_utilization", self.target_utilization),
            ("scale_up_threshold", self.scale_up_threshold),
            ("scale_down_threshold", self.scale_down_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ScalingError::config(format!(
                    "{}: {name} must be a non-negative number, got {value}",
                    self.id
                )));
            }
        }

        if self.scale_down_threshold >= self.scale_up_threshold {
            return Err(ScalingError::config(format!(
                "{}: scale_down_threshold ({}) must be less than scale_up_threshold ({})",
                self.id, self.scale_down_threshold, self.scale_up_threshold
            )));
        }

        if !self.connection_capacity.is_finite() || self.connection_capacity <= 0.0 {
            return Err(ScalingError::config(format!(
                "{}: connection_capacity must be positive",
                self.id
            )));
        }

        Ok(())
    }

    /// Whether the decision engine may act on this target.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == TargetStatus::Active
    }

    /// Whether `instances` lies within `[min_instances, max_instances]`.
    #[must_use]
    pub const fn contains(&self, instances: u32) -> bool {
        instances >= self.min_instances && instances <= self.max_instances
    }

    /// Clamps `instances` into the target's bounds.
    #[must_use]
    pub fn clamp(&self, instances: u32) -> u32 {
        instances.clamp(self.min_instances, self.max_instances.max(self.min_instances))
    }

    /// Whether the target is still cooling down from its last action at `now`.
    ///
    /// A last action time in the future counts as cooling down.
    #[must_use]
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.last_action_time
            .is_some_and(|last| (now - last).to_std().map_or(true, |elapsed| elapsed < self.cooldown))
    }
}

/// Builder for [`ScalingTarget`].
#[derive(Debug)]
pub struct ScalingTargetBuilder {
    id: String,
    name: Option<String>,
    kind: ResourceKind,
    current_instances: Option<u32>,
    min_instances: u32,
    max_instances: u32,
    target_utilization: f64,
    scale_up_threshold: f64,
    scale_down_threshold: f64,
    cooldown: Duration,
    status: TargetStatus,
    connection_capacity: f64,
    labels: BTreeMap<String, String>,
}

impl ScalingTargetBuilder {
    /// Creates a builder with defaults: 1..=10 instances, thresholds 30/80,
    /// target utilization 70 and a five minute cooldown.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind,
            current_instances: None,
            min_instances: 1,
            max_instances: 10,
            target_utilization: 70.0,
            scale_up_threshold: 80.0,
            scale_down_threshold: 30.0,
            cooldown: Duration::from_secs(300),
            status: TargetStatus::Active,
            connection_capacity: DEFAULT_CONNECTION_CAPACITY,
            labels: BTreeMap::new(),
        }
    }

    /// Sets the human-readable name. Defaults to the ID.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the current instance count. Defaults to `min_instances`.
    #[must_use]
    pub const fn current_instances(mut self, current: u32) -> Self {
        self.current_instances = Some(current);
        self
    }

    /// Sets the minimum instance count.
    #[must_use]
    pub const fn min_instances(mut self, min: u32) -> Self {
        self.min_instances = min;
        self
    }

    /// Sets the maximum instance count.
    #[must_use]
    pub const fn max_instances(mut self, max: u32) -> Self {
        self.max_instances = max;
        self
    }

    /// Sets the target utilization.
    #[must_use]
    pub const fn target_utilization(mut self, utilization: f64) -> Self {
        self.target_utilization = utilization;
        self
    }

    /// Sets the scale down and scale up thresholds.
    #[must_use]
    pub const fn thresholds(mut self, scale_down: f64, scale_up: f64) -> Self {
        self.scale_down_threshold = scale_down;
        self.scale_up_threshold = scale_up;
        self
    }

    /// Sets the cooldown between actions.
    #[must_use]
    pub const fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the initial status.
    #[must_use]
    pub const fn status(mut self, status: TargetStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the connection capacity for the load balancer mapping.
    #[must_use]
    pub const fn connection_capacity(mut self, capacity: f64) -> Self {
        self.connection_capacity = capacity;
        self
    }

    /// Adds a label.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Builds the target.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::Configuration`] if the target is invalid.
    pub fn build(self) -> Result<ScalingTarget> {
        let target = ScalingTarget {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: TargetId::new(self.id),
            kind: self.kind,
            current_instances: self.current_instances.unwrap_or(self.min_instances),
            min_instances: self.min_instances,
            max_instances: self.max_instances,
            target_utilization: self.target_utilization,
            scale_up_threshold: self.scale_up_threshold,
            scale_down_threshold: self.scale_down_threshold,
            cooldown: self.cooldown,
            last_action_time: None,
            status: self.status,
            connection_capacity: self.connection_capacity,
            labels: self.labels,
        };

        target.validate()?;
        Ok(target)
    }
}

/// Statistical classification of a target's load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Low variation around the mean.
    Stable,
    /// High variation relative to the mean.
    Bursty,
    /// Repeats with a detectable period.
    Cyclical,
    /// Rising over the window.
    Growing,
    /// Falling over the window.
    Declining,
}

impl PatternType {
    /// Returns the snake_case name of this pattern.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Bursty => "bursty",
            Self::Cyclical => "cyclical",
            Self::Growing => "growing",
            Self::Declining => "declining",
        }
    }

    /// The scaling posture suited to this pattern.
    #[must_use]
    pub const fn recommendation(self) -> Recommendation {
        match self {
            Self::Stable | Self::Declining => Recommendation::Conservative,
            Self::Bursty | Self::Growing => Recommendation::Aggressive,
            Self::Cyclical => Recommendation::Predictive,
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Scaling posture derived from a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// React only to threshold crossings.
    Conservative,
    /// React quickly to threshold crossings.
    Aggressive,
    /// Scale ahead of forecast peaks.
    Predictive,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::Conservative => "conservative",
            Self::Aggressive => "aggressive",
            Self::Predictive => "predictive",
        })
    }
}

/// The latest analysis of a target's utilization series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadPattern {
    /// Target analyzed.
    pub target_id: TargetId,
    /// Classification.
    pub pattern_type: PatternType,
    /// Confidence in the classification, in `[0, 1]`.
    pub confidence: f64,
    /// Hours of day (UTC) whose average load exceeds the peak factor.
    pub peak_hours: BTreeSet<u8>,
    /// Mean utilization over the window.
    pub average_load: f64,
    /// Maximum utilization over the window.
    pub peak_load: f64,
    /// Scaling posture for this pattern.
    pub recommendation: Recommendation,
    /// When the analysis ran.
    pub last_analyzed: DateTime<Utc>,
    /// Population standard deviation divided by the mean.
    pub coefficient_of_variation: f64,
    /// Relative change between the first and second half of the window.
    pub trend: f64,
    /// Normalized autocorrelation at a quarter-window lag.
    pub autocorrelation: f64,
    /// Samples the analysis was computed over.
    pub sample_count: usize,
}

impl LoadPattern {
    /// Whether `hour` is a detected peak hour.
    #[must_use]
    pub fn is_peak_hour(&self, hour: u8) -> bool {
        self.peak_hours.contains(&hour)
    }

    /// Forecast utilization for `hour`: the peak load during a cyclical
    /// pattern's peak hours, the average otherwise.
    #[must_use]
    pub fn predict(&self, hour: u8) -> f64 {
        if self.pattern_type == PatternType::Cyclical && self.is_peak_hour(hour) {
            self.peak_load
        } else {
            self.average_load
        }
    }
}

/// Unique identifier for a scaling action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(Uuid);

impl ActionId {
    /// Creates a new random action ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ActionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// What a scaling action does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Add instances.
    ScaleUp,
    /// Remove instances.
    ScaleDown,
    /// Keep the current count.
    Maintain,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::ScaleUp => "scale_up",
            Self::ScaleDown => "scale_down",
            Self::Maintain => "maintain",
        })
    }
}

/// Execution priority of an action.
///
/// Variants are declared lowest first so the derived order gives
/// `Critical > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Scale-down housekeeping.
    Low,
    /// Predictive scale-up ahead of a forecast peak.
    Medium,
    /// Utilization above the scale-up threshold.
    High,
    /// Utilization far above the scale-up threshold.
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        })
    }
}

/// Status of a scaling action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Action is waiting for the executor.
    #[default]
    Pending,
    /// Action is being executed.
    InProgress,
    /// Action completed successfully.
    Completed,
    /// Action failed.
    Failed,
    /// Action was cancelled before it started.
    Cancelled,
}

impl ActionStatus {
    /// Whether the action can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the action is pending or in progress.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// A proposed or executed change to a target's instance count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingAction {
    /// Unique identifier.
    pub id: ActionId,
    /// Target being scaled.
    pub target_id: TargetId,
    /// Direction.
    pub action_type: ActionType,
    /// Why the action was proposed.
    pub reason: String,
    /// Instance count when the action was proposed.
    pub current_instances: u32,
    /// Instance count the action moves to.
    pub target_instances: u32,
    /// Execution priority.
    pub priority: Priority,
    /// Hourly cost delta of the change.
    pub estimated_cost: f64,
    /// Expected time to apply the change.
    #[serde(with = "tide_metrics::duration_secs")]
    pub estimated_time: Duration,
    /// Lifecycle status.
    pub status: ActionStatus,
    /// When the action was proposed.
    pub created_at: DateTime<Utc>,
    /// When execution started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the action reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure text, for failed actions.
    pub error: Option<String>,
}

impl ScalingAction {
    /// Creates a pending action.
    #[must_use]
    pub fn new(
        target_id: TargetId,
        action_type: ActionType,
        current_instances: u32,
        target_instances: u32,
        priority: Priority,
        reason: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActionId::new(),
            target_id,
            action_type,
            reason: reason.into(),
            current_instances,
            target_instances,
            priority,
            estimated_cost: 0.0,
            estimated_time: Duration::ZERO,
            status: ActionStatus::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Sets the cost estimate.
    #[must_use]
    pub const fn with_estimated_cost(mut self, cost: f64) -> Self {
        self.estimated_cost = cost;
        self
    }

    /// Sets the time estimate.
    #[must_use]
    pub const fn with_estimated_time(mut self, time: Duration) -> Self {
        self.estimated_time = time;
        self
    }

    /// Signed change in instance count.
    #[must_use]
    pub fn delta(&self) -> i64 {
        i64::from(self.target_instances) - i64::from(self.current_instances)
    }

    /// Whether the action can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, from: ActionStatus, to: ActionStatus) -> Result<()> {
        if self.status != from {
            return Err(ScalingError::InvalidTransition {
                action_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Moves a pending action to in progress.
    pub(crate) fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(ActionStatus::Pending, ActionStatus::InProgress)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Moves an in-progress action to completed.
    pub(crate) fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(ActionStatus::InProgress, ActionStatus::Completed)?;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Moves an in-progress action to failed with the given error text.
    pub(crate) fn fail(&mut self, now: DateTime<Utc>, error: impl Into<String>) -> Result<()> {
        self.transition(ActionStatus::InProgress, ActionStatus::Failed)?;
        self.completed_at = Some(now);
        self.error = Some(error.into());
        Ok(())
    }

    /// Moves a pending action to cancelled.
    pub(crate) fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(ActionStatus::Pending, ActionStatus::Cancelled)?;
        self.completed_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    mod target_tests {
        use super::*;
        use test_case::test_case;

        #[test]
        fn builder_defaults() {
            let target = ScalingTarget::builder("web", ResourceKind::Compute)
                .build()
                .unwrap();

            assert_eq!(target.id.as_str(), "web");
            assert_eq!(target.name, "web");
            assert_eq!(target.current_instances, 1);
            assert_eq!(target.min_instances, 1);
            assert_eq!(target.max_instances, 10);
            assert_eq!(target.cooldown, Duration::from_secs(300));
            assert!(target.is_active());
            assert!(target.last_action_time.is_none());
        }

        #[test]
        fn builder_full() {
            let target = ScalingTarget::builder("db", ResourceKind::Database)
                .name("Primary DB")
                .min_instances(2)
                .max_instances(6)
                .current_instances(4)
                .thresholds(20.0, 75.0)
                .cooldown(Duration::from_secs(60))
                .label("tier", "data")
                .build()
                .unwrap();

            assert_eq!(target.name, "Primary DB");
            assert_eq!(target.current_instances, 4);
            assert_eq!(target.labels.get("tier").map(String::as_str), Some("data"));
        }

        #[test]
        fn min_greater_than_max_rejected() {
            let result = ScalingTarget::builder("web", ResourceKind::Compute)
                .min_instances(5)
                .max_instances(2)
                .build();
            assert!(matches!(result, Err(ScalingError::Configuration { .. })));
        }

        #[test]
        fn zero_max_rejected() {
            let result = ScalingTarget::builder("web", ResourceKind::Compute)
                .min_instances(0)
                .max_instances(0)
                .build();
            assert!(result.is_err());
        }

        #[test]
        fn current_outside_bounds_rejected() {
            let result = ScalingTarget::builder("web", ResourceKind::Compute)
                .max_instances(3)
                .current_instances(4)
                .build();
            assert!(result.is_err());
        }

        #[test_case(50.0, 50.0 ; "equal thresholds")]
        #[test_case(80.0, 30.0 ; "inverted thresholds")]
        #[test_case(f64::NAN, 80.0 ; "nan threshold")]
        #[test_case(-1.0, 80.0 ; "negative threshold")]
        fn bad_thresholds_rejected(down: f64, up: f64) {
            let result = ScalingTarget::builder("web", ResourceKind::Compute)
                .thresholds(down, up)
                .build();
            assert!(result.is_err());
        }

        #[test]
        fn zero_capacity_rejected() {
            let result = ScalingTarget::builder("lb", ResourceKind::LoadBalancer)
                .connection_capacity(0.0)
                .build();
            assert!(result.is_err());
        }

        #[test]
        fn clamp_and_contains() {
            let target = ScalingTarget::builder("web", ResourceKind::Compute)
                .min_instances(2)
                .max_instances(5)
                .build()
                .unwrap();

            assert!(target.contains(2));
            assert!(target.contains(5));
            assert!(!target.contains(6));
            assert_eq!(target.clamp(0), 2);
            assert_eq!(target.clamp(9), 5);
            assert_eq!(target.clamp(3), 3);
        }

        #[test]
        fn cooldown_window() {
            let mut target = ScalingTarget::builder("web", ResourceKind::Compute)
                .cooldown(Duration::from_secs(300))
                .build()
                .unwrap();
            let t0 = base_time();

            assert!(!target.in_cooldown(t0));

            target.last_action_time = Some(t0);
            assert!(target.in_cooldown(t0 + chrono::Duration::seconds(10)));
            assert!(target.in_cooldown(t0 + chrono::Duration::seconds(299)));
            assert!(!target.in_cooldown(t0 + chrono::Duration::seconds(300)));
            assert!(target.in_cooldown(t0 - chrono::Duration::seconds(1)));
        }

        #[test]
        fn deserialize_fills_defaults() {
            let json = r#"{
                "id": "lb",
                "name": "edge",
                "kind": "load_balancer",
                "current_instances": 2,
                "min_instances": 1,
                "max_instances": 4,
                "target_utilization": 60.0,
                "scale_up_threshold": 80.0,
                "scale_down_threshold": 20.0,
                "cooldown": 120
            }"#;
            let target: ScalingTarget = serde_json::from_str(json).unwrap();

            assert_eq!(target.kind, ResourceKind::LoadBalancer);
            assert_eq!(target.cooldown, Duration::from_secs(120));
            assert_eq!(target.status, TargetStatus::Active);
            assert!((target.connection_capacity - DEFAULT_CONNECTION_CAPACITY).abs() < f64::EPSILON);
            assert!(target.validate().is_ok());
        }
    }

    mod priority_tests {
        use super::*;
        use test_case::test_case;

        #[test]
        fn total_order() {
            assert!(Priority::Critical > Priority::High);
            assert!(Priority::High > Priority::Medium);
            assert!(Priority::Medium > Priority::Low);
        }

        #[test]
        fn sorts_descending() {
            let mut priorities = vec![Priority::Low, Priority::Critical, Priority::Medium, Priority::High];
            priorities.sort_by(|a, b| b.cmp(a));
            assert_eq!(
                priorities,
                vec![Priority::Critical, Priority::High, Priority::Medium, Priority::Low]
            );
        }

        #[test_case(Priority::Critical, "\"critical\"")]
        #[test_case(Priority::Low, "\"low\"")]
        fn serializes_snake_case(priority: Priority, expected: &str) {
            assert_eq!(serde_json::to_string(&priority).unwrap(), expected);
        }
    }

    mod pattern_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(PatternType::Stable, Recommendation::Conservative)]
        #[test_case(PatternType::Declining, Recommendation::Conservative)]
        #[test_case(PatternType::Bursty, Recommendation::Aggressive)]
        #[test_case(PatternType::Growing, Recommendation::Aggressive)]
        #[test_case(PatternType::Cyclical, Recommendation::Predictive)]
        fn recommendation_mapping(pattern: PatternType, expected: Recommendation) {
            assert_eq!(pattern.recommendation(), expected);
        }

        fn cyclical() -> LoadPattern {
            LoadPattern {
                target_id: TargetId::new("web"),
                pattern_type: PatternType::Cyclical,
                confidence: 0.7,
                peak_hours: [9, 10, 11].into_iter().collect(),
                average_load: 50.0,
                peak_load: 90.0,
                recommendation: Recommendation::Predictive,
                last_analyzed: base_time(),
                coefficient_of_variation: 0.2,
                trend: 0.0,
                autocorrelation: 0.8,
                sample_count: 48,
            }
        }

        #[test]
        fn predict_uses_peak_in_peak_hours() {
            let pattern = cyclical();
            assert!((pattern.predict(10) - 90.0).abs() < f64::EPSILON);
            assert!((pattern.predict(3) - 50.0).abs() < f64::EPSILON);
        }

        #[test]
        fn predict_non_cyclical_uses_average() {
            let mut pattern = cyclical();
            pattern.pattern_type = PatternType::Stable;
            assert!((pattern.predict(10) - 50.0).abs() < f64::EPSILON);
        }
    }

    mod action_tests {
        use super::*;

        fn action() -> ScalingAction {
            ScalingAction::new(
                TargetId::new("web"),
                ActionType::ScaleUp,
                2,
                3,
                Priority::High,
                "cpu 90.0 above 80.0",
                base_time(),
            )
        }

        #[test]
        fn new_is_pending() {
            let action = action();
            assert_eq!(action.status, ActionStatus::Pending);
            assert_eq!(action.delta(), 1);
            assert!(!action.is_terminal());
        }

        #[test]
        fn lifecycle_complete() {
            let mut action = action();
            let t0 = base_time();
            action.start(t0).unwrap();
            assert_eq!(action.status, ActionStatus::InProgress);
            assert_eq!(action.started_at, Some(t0));

            action.complete(t0 + chrono::Duration::seconds(5)).unwrap();
            assert_eq!(action.status, ActionStatus::Completed);
            assert!(action.is_terminal());
        }

        #[test]
        fn lifecycle_fail_records_error() {
            let mut action = action();
            action.start(base_time()).unwrap();
            action.fail(base_time(), "backend unreachable").unwrap();
            assert_eq!(action.status, ActionStatus::Failed);
            assert_eq!(action.error.as_deref(), Some("backend unreachable"));
        }

        #[test]
        fn cancel_only_from_pending() {
            let mut pending = action();
            assert!(pending.cancel(base_time()).is_ok());
            assert_eq!(pending.status, ActionStatus::Cancelled);

            let mut running = action();
            running.start(base_time()).unwrap();
            let err = running.cancel(base_time()).unwrap_err();
            assert!(matches!(err, ScalingError::InvalidTransition { .. }));
            assert_eq!(running.status, ActionStatus::InProgress);
        }

        #[test]
        fn terminal_is_immutable() {
            let mut action = action();
            action.start(base_time()).unwrap();
            action.complete(base_time()).unwrap();

            assert!(action.start(base_time()).is_err());
            assert!(action.fail(base_time(), "late").is_err());
            assert!(action.cancel(base_time()).is_err());
            assert_eq!(action.status, ActionStatus::Completed);
        }

        #[test]
        fn action_ids_unique_and_parse() {
            let a = ActionId::new();
            let b = ActionId::new();
            assert_ne!(a, b);
            let parsed: ActionId = a.to_string().parse().unwrap();
            assert_eq!(parsed, a);
        }
    }
}

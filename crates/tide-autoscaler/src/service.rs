//! The [`AutoScaler`] service: owns all engine state and exposes the
//! operator API.
//!
//! Collaborators are injected through [`AutoScalerBuilder`]. Every cycle can
//! be driven directly for deterministic tests, or by background loops started
//! with [`AutoScaler::start`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tide_metrics::{CollectionReport, MetricSample, MetricsCollector, MetricsSource};
use tracing::{debug, info, warn};

use crate::analyzer::PatternAnalyzer;
use crate::backend::ScalingBackend;
use crate::clock::{Clock, SystemClock};
use crate::config::AutoScalerConfig;
use crate::cost::{CostModel, StaticCostModel};
use crate::decision::DecisionEngine;
use crate::error::{Result, ScalingError};
use crate::executor::{ActionExecutor, ExecutionReport};
use crate::registry::{ActionRegistry, TargetRegistry};
use crate::scheduler::LoopSet;
use crate::types::{
    ActionId, ActionStatus, LoadPattern, ScalingAction, ScalingTarget, TargetId, TargetStatus,
};

/// Outcome of one analysis cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Targets whose pattern was updated.
    pub analyzed: usize,
    /// Targets without enough samples.
    pub skipped: usize,
}

/// Number of actions in each status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionCounts {
    /// Waiting for the executor.
    pub pending: usize,
    /// Being executed.
    pub in_progress: usize,
    /// Completed.
    pub completed: usize,
    /// Failed or timed out.
    pub failed: usize,
    /// Cancelled before execution.
    pub cancelled: usize,
}

impl ActionCounts {
    fn count(actions: &[ScalingAction]) -> Self {
        let mut counts = Self::default();
        for action in actions {
            match action.status {
                ActionStatus::Pending => counts.pending += 1,
                ActionStatus::InProgress => counts.in_progress += 1,
                ActionStatus::Completed => counts.completed += 1,
                ActionStatus::Failed => counts.failed += 1,
                ActionStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

/// Point-in-time view of the whole engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingStatistics {
    /// Every target, ordered by ID.
    pub targets: Vec<ScalingTarget>,
    /// Every retained action, ordered by creation time.
    pub actions: Vec<ScalingAction>,
    /// Every stored pattern, ordered by target ID.
    pub patterns: Vec<LoadPattern>,
    /// Latest sample of each target, ordered by target ID.
    pub recent_metrics: Vec<MetricSample>,
    /// Action totals by status.
    pub action_counts: ActionCounts,
    /// Sum of the estimated cost of completed actions.
    pub total_completed_cost: f64,
    /// Mean response time over the latest samples, 0 when there are none.
    pub average_response_time: f64,
    /// When the snapshot was taken.
    pub generated_at: DateTime<Utc>,
}

/// Builder for [`AutoScaler`].
pub struct AutoScalerBuilder {
    config: AutoScalerConfig,
    source: Arc<dyn MetricsSource>,
    backend: Arc<dyn ScalingBackend>,
    cost_model: Arc<dyn CostModel>,
    clock: Arc<dyn Clock>,
}

impl AutoScalerBuilder {
    /// Creates a builder with default configuration, the static cost model
    /// and the system clock.
    #[must_use]
    pub fn new(source: Arc<dyn MetricsSource>, backend: Arc<dyn ScalingBackend>) -> Self {
        Self {
            config: AutoScalerConfig::default(),
            source,
            backend,
            cost_model: Arc::new(StaticCostModel::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub const fn config(mut self, config: AutoScalerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the cost model.
    #[must_use]
    pub fn cost_model(mut self, cost_model: Arc<dyn CostModel>) -> Self {
        self.cost_model = cost_model;
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the service.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::Configuration`] or [`ScalingError::Metrics`]
    /// if the configuration is invalid.
    pub fn build(self) -> Result<AutoScaler> {
        self.config.validate()?;
        let config = self.config;

        Ok(AutoScaler {
            collector: MetricsCollector::new(self.source, config.retention),
            analyzer: PatternAnalyzer::new(config.analyzer),
            engine: DecisionEngine::new(config.decision, self.cost_model, config.executor.hard_timeout),
            executor: ActionExecutor::new(config.executor, self.backend, Arc::clone(&self.clock)),
            targets: TargetRegistry::new(),
            actions: ActionRegistry::new(),
            loops: Mutex::new(None),
            clock: self.clock,
            config,
        })
    }
}

/// The autoscaling service.
///
/// Share it as `Arc<AutoScaler>`; all methods take `&self`.
pub struct AutoScaler {
    config: AutoScalerConfig,
    clock: Arc<dyn Clock>,
    collector: MetricsCollector,
    analyzer: PatternAnalyzer,
    engine: DecisionEngine,
    executor: ActionExecutor,
    targets: TargetRegistry,
    actions: ActionRegistry,
    loops: Mutex<Option<LoopSet>>,
}

impl std::fmt::Debug for AutoScaler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoScaler")
            .field("targets", &self.targets.len())
            .field("actions", &self.actions.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl AutoScaler {
    /// Starts building a service over the given probe and backend.
    #[must_use]
    pub fn builder(source: Arc<dyn MetricsSource>, backend: Arc<dyn ScalingBackend>) -> AutoScalerBuilder {
        AutoScalerBuilder::new(source, backend)
    }

    /// The service configuration.
    #[must_use]
    pub const fn config(&self) -> &AutoScalerConfig {
        &self.config
    }

    /// The metrics collector.
    #[must_use]
    pub const fn collector(&self) -> &MetricsCollector {
        &self.collector
    }

    /// The current time according to the service clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ---- targets ----

    /// Registers a new target.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::Configuration`] if the target is invalid or
    /// its ID is already registered.
    pub fn register_target(&self, target: ScalingTarget) -> Result<()> {
        let id = target.id.clone();
        let kind = target.kind;
        self.targets.register(target)?;
        info!(target_id = %id, kind = %kind, "scaling target registered");
        Ok(())
    }

    /// A copy of one target.
    #[must_use]
    pub fn target(&self, id: &TargetId) -> Option<ScalingTarget> {
        self.targets.get(id)
    }

    /// Copies of every target, ordered by ID.
    #[must_use]
    pub fn targets(&self) -> Vec<ScalingTarget> {
        self.targets.list()
    }

    /// Stops scaling decisions for a target.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::TargetNotFound`] for an unknown ID.
    pub fn pause_scaling(&self, id: &TargetId) -> Result<()> {
        self.set_status(id, TargetStatus::Paused)
    }

    /// Resumes scaling decisions for a paused or maintenance target.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::TargetNotFound`] for an unknown ID.
    pub fn resume_scaling(&self, id: &TargetId) -> Result<()> {
        self.set_status(id, TargetStatus::Active)
    }

    /// Puts a target under maintenance; it is skipped like a paused target.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::TargetNotFound`] for an unknown ID.
    pub fn set_maintenance(&self, id: &TargetId) -> Result<()> {
        self.set_status(id, TargetStatus::Maintenance)
    }

    fn set_status(&self, id: &TargetId, status: TargetStatus) -> Result<()> {
        let previous = self.targets.set_status(id, status)?;
        if previous != status {
            info!(target_id = %id, from = ?previous, to = ?status, "target status changed");
        }
        Ok(())
    }

    // ---- actions ----

    /// A copy of one action.
    #[must_use]
    pub fn action(&self, id: ActionId) -> Option<ScalingAction> {
        self.actions.get(id)
    }

    /// Copies of every retained action, ordered by creation time.
    #[must_use]
    pub fn actions(&self) -> Vec<ScalingAction> {
        self.actions.list()
    }

    /// Cancels an action that has not started. Returns whether it was
    /// cancelled.
    pub fn cancel_scaling_action(&self, id: ActionId) -> bool {
        match self.actions.cancel(id, self.clock.now()) {
            Ok(()) => {
                info!(action_id = %id, "scaling action cancelled");
                true
            }
            Err(e) => {
                debug!(action_id = %id, error = %e, "cancel rejected");
                false
            }
        }
    }

    /// The stored pattern for a target.
    #[must_use]
    pub fn pattern(&self, id: &TargetId) -> Option<LoadPattern> {
        self.analyzer.pattern(id)
    }

    // ---- cycles ----

    /// Samples every target once and expires old history.
    pub fn run_collection_cycle(&self) -> CollectionReport {
        let now = self.clock.now();
        let report = self.collector.collect_once(&self.targets.ids(), now);
        self.collector.expire(now);
        report
    }

    /// Recomputes the pattern of every target with enough history.
    pub fn run_analysis_cycle(&self) -> AnalysisReport {
        let now = self.clock.now();
        let window = self.analyzer.config().window;
        let mut report = AnalysisReport::default();

        for target in self.targets.list() {
            let samples = self.collector.window(&target.id, window);
            match self.analyzer.update(&target, &samples, now) {
                Ok(_) => report.analyzed += 1,
                Err(ScalingError::Analysis(e)) => {
                    debug!(target_id = %target.id, reason = %e, "analysis skipped");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(target_id = %target.id, error = %e, "analysis failed");
                    report.skipped += 1;
                }
            }
        }

        debug!(
            analyzed = report.analyzed,
            skipped = report.skipped,
            "analysis cycle finished"
        );
        report
    }

    /// Proposes at most one action per eligible target. Returns the actions
    /// submitted.
    pub fn run_decision_cycle(&self) -> Vec<ScalingAction> {
        let now = self.clock.now();
        let mut proposed = Vec::new();

        for target in self.targets.list() {
            if let Some(in_flight) = self.actions.in_flight_for(&target.id) {
                debug!(target_id = %target.id, action_id = %in_flight, "action in flight, skipping");
                continue;
            }

            let latest = self.collector.latest(&target.id);
            let pattern = self.analyzer.pattern(&target.id);
            let Some(action) = self.engine.decide(&target, latest.as_ref(), pattern.as_ref(), now) else {
                continue;
            };

            match self.actions.submit(action.clone()) {
                Ok(id) => {
                    info!(
                        target_id = %target.id,
                        action_id = %id,
                        action_type = %action.action_type,
                        from = action.current_instances,
                        to = action.target_instances,
                        priority = ?action.priority,
                        "scaling action proposed"
                    );
                    proposed.push(action);
                }
                Err(e) => warn!(target_id = %target.id, error = %e, "scaling action rejected"),
            }
        }

        debug!(proposed = proposed.len(), "decision cycle finished");
        proposed
    }

    /// Executes pending actions, then prunes old finished ones.
    pub async fn run_execution_cycle(&self) -> ExecutionReport {
        let report = self.executor.run_cycle(&self.targets, &self.actions).await;
        self.executor.prune(&self.actions);
        report
    }

    // ---- statistics ----

    /// A consistent snapshot of targets, actions, patterns and latest metrics.
    #[must_use]
    pub fn get_scaling_statistics(&self) -> ScalingStatistics {
        let (targets, actions) = self.targets.with_all(|targets| {
            let actions = self.actions.with_table(|table| table.sorted());
            (TargetRegistry::sorted(targets), actions)
        });

        let recent_metrics = self.collector.latest_all();
        let average_response_time = if recent_metrics.is_empty() {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let n = recent_metrics.len() as f64;
            recent_metrics
                .iter()
                .map(|s| s.utilization.response_time)
                .sum::<f64>()
                / n
        };

        let total_completed_cost = actions
            .iter()
            .filter(|a| a.status == ActionStatus::Completed)
            .map(|a| a.estimated_cost)
            .sum();

        ScalingStatistics {
            action_counts: ActionCounts::count(&actions),
            targets,
            actions,
            patterns: self.analyzer.patterns(),
            recent_metrics,
            total_completed_cost,
            average_response_time,
            generated_at: self.clock.now(),
        }
    }

    // ---- lifecycle ----

    /// Spawns the collection, analysis, decision and execution loops.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::AlreadyRunning`] if the loops are running.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut slot = self.loops.lock();
        if slot.is_some() {
            return Err(ScalingError::AlreadyRunning);
        }

        let cadence = self.config.scheduler;
        let mut loops = LoopSet::new();

        let this = Arc::clone(self);
        loops.spawn("collect", cadence.collect_every, move || {
            let this = Arc::clone(&this);
            async move {
                this.run_collection_cycle();
            }
        });

        let this = Arc::clone(self);
        loops.spawn("analyze", cadence.analyze_every, move || {
            let this = Arc::clone(&this);
            async move {
                this.run_analysis_cycle();
            }
        });

        let this = Arc::clone(self);
        loops.spawn("decide", cadence.decide_every, move || {
            let this = Arc::clone(&this);
            async move {
                this.run_decision_cycle();
            }
        });

        let this = Arc::clone(self);
        loops.spawn("execute", cadence.execute_every, move || {
            let this = Arc::clone(&this);
            async move {
                this.run_execution_cycle().await;
            }
        });

        *slot = Some(loops);
        info!(targets = self.targets.len(), "autoscaler started");
        Ok(())
    }

    /// Signals the loops to stop and waits for them to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::NotRunning`] if the loops are not running.
    pub async fn stop(&self) -> Result<()> {
        let loops = self.loops.lock().take().ok_or(ScalingError::NotRunning)?;
        loops.shutdown().await;
        info!("autoscaler stopped");
        Ok(())
    }

    /// Whether the loops are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.loops.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::clock::ManualClock;
    use crate::types::{Priority, ResourceKind};
    use tide_metrics::{StaticMetricsSource, Utilization};

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    struct Harness {
        source: Arc<StaticMetricsSource>,
        backend: Arc<RecordingBackend>,
        clock: Arc<ManualClock>,
        scaler: Arc<AutoScaler>,
    }

    fn harness() -> Harness {
        let source = Arc::new(StaticMetricsSource::new());
        let backend = Arc::new(RecordingBackend::new());
        let clock = Arc::new(ManualClock::new(base_time()));
        let scaler = AutoScaler::builder(source.clone(), backend.clone())
            .clock(clock.clone())
            .build()
            .unwrap();
        Harness {
            source,
            backend,
            clock,
            scaler: Arc::new(scaler),
        }
    }

    fn web() -> ScalingTarget {
        ScalingTarget::builder("web", ResourceKind::Compute)
            .max_instances(10)
            .current_instances(2)
            .build()
            .unwrap()
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let config = AutoScalerConfig::default()
            .with_scheduler(crate::config::SchedulerConfig::default().with_collect_every(std::time::Duration::ZERO));
        let result = AutoScaler::builder(Arc::new(StaticMetricsSource::new()), Arc::new(RecordingBackend::new()))
            .config(config)
            .build();
        assert!(matches!(result, Err(ScalingError::Configuration { .. })));
    }

    #[test]
    fn register_and_list_targets() {
        let h = harness();
        h.scaler.register_target(web()).unwrap();
        assert!(h.scaler.register_target(web()).is_err());
        assert_eq!(h.scaler.targets().len(), 1);
        assert!(h.scaler.target(&TargetId::new("web")).is_some());
    }

    #[test]
    fn pause_resume_and_maintenance() {
        let h = harness();
        h.scaler.register_target(web()).unwrap();
        let id = TargetId::new("web");

        h.scaler.pause_scaling(&id).unwrap();
        assert_eq!(h.scaler.target(&id).unwrap().status, TargetStatus::Paused);
        h.scaler.set_maintenance(&id).unwrap();
        assert_eq!(h.scaler.target(&id).unwrap().status, TargetStatus::Maintenance);
        h.scaler.resume_scaling(&id).unwrap();
        assert_eq!(h.scaler.target(&id).unwrap().status, TargetStatus::Active);

        assert!(matches!(
            h.scaler.pause_scaling(&TargetId::new("ghost")),
            Err(ScalingError::TargetNotFound { .. })
        ));
    }

    #[test]
    fn decision_cycle_single_flight() {
        let h = harness();
        h.scaler.register_target(web()).unwrap();
        h.source.set(&TargetId::new("web"), Utilization::new().with_cpu(100.0));
        h.scaler.run_collection_cycle();

        let first = h.scaler.run_decision_cycle();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].priority, Priority::Critical);

        let second = h.scaler.run_decision_cycle();
        assert!(second.is_empty());
        assert_eq!(h.scaler.actions().len(), 1);
    }

    #[test]
    fn cancel_pending_action() {
        let h = harness();
        h.scaler.register_target(web()).unwrap();
        h.source.set(&TargetId::new("web"), Utilization::new().with_cpu(100.0));
        h.scaler.run_collection_cycle();
        let id = h.scaler.run_decision_cycle()[0].id;

        assert!(h.scaler.cancel_scaling_action(id));
        assert!(!h.scaler.cancel_scaling_action(id));
        assert!(!h.scaler.cancel_scaling_action(ActionId::new()));
        assert_eq!(h.scaler.action(id).unwrap().status, ActionStatus::Cancelled);
    }

    #[tokio::test]
    async fn execution_cycle_applies_actions() {
        let h = harness();
        h.scaler.register_target(web()).unwrap();
        h.source.set(&TargetId::new("web"), Utilization::new().with_cpu(90.0));
        h.scaler.run_collection_cycle();
        h.scaler.run_decision_cycle();

        let report = h.scaler.run_execution_cycle().await;
        assert_eq!(report.completed, 1);
        assert_eq!(h.backend.calls().len(), 1);
        assert_eq!(h.scaler.target(&TargetId::new("web")).unwrap().current_instances, 3);
    }

    #[tokio::test]
    async fn statistics_snapshot() {
        let h = harness();
        h.scaler.register_target(web()).unwrap();
        h.scaler
            .register_target(
                ScalingTarget::builder("cache", ResourceKind::Cache)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        h.source.set(
            &TargetId::new("web"),
            Utilization::new().with_cpu(90.0).with_response_time(120.0),
        );
        h.source.set(
            &TargetId::new("cache"),
            Utilization::new().with_memory(50.0).with_response_time(40.0),
        );
        h.scaler.run_collection_cycle();
        h.scaler.run_decision_cycle();
        h.scaler.run_execution_cycle().await;

        let stats = h.scaler.get_scaling_statistics();
        let ids: Vec<&str> = stats.targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["cache", "web"]);
        assert_eq!(stats.actions.len(), 1);
        assert_eq!(stats.action_counts.completed, 1);
        assert!((stats.total_completed_cost - 0.10).abs() < 1e-12);
        assert!((stats.average_response_time - 80.0).abs() < 1e-12);
        assert_eq!(stats.recent_metrics.len(), 2);
        assert_eq!(stats.generated_at, h.clock.now());
    }

    #[test]
    fn empty_statistics() {
        let h = harness();
        let stats = h.scaler.get_scaling_statistics();
        assert!(stats.targets.is_empty());
        assert!(stats.actions.is_empty());
        assert!(stats.patterns.is_empty());
        assert!(stats.average_response_time.abs() < f64::EPSILON);
        assert!(stats.total_completed_cost.abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn start_stop_lifecycle() {
        let h = harness();
        assert!(!h.scaler.is_running());

        h.scaler.start().unwrap();
        assert!(h.scaler.is_running());
        assert!(matches!(h.scaler.start(), Err(ScalingError::AlreadyRunning)));

        h.scaler.stop().await.unwrap();
        assert!(!h.scaler.is_running());
        assert!(matches!(h.scaler.stop().await, Err(ScalingError::NotRunning)));

        h.scaler.start().unwrap();
        h.scaler.stop().await.unwrap();
    }
}

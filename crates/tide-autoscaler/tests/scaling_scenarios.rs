//! End-to-end scaling scenarios driven through the public service API.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use tide_autoscaler::{
    ActionStatus, ActionType, AutoScaler, DecisionConfig, DecisionEngine, LoadPattern, ManualClock,
    PatternType, Priority, Recommendation, RecordingBackend, ResourceKind, ScalingTarget,
    StaticCostModel, TargetId,
};
use tide_metrics::{MetricSample, ScriptedMetricsSource, StaticMetricsSource, Utilization};

fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-04T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

struct Fleet {
    source: Arc<StaticMetricsSource>,
    backend: Arc<RecordingBackend>,
    clock: Arc<ManualClock>,
    scaler: AutoScaler,
}

impl Fleet {
    fn new() -> Self {
        let source = Arc::new(StaticMetricsSource::new());
        let backend = Arc::new(RecordingBackend::new());
        let clock = Arc::new(ManualClock::new(base_time()));
        let scaler = AutoScaler::builder(source.clone(), backend.clone())
            .clock(clock.clone())
            .build()
            .unwrap();
        Self {
            source,
            backend,
            clock,
            scaler,
        }
    }

    fn observe(&self, id: &str, reading: Utilization) {
        self.source.set(&TargetId::new(id), reading);
        self.scaler.run_collection_cycle();
    }
}

#[test]
fn overloaded_target_scales_up_critically() {
    let fleet = Fleet::new();
    fleet
        .scaler
        .register_target(
            ScalingTarget::builder("api", ResourceKind::Compute)
                .min_instances(1)
                .max_instances(10)
                .current_instances(2)
                .thresholds(30.0, 80.0)
                .build()
                .unwrap(),
        )
        .unwrap();
    fleet.observe("api", Utilization::new().with_cpu(100.0));

    let actions = fleet.scaler.run_decision_cycle();
    assert_eq!(actions.len(), 1);
    let action = &actions[0];
    assert_eq!(action.action_type, ActionType::ScaleUp);
    assert_eq!(action.current_instances, 2);
    assert_eq!(action.target_instances, 3);
    assert_eq!(action.priority, Priority::Critical);
    assert_eq!(action.status, ActionStatus::Pending);
    assert!((action.estimated_cost - 0.10).abs() < 1e-12);
    assert_eq!(action.estimated_time, Duration::from_secs(180));
}

#[test]
fn idle_target_scales_down_with_low_priority() {
    let fleet = Fleet::new();
    fleet
        .scaler
        .register_target(
            ScalingTarget::builder("batch", ResourceKind::Compute)
                .min_instances(2)
                .current_instances(5)
                .thresholds(30.0, 80.0)
                .build()
                .unwrap(),
        )
        .unwrap();
    fleet.observe("batch", Utilization::new().with_cpu(20.0));

    let actions = fleet.scaler.run_decision_cycle();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_type, ActionType::ScaleDown);
    assert_eq!(actions[0].target_instances, 4);
    assert_eq!(actions[0].priority, Priority::Low);
}

#[test]
fn idle_target_at_minimum_stays() {
    let fleet = Fleet::new();
    fleet
        .scaler
        .register_target(
            ScalingTarget::builder("batch", ResourceKind::Compute)
                .min_instances(2)
                .current_instances(2)
                .build()
                .unwrap(),
        )
        .unwrap();
    fleet.observe("batch", Utilization::new().with_cpu(5.0));

    assert!(fleet.scaler.run_decision_cycle().is_empty());
}

#[test]
fn cyclical_peak_hour_scales_up_predictively() {
    let engine = DecisionEngine::new(
        DecisionConfig::default(),
        Arc::new(StaticCostModel::new()),
        Duration::from_secs(600),
    );
    let target = ScalingTarget::builder("web", ResourceKind::Compute)
        .current_instances(3)
        .thresholds(30.0, 80.0)
        .build()
        .unwrap();
    let pattern = LoadPattern {
        target_id: target.id.clone(),
        pattern_type: PatternType::Cyclical,
        confidence: 0.7,
        peak_hours: BTreeSet::from([9, 10, 11]),
        average_load: 50.0,
        peak_load: 90.0,
        recommendation: Recommendation::Predictive,
        last_analyzed: base_time(),
        coefficient_of_variation: 0.2,
        trend: 0.0,
        autocorrelation: 0.7,
        sample_count: 48,
    };
    let sample = MetricSample::new(
        target.id.clone(),
        base_time(),
        Utilization::new().with_cpu(50.0),
    );

    let at_peak = engine
        .decide(&target, Some(&sample), Some(&pattern), base_time())
        .unwrap();
    assert_eq!(at_peak.action_type, ActionType::ScaleUp);
    assert_eq!(at_peak.target_instances, 4);
    assert_eq!(at_peak.priority, Priority::Medium);

    let afternoon = base_time() + chrono::Duration::hours(4);
    assert!(engine
        .decide(&target, Some(&sample), Some(&pattern), afternoon)
        .is_none());
}

#[tokio::test]
async fn cooldown_blocks_until_elapsed() {
    let fleet = Fleet::new();
    fleet
        .scaler
        .register_target(
            ScalingTarget::builder("api", ResourceKind::Compute)
                .current_instances(2)
                .cooldown(Duration::from_secs(300))
                .build()
                .unwrap(),
        )
        .unwrap();
    fleet.observe("api", Utilization::new().with_cpu(90.0));

    assert_eq!(fleet.scaler.run_decision_cycle().len(), 1);
    let report = fleet.scaler.run_execution_cycle().await;
    assert_eq!(report.completed, 1);

    fleet.clock.advance(chrono::Duration::seconds(299));
    assert!(fleet.scaler.run_decision_cycle().is_empty());

    fleet.clock.advance(chrono::Duration::seconds(1));
    let actions = fleet.scaler.run_decision_cycle();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].current_instances, 3);
    assert_eq!(actions[0].target_instances, 4);
}

#[tokio::test]
async fn one_action_in_flight_per_target() {
    let fleet = Fleet::new();
    fleet
        .scaler
        .register_target(
            ScalingTarget::builder("api", ResourceKind::Compute)
                .current_instances(2)
                .cooldown(Duration::ZERO)
                .build()
                .unwrap(),
        )
        .unwrap();
    fleet.observe("api", Utilization::new().with_cpu(95.0));

    let first = fleet.scaler.run_decision_cycle();
    let again = fleet.scaler.run_decision_cycle();
    assert_eq!(first.len(), 1);
    assert!(again.is_empty());
    assert_eq!(fleet.scaler.actions().len(), 1);

    fleet.scaler.run_execution_cycle().await;
    assert_eq!(fleet.backend.calls().len(), 1);

    // once finished, the target is free for a new decision
    assert_eq!(fleet.scaler.run_decision_cycle().len(), 1);
}

#[tokio::test]
async fn execution_cycle_with_nothing_pending_is_a_no_op() {
    let fleet = Fleet::new();
    fleet
        .scaler
        .register_target(
            ScalingTarget::builder("api", ResourceKind::Compute)
                .current_instances(2)
                .build()
                .unwrap(),
        )
        .unwrap();

    let report = fleet.scaler.run_execution_cycle().await;
    assert_eq!((report.completed, report.failed, report.skipped), (0, 0, 0));
    assert!(fleet.backend.calls().is_empty());
    assert_eq!(
        fleet.scaler.target(&TargetId::new("api")).unwrap().current_instances,
        2
    );
}

#[tokio::test]
async fn backend_failure_leaves_target_unchanged() {
    let fleet = Fleet::new();
    fleet
        .scaler
        .register_target(
            ScalingTarget::builder("api", ResourceKind::Compute)
                .current_instances(2)
                .build()
                .unwrap(),
        )
        .unwrap();
    fleet.backend.fail(&TargetId::new("api"));
    fleet.observe("api", Utilization::new().with_cpu(90.0));

    let id = fleet.scaler.run_decision_cycle()[0].id;
    let report = fleet.scaler.run_execution_cycle().await;
    assert_eq!(report.failed, 1);

    let action = fleet.scaler.action(id).unwrap();
    assert_eq!(action.status, ActionStatus::Failed);
    assert!(action.error.is_some());
    let target = fleet.scaler.target(&TargetId::new("api")).unwrap();
    assert_eq!(target.current_instances, 2);
    assert!(target.last_action_time.is_none());
}

#[tokio::test]
async fn paused_target_is_ignored_until_resumed() {
    let fleet = Fleet::new();
    let id = TargetId::new("api");
    fleet
        .scaler
        .register_target(
            ScalingTarget::builder("api", ResourceKind::Compute)
                .current_instances(2)
                .build()
                .unwrap(),
        )
        .unwrap();
    fleet.observe("api", Utilization::new().with_cpu(99.0));

    fleet.scaler.pause_scaling(&id).unwrap();
    assert!(fleet.scaler.run_decision_cycle().is_empty());

    fleet.scaler.resume_scaling(&id).unwrap();
    assert_eq!(fleet.scaler.run_decision_cycle().len(), 1);

    fleet.scaler.set_maintenance(&id).unwrap();
    let report = fleet.scaler.run_execution_cycle().await;
    assert_eq!(report.skipped, 1);
    assert!(fleet.backend.calls().is_empty());
}

#[test]
fn periodic_load_is_classified_cyclical() {
    let source = Arc::new(ScriptedMetricsSource::new());
    let clock = Arc::new(ManualClock::new(base_time()));
    let scaler = AutoScaler::builder(source.clone(), Arc::new(RecordingBackend::new()))
        .clock(clock.clone())
        .build()
        .unwrap();
    scaler
        .register_target(ScalingTarget::builder("web", ResourceKind::Compute).build().unwrap())
        .unwrap();

    let wave: Vec<f64> = (0u8..12)
        .map(|i| 50.0 + 10.0 * (std::f64::consts::TAU * f64::from(i) / 12.0).sin())
        .collect();
    source.script_cpu(&TargetId::new("web"), &wave);

    for _ in 0..48 {
        scaler.run_collection_cycle();
        clock.advance(chrono::Duration::seconds(30));
    }
    let report = scaler.run_analysis_cycle();
    assert_eq!((report.analyzed, report.skipped), (1, 0));

    let pattern = scaler.pattern(&TargetId::new("web")).unwrap();
    assert_eq!(pattern.pattern_type, PatternType::Cyclical);
    assert_eq!(pattern.recommendation, Recommendation::Predictive);
    assert_eq!(pattern.sample_count, 48);
}

#[test]
fn analysis_waits_for_enough_samples() {
    let fleet = Fleet::new();
    fleet
        .scaler
        .register_target(ScalingTarget::builder("api", ResourceKind::Compute).build().unwrap())
        .unwrap();
    fleet.observe("api", Utilization::new().with_cpu(50.0));

    let report = fleet.scaler.run_analysis_cycle();
    assert_eq!((report.analyzed, report.skipped), (0, 1));
    assert!(fleet.scaler.pattern(&TargetId::new("api")).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn statistics_snapshots_are_consistent() {
    let fleet = Arc::new(Fleet::new());
    fleet
        .scaler
        .register_target(
            ScalingTarget::builder("api", ResourceKind::Compute)
                .max_instances(50)
                .current_instances(2)
                .cooldown(Duration::ZERO)
                .build()
                .unwrap(),
        )
        .unwrap();
    fleet.observe("api", Utilization::new().with_cpu(100.0));

    let driver = {
        let fleet = Arc::clone(&fleet);
        tokio::spawn(async move {
            for _ in 0..20 {
                fleet.scaler.run_decision_cycle();
                fleet.scaler.run_execution_cycle().await;
                tokio::task::yield_now().await;
            }
        })
    };

    while !driver.is_finished() {
        let stats = fleet.scaler.get_scaling_statistics();
        let completed = stats
            .actions
            .iter()
            .filter(|a| a.status == ActionStatus::Completed)
            .count();
        let current = stats.targets[0].current_instances as usize;
        assert_eq!(current, 2 + completed);
        tokio::task::yield_now().await;
    }
    driver.await.unwrap();

    let stats = fleet.scaler.get_scaling_statistics();
    assert_eq!(stats.targets[0].current_instances, 22);
    assert_eq!(stats.action_counts.completed, 20);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn instances_stay_within_bounds(loads in prop::collection::vec(0.0f64..150.0, 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let fleet = Fleet::new();
        fleet
            .scaler
            .register_target(
                ScalingTarget::builder("api", ResourceKind::Compute)
                    .min_instances(2)
                    .max_instances(6)
                    .current_instances(3)
                    .cooldown(Duration::ZERO)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        for load in loads {
            fleet.observe("api", Utilization::new().with_cpu(load));
            fleet.scaler.run_decision_cycle();
            runtime.block_on(fleet.scaler.run_execution_cycle());

            let target = fleet.scaler.target(&TargetId::new("api")).unwrap();
            prop_assert!((2..=6).contains(&target.current_instances));
        }

        for action in fleet.scaler.actions() {
            prop_assert_eq!(action.delta().abs(), 1);
        }
    }
}

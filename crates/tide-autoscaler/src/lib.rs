//! Adaptive autoscaling engine for Tide.
#![forbid(unsafe_code)]
//!
//! `tide-autoscaler` turns utilization samples into scaling actions. Each
//! registered [`ScalingTarget`] is sampled by the collector, classified into a
//! [`LoadPattern`] by the [`PatternAnalyzer`], judged by the
//! [`DecisionEngine`], and resized through a [`ScalingBackend`] by the
//! [`ActionExecutor`]. The [`AutoScaler`] service ties these together and runs
//! each stage on its own cadence.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tide_autoscaler::{
//!     ActionType, AutoScaler, LoggingBackend, Priority, ResourceKind, ScalingTarget,
//! };
//! use tide_metrics::{StaticMetricsSource, TargetId, Utilization};
//!
//! let source = Arc::new(StaticMetricsSource::new());
//! let scaler = AutoScaler::builder(source.clone(), Arc::new(LoggingBackend)).build().unwrap();
//!
//! let web = ScalingTarget::builder("web", ResourceKind::Compute)
//!     .max_instances(10)
//!     .current_instances(2)
//!     .build()
//!     .unwrap();
//! scaler.register_target(web).unwrap();
//!
//! source.set(&TargetId::new("web"), Utilization::new().with_cpu(100.0));
//! scaler.run_collection_cycle();
//!
//! let actions = scaler.run_decision_cycle();
//! assert_eq!(actions[0].action_type, ActionType::ScaleUp);
//! assert_eq!(actions[0].target_instances, 3);
//! assert_eq!(actions[0].priority, Priority::Critical);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod analyzer;
pub mod backend;
pub mod clock;
pub mod config;
pub mod cost;
pub mod decision;
pub mod error;
pub mod executor;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod types;

pub use analyzer::{PatternAnalyzer, SeriesStats};
pub use backend::{BackendCall, BackendFuture, LoggingBackend, RecordingBackend, ScalingBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AnalyzerConfig, AutoScalerConfig, DecisionConfig, ExecutionMode, ExecutorConfig, SchedulerConfig,
};
pub use cost::{CostModel, StaticCostModel};
pub use decision::DecisionEngine;
pub use error::{AnalysisError, Result, ScalingError};
pub use executor::{ActionExecutor, ExecutionReport};
pub use registry::{ActionRegistry, TargetRegistry};
pub use scheduler::Ticker;
pub use service::{ActionCounts, AnalysisReport, AutoScaler, AutoScalerBuilder, ScalingStatistics};
pub use types::{
    ActionId, ActionStatus, ActionType, LoadPattern, PatternType, Priority, Recommendation,
    ResourceKind, ScalingAction, ScalingTarget, ScalingTargetBuilder, TargetId, TargetStatus,
};

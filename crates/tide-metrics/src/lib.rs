//! Utilization sampling for Tide scaling targets.
#![forbid(unsafe_code)]
//!
//! `tide-metrics` owns the sampling side of the autoscaler: a pluggable
//! [`MetricsSource`] probe, the [`MetricSample`] record it produces, and the
//! bounded per-target [`SampleHistory`] the [`MetricsCollector`] appends to.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tide_metrics::{MetricsCollector, RetentionPolicy, StaticMetricsSource, TargetId, Utilization};
//!
//! let source = Arc::new(StaticMetricsSource::new());
//! let web = TargetId::new("web");
//! source.set(&web, Utilization::new().with_cpu(72.5));
//!
//! let collector = MetricsCollector::new(source, RetentionPolicy::default());
//! let report = collector.collect_once(&[web.clone()], chrono::Utc::now());
//! assert_eq!(report.collected, 1);
//! assert!(collector.latest(&web).is_some());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod collector;
pub mod duration_secs;
pub mod error;
pub mod history;
pub mod source;
pub mod types;

pub use collector::{CollectionReport, MetricsCollector};
pub use error::{MetricsError, Result};
pub use history::{RetentionPolicy, SampleHistory};
pub use source::{MetricsSource, ScriptedMetricsSource, StaticMetricsSource};
pub use types::{Dimension, MetricSample, TargetId, Utilization};

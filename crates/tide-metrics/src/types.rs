//! Core sample types.
//!
//! - [`TargetId`]: identity of a scalable resource pool
//! - [`Utilization`]: one probe reading across all tracked dimensions
//! - [`MetricSample`]: a timestamped reading for a target

use std::fmt;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

/// Unique identifier for a scaling target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Creates a new target ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named utilization dimension reported by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// CPU utilization percentage.
    Cpu,
    /// Memory utilization percentage.
    Memory,
    /// Requests per second.
    RequestRate,
    /// Mean response time in milliseconds.
    ResponseTime,
    /// Error rate percentage.
    ErrorRate,
    /// Items waiting to be processed.
    QueueDepth,
    /// Open client connections.
    ActiveConnections,
}

impl Dimension {
    /// All dimensions, in reporting order.
    pub const ALL: [Self; 7] = [
        Self::Cpu,
        Self::Memory,
        Self::RequestRate,
        Self::ResponseTime,
        Self::ErrorRate,
        Self::QueueDepth,
        Self::ActiveConnections,
    ];

    /// Returns the wire name of this dimension.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::RequestRate => "request_rate",
            Self::ResponseTime => "response_time",
            Self::ErrorRate => "error_rate",
            Self::QueueDepth => "queue_depth",
            Self::ActiveConnections => "active_connections",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One probe reading. All values are non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Utilization {
    /// CPU utilization percentage (0-100).
    pub cpu: f64,
    /// Memory utilization percentage (0-100).
    pub memory: f64,
    /// Requests per second.
    pub request_rate: f64,
    /// Mean response time in milliseconds.
    pub response_time: f64,
    /// Error rate percentage.
    pub error_rate: f64,
    /// Items waiting to be processed.
    pub queue_depth: f64,
    /// Open client connections.
    pub active_connections: f64,
}

impl Utilization {
    /// Creates an all-zero reading.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets CPU utilization.
    #[must_use]
    pub const fn with_cpu(mut self, cpu: f64) -> Self {
        self.cpu = cpu;
        self
    }

    /// Sets memory utilization.
    #[must_use]
    pub const fn with_memory(mut self, memory: f64) -> Self {
        self.memory = memory;
        self
    }

    /// Sets the request rate.
    #[must_use]
    pub const fn with_request_rate(mut self, rate: f64) -> Self {
        self.request_rate = rate;
        self
    }

    /// Sets the response time.
    #[must_use]
    pub const fn with_response_time(mut self, millis: f64) -> Self {
        self.response_time = millis;
        self
    }

    /// Sets the error rate.
    #[must_use]
    pub const fn with_error_rate(mut self, rate: f64) -> Self {
        self.error_rate = rate;
        self
    }

    /// Sets the queue depth.
    #[must_use]
    pub const fn with_queue_depth(mut self, depth: f64) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Sets the active connection count.
    #[must_use]
    pub const fn with_active_connections(mut self, connections: f64) -> Self {
        self.active_connections = connections;
        self
    }

    /// Returns the value of a single dimension.
    #[must_use]
    pub const fn value(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Cpu => self.cpu,
            Dimension::Memory => self.memory,
            Dimension::RequestRate => self.request_rate,
            Dimension::ResponseTime => self.response_time,
            Dimension::ErrorRate => self.error_rate,
            Dimension::QueueDepth => self.queue_depth,
            Dimension::ActiveConnections => self.active_connections,
        }
    }

    /// Checks that every dimension is finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidSample`] naming the first bad dimension.
    pub fn validate(&self) -> Result<()> {
        for dimension in Dimension::ALL {
            let value = self.value(dimension);
            if !value.is_finite() {
                return Err(MetricsError::InvalidSample {
                    reason: format!("{dimension} is not finite"),
                });
            }
            if value < 0.0 {
                return Err(MetricsError::InvalidSample {
                    reason: format!("{dimension} is negative ({value})"),
                });
            }
        }
        Ok(())
    }
}

/// A timestamped reading for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Target this sample belongs to.
    pub target_id: TargetId,
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// The probe reading.
    pub utilization: Utilization,
}

impl MetricSample {
    /// Creates a new sample.
    #[must_use]
    pub const fn new(target_id: TargetId, timestamp: DateTime<Utc>, utilization: Utilization) -> Self {
        Self {
            target_id,
            timestamp,
            utilization,
        }
    }

    /// Returns the value of a single dimension.
    #[must_use]
    pub const fn value(&self, dimension: Dimension) -> f64 {
        self.utilization.value(dimension)
    }

    /// Hour of day (UTC) the sample was taken in.
    #[must_use]
    pub fn hour(&self) -> u8 {
        self.timestamp.hour() as u8
    }
}

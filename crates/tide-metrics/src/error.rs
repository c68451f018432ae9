//! Error types for the tide-metrics crate.

use thiserror::Error;

/// Errors that can occur while sampling or storing metrics.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricsError {
    /// The probe could not produce a reading for a target.
    #[error("collection failed for {target}: {reason}")]
    CollectionError {
        /// Target the probe was asked about.
        target: String,
        /// Why the probe failed.
        reason: String,
    },

    /// A reading contained a negative or non-finite dimension.
    #[error("invalid sample: {reason}")]
    InvalidSample {
        /// Which dimension was rejected and why.
        reason: String,
    },

    /// The retention policy cannot hold any samples.
    #[error("invalid retention policy: {reason}")]
    InvalidRetention {
        /// Why the policy is invalid.
        reason: String,
    },
}

/// Result type for metrics operations.
pub type Result<T> = std::result::Result<T, MetricsError>;

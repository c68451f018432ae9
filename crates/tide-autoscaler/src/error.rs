//! Error types for the autoscaler.

use std::time::Duration;

use thiserror::Error;

use tide_metrics::MetricsError;

use crate::types::{ActionId, ActionStatus};

/// Result type for autoscaler operations.
pub type Result<T> = std::result::Result<T, ScalingError>;

/// Why a pattern could not be computed this cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// Not enough history to classify the target.
    #[error("insufficient samples: need {required}, have {available}")]
    InsufficientSamples {
        /// Minimum sample count configured.
        required: usize,
        /// Samples currently retained.
        available: usize,
    },
}

/// Errors that can occur in the autoscaler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScalingError {
    /// A target definition or engine setting is invalid.
    #[error("invalid configuration: {reason}")]
    Configuration {
        /// Description of why the configuration is invalid.
        reason: String,
    },

    /// No target is registered under this ID.
    #[error("scaling target not found: {target_id}")]
    TargetNotFound {
        /// ID that was looked up.
        target_id: String,
    },

    /// No action is registered under this ID.
    #[error("scaling action not found: {action_id}")]
    ActionNotFound {
        /// ID that was looked up.
        action_id: ActionId,
    },

    /// The target already has a pending or in-progress action.
    #[error("target {target_id} already has an action in flight")]
    ActionInFlight {
        /// Target with the outstanding action.
        target_id: String,
    },

    /// An action was asked to move to a state its current state cannot reach.
    #[error("action {action_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// Action being transitioned.
        action_id: ActionId,
        /// Current status.
        from: ActionStatus,
        /// Requested status.
        to: ActionStatus,
    },

    /// Pattern analysis was skipped.
    #[error("analysis skipped: {0}")]
    Analysis(#[from] AnalysisError),

    /// The scaling backend reported a failure.
    #[error("execution failed for {target_id}: {reason}")]
    Execution {
        /// Target being scaled.
        target_id: String,
        /// Backend error text.
        reason: String,
    },

    /// The scaling backend did not answer in time.
    #[error("execution for {target_id} timed out after {after:?}")]
    Timeout {
        /// Target being scaled.
        target_id: String,
        /// The bound that was exceeded.
        after: Duration,
    },

    /// `start` was called on a running service.
    #[error("autoscaler is already running")]
    AlreadyRunning,

    /// `stop` was called on a service that is not running.
    #[error("autoscaler is not running")]
    NotRunning,

    /// Metric collection failed.
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

impl ScalingError {
    /// Shorthand for a [`ScalingError::Configuration`].
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_configuration() {
        let err = ScalingError::config("min_instances (5) cannot exceed max_instances (2)");
        assert_eq!(
            err.to_string(),
            "invalid configuration: min_instances (5) cannot exceed max_instances (2)"
        );
    }

    #[test]
    fn error_display_target_not_found() {
        let err = ScalingError::TargetNotFound {
            target_id: "web".into(),
        };
        assert_eq!(err.to_string(), "scaling target not found: web");
    }

    #[test]
    fn error_display_insufficient_samples() {
        let err = ScalingError::from(AnalysisError::InsufficientSamples {
            required: 5,
            available: 2,
        });
        assert_eq!(
            err.to_string(),
            "analysis skipped: insufficient samples: need 5, have 2"
        );
    }

    #[test]
    fn error_display_timeout() {
        let err = ScalingError::Timeout {
            target_id: "db".into(),
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "execution for db timed out after 30s");
    }

    #[test]
    fn metrics_error_is_transparent() {
        let err = ScalingError::from(MetricsError::InvalidSample {
            reason: "cpu is negative".into(),
        });
        assert_eq!(err.to_string(), "invalid sample: cpu is negative");
    }

    #[test]
    fn error_clone_and_eq() {
        let err1 = ScalingError::ActionInFlight {
            target_id: "web".into(),
        };
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}

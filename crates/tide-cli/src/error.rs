//! CLI error types.

use thiserror::Error;
use tide_autoscaler::ScalingError;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The fleet file could not be used.
    #[error("invalid fleet file {path}: {reason}")]
    Fleet {
        /// Path of the fleet file.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Engine error.
    #[error(transparent)]
    Scaling(#[from] ScalingError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tide_autoscaler::AnalysisError;

    #[test]
    fn cli_error_display_fleet() {
        let err = CliError::Fleet {
            path: "fleet.json".into(),
            reason: "no targets".into(),
        };
        assert_eq!(err.to_string(), "invalid fleet file fleet.json: no targets");
    }

    #[test]
    fn cli_error_display_scaling_is_transparent() {
        let err = CliError::from(ScalingError::from(AnalysisError::InsufficientSamples {
            required: 5,
            available: 2,
        }));
        assert_eq!(
            err.to_string(),
            "analysis skipped: insufficient samples: need 5, have 2"
        );
    }

    #[test]
    fn cli_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err = CliError::from(io_err);
        assert!(matches!(cli_err, CliError::Io(_)));
    }
}

//! Error types for waterfall runs.
//!
//! A run fails in exactly one of these ways:
//! - the options were rejected before anything was scheduled
//! - another run was still in progress on the same executor
//! - a job failed (the remaining jobs are never executed)
//! - the wait state ran out of time

use std::fmt;
use std::time::Duration;

/// Errors that settle a waterfall run.
#[derive(Debug)]
pub enum WaterfallError {
    /// The run options failed validation. No job was executed.
    InvalidOptions(String),

    /// `exec` was called while another run on this executor was still active.
    AlreadyRunning,

    /// A job failed, either synchronously or when its future resolved.
    JobFailed {
        /// Zero-based position of the job within the run
        position: usize,
        /// The reason reported by the job
        source: anyhow::Error,
    },

    /// No new job arrived before `wait_timeout` elapsed.
    TimedOut {
        /// How long the executor had been waiting
        waited: Duration,
    },
}

impl fmt::Display for WaterfallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOptions(msg) => write!(f, "Invalid run options: {}", msg),
            Self::AlreadyRunning => write!(f, "A waterfall run is already in progress"),
            Self::JobFailed { position, source } => {
                write!(f, "Job {} failed: {}", position, source)
            }
            Self::TimedOut { waited } => {
                write!(f, "Waterfall timed out after waiting {} ms", waited.as_millis())
            }
        }
    }
}

impl std::error::Error for WaterfallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::JobFailed { source, .. } => {
                let source: &(dyn std::error::Error + 'static) = source.as_ref();
                Some(source)
            }
            _ => None,
        }
    }
}

impl WaterfallError {
    /// Create an invalid options error.
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }

    /// True when the run failed because the wait state timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// True when the run failed because one of its jobs failed.
    pub fn is_job_failure(&self) -> bool {
        matches!(self, Self::JobFailed { .. })
    }

    /// Position of the failed job, if this is a job failure.
    pub fn job_position(&self) -> Option<usize> {
        match self {
            Self::JobFailed { position, .. } => Some(*position),
            _ => None,
        }
    }
}

/// Result type for waterfall operations.
pub type WaterfallResult<T> = Result<T, WaterfallError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = WaterfallError::invalid_options("checkInterval must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Invalid run options: checkInterval must be greater than zero"
        );

        let err = WaterfallError::JobFailed {
            position: 2,
            source: anyhow::anyhow!("boom"),
        };
        assert_eq!(err.to_string(), "Job 2 failed: boom");

        let err = WaterfallError::TimedOut {
            waited: Duration::from_millis(500),
        };
        assert_eq!(err.to_string(), "Waterfall timed out after waiting 500 ms");
    }

    #[test]
    fn test_timeout_is_not_job_failure() {
        let err = WaterfallError::TimedOut {
            waited: Duration::from_secs(1),
        };
        assert!(err.is_timeout());
        assert!(!err.is_job_failure());
        assert_eq!(err.job_position(), None);
    }

    #[test]
    fn test_job_failure_exposes_source() {
        let err = WaterfallError::JobFailed {
            position: 0,
            source: anyhow::anyhow!("disk full"),
        };
        assert!(err.is_job_failure());
        assert_eq!(err.job_position(), Some(0));
        assert_eq!(err.source().map(|s| s.to_string()), Some("disk full".to_string()));
    }
}

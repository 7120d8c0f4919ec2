//! Error types for the epochtrack-core crate.

use thiserror::Error;

/// Top-level error type for tracking operations.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sink lock poisoned: {0}")]
    Poisoned(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl TrackError {
    pub fn poisoned(msg: impl Into<String>) -> Self {
        Self::Poisoned(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<Box<figment::Error>> for TrackError {
    fn from(err: Box<figment::Error>) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result alias for tracking operations.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Failure raised by a learning-rate schedule.
///
/// Never escapes the extraction layer: a failing schedule simply means no
/// learning-rate point is recorded for that epoch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("Invalid schedule parameter: {0}")]
    InvalidParameter(String),

    #[error("Schedule evaluation failed at step {step}: {reason}")]
    Evaluation { step: u64, reason: String },
}

impl ScheduleError {
    pub fn evaluation(step: u64, reason: impl Into<String>) -> Self {
        Self::Evaluation {
            step,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            TrackError::invalid_input("empty name").to_string(),
            "Invalid input: empty name"
        );
        assert_eq!(
            ScheduleError::evaluation(7, "overflow").to_string(),
            "Schedule evaluation failed at step 7: overflow"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TrackError = io.into();
        assert!(matches!(err, TrackError::Io(_)));
    }
}

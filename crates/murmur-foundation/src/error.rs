use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Component busy, operation skipped: {component}")]
    Busy { component: String },

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),

    #[error("Transient error, will retry: {0}")]
    Transient(String),
}

/// Errors surfaced by the capture collaborator feeding the audio thread.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture source exhausted")]
    Exhausted,

    #[error("No audio data for {duration:?}")]
    NoDataTimeout { duration: Duration },

    #[error("Frame size mismatch: expected {expected} samples, got {got}")]
    FrameSize { expected: usize, got: usize },

    #[error("Capture device error: {0}")]
    Device(String),
}

#[derive(Debug, Clone)]
pub enum RecoveryStrategy {
    Retry { max_attempts: u32, delay: Duration },
    Ignore,
    Restart,
    Fatal,
}

impl AppError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            AppError::Capture(CaptureError::NoDataTimeout { .. }) => RecoveryStrategy::Retry {
                max_attempts: 5,
                delay: Duration::from_secs(2),
            },
            AppError::Busy { .. } => RecoveryStrategy::Ignore,
            AppError::Transient(_) => RecoveryStrategy::Retry {
                max_attempts: 3,
                delay: Duration::from_millis(500),
            },
            AppError::Fatal(_) | AppError::ShutdownRequested => RecoveryStrategy::Fatal,
            _ => RecoveryStrategy::Restart,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_is_ignored() {
        let err = AppError::Busy {
            component: "wake".into(),
        };
        assert!(matches!(err.recovery_strategy(), RecoveryStrategy::Ignore));
    }

    #[test]
    fn fatal_is_fatal() {
        assert!(matches!(
            AppError::Fatal("boom".into()).recovery_strategy(),
            RecoveryStrategy::Fatal
        ));
    }
}

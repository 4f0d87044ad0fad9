use thiserror::Error;

/// Errors that can occur while negotiating, starting, or running a capture.
///
/// Every variant is surfaced synchronously from `start_*` (or through an
/// `Error` lifecycle event for runtime failures) and is never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("invalid handle")]
    InvalidHandle,

    #[error("capture already running")]
    AlreadyRunning,

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("audio interface activation timed out")]
    ActivationTimeout,

    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailure(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("finalize failed: {0}")]
    FinalizeFailure(String),

    #[error("start failed: {0}")]
    StartFailure(String),

    #[error("capture failed: {0}")]
    CaptureFailed(String),
}

impl CaptureError {
    /// Return code reported across the C boundary.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidHandle => -1,
            Self::AlreadyRunning => -2,
            Self::SourceUnavailable(_) | Self::ActivationTimeout | Self::FormatNegotiationFailure(_) => -3,
            Self::InvalidConfiguration(_) | Self::FinalizeFailure(_) => -4,
            Self::StartFailure(_) | Self::CaptureFailed(_) => -5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_errors_share_a_code() {
        assert_eq!(CaptureError::SourceUnavailable("gone".into()).code(), -3);
        assert_eq!(CaptureError::ActivationTimeout.code(), -3);
        assert_eq!(CaptureError::FormatNegotiationFailure("no mix format".into()).code(), -3);
    }

    #[test]
    fn lifecycle_codes() {
        assert_eq!(CaptureError::InvalidHandle.code(), -1);
        assert_eq!(CaptureError::AlreadyRunning.code(), -2);
        assert_eq!(CaptureError::FinalizeFailure("x".into()).code(), -4);
        assert_eq!(CaptureError::StartFailure("x".into()).code(), -5);
    }
}

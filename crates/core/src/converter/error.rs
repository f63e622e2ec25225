//! Error types for the converter module.

use thiserror::Error;

/// Errors that can occur while setting up or running a conversion.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// The ffmpeg executable could not be located.
    #[error("{name} not found: {reason}")]
    ToolNotFound { name: String, reason: String },

    /// The conversion request is not acceptable.
    #[error("Invalid conversion request: {reason}")]
    InvalidRequest { reason: String },

    /// The ffmpeg process could not be launched, or its stdout could not be attached.
    #[error("Failed to start ffmpeg: {reason}")]
    ProcessStartFailure {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The ffmpeg process failed, or waiting on it failed.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    /// Conversion exceeded the configured timeout.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Conversion was cancelled by the caller.
    #[error("Conversion cancelled")]
    Cancelled,
}

impl ConverterError {
    /// Creates a new tool-not-found error.
    pub fn tool_not_found(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolNotFound {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new invalid request error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Creates a new process start failure.
    pub fn process_start(reason: impl Into<String>, source: Option<std::io::Error>) -> Self {
        Self::ProcessStartFailure {
            reason: reason.into(),
            source,
        }
    }

    /// Creates a new conversion failed error without exit details.
    pub fn conversion_failed(reason: impl Into<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            exit_code: None,
            stderr: None,
        }
    }

    /// Creates a conversion failed error for a process that exited unsuccessfully.
    pub fn exited(exit_code: Option<i32>, stderr: Option<String>) -> Self {
        let reason = match exit_code {
            Some(code) => format!("ffmpeg exited with code {}", code),
            None => "ffmpeg terminated by signal".to_string(),
        };
        Self::ConversionFailed {
            reason,
            exit_code,
            stderr,
        }
    }

    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProcessStartFailure { .. } | Self::Timeout { .. }
        )
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolNotFound { .. } => "tool_not_found",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::ProcessStartFailure { .. } => "process_start_failure",
            Self::ConversionFailed { .. } => "conversion_failed",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exited_with_code() {
        let err = ConverterError::exited(Some(1), Some("Invalid data".to_string()));
        assert_eq!(err.to_string(), "Conversion failed: ffmpeg exited with code 1");
        match err {
            ConverterError::ConversionFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(stderr.as_deref(), Some("Invalid data"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_exited_by_signal() {
        let err = ConverterError::exited(None, None);
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn test_retryable() {
        assert!(ConverterError::process_start("boom", None).is_retryable());
        assert!(ConverterError::Timeout { timeout_secs: 5 }.is_retryable());
        assert!(!ConverterError::conversion_failed("bad").is_retryable());
        assert!(!ConverterError::tool_not_found("ffmpeg", "missing").is_retryable());
        assert!(!ConverterError::Cancelled.is_retryable());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ConverterError::Cancelled.kind(), "cancelled");
        assert_eq!(
            ConverterError::invalid_request("quality").kind(),
            "invalid_request"
        );
    }
}

//! Error types for the performance monitor.

use thiserror::Error;

/// Errors that can occur in the performance monitor.
///
/// The tracking operations themselves never return these; they surface only
/// from construction, lifecycle calls and sink delivery.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to serialize an event or report
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The analytics endpoint rejected an event
    #[error("Transport error: {0}")]
    Transport(String),

    /// Network error while delivering an event
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration could not be used
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Background tasks were requested outside a tokio runtime
    #[error("No tokio runtime available to start background tasks")]
    NoRuntime,

    /// An image failed to load
    #[error("Failed to load image: {src} (after {elapsed_ms:.1}ms)")]
    ImageLoad {
        /// Image source URL
        src: String,
        /// Time until failure in milliseconds
        elapsed_ms: f64,
    },
}

impl From<reqwest::Error> for TelemetryError {
    fn from(err: reqwest::Error) -> Self {
        TelemetryError::Network(err.to_string())
    }
}

/// Result type for monitor operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::NoRuntime;
        assert_eq!(
            err.to_string(),
            "No tokio runtime available to start background tasks"
        );

        let err = TelemetryError::Transport("status 503".to_string());
        assert_eq!(err.to_string(), "Transport error: status 503");

        let err = TelemetryError::ImageLoad {
            src: "/img/logo.png".to_string(),
            elapsed_ms: 12.34,
        };
        assert_eq!(
            err.to_string(),
            "Failed to load image: /img/logo.png (after 12.3ms)"
        );
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err: Result<(), serde_json::Error> =
            serde_json::from_str::<()>("invalid json");
        let telemetry_err: TelemetryError = json_err.unwrap_err().into();
        assert!(matches!(telemetry_err, TelemetryError::Serialization(_)));
    }
}

//! Transport-level error types.
//!
//! These errors describe faults of the duplex connection itself: failed
//! handshakes, unexpected closes, and I/O errors while streaming. They never
//! reach consumers as `Err` values; the streaming client turns them into
//! `Retrying`/`Failed` states and a human-readable last-error string.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Transport fault variants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The handshake with the endpoint failed.
    #[error("connection to '{endpoint}' failed: {message}")]
    ConnectFailed { endpoint: String, message: String },

    /// The server answered the upgrade request with a non-101 status.
    #[error("endpoint '{endpoint}' rejected the upgrade with HTTP {status}")]
    Rejected { endpoint: String, status: u16 },

    /// The endpoint URL could not be used.
    #[error("invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    /// The stream was closed by the peer.
    #[error("connection closed{}", format_close(*code, reason.as_deref()))]
    Closed {
        code: Option<u16>,
        reason: Option<String>,
    },

    /// I/O or protocol error on an established stream.
    #[error("stream error: {message}")]
    Stream { message: String },

    /// Writing an outbound frame failed.
    #[error("send failed: {message}")]
    SendFailed { message: String },

    /// An operation did not complete in time.
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },
}

fn format_close(code: Option<u16>, reason: Option<&str>) -> String {
    match (code, reason) {
        (Some(code), Some(reason)) if !reason.is_empty() => format!(" ({}: {})", code, reason),
        (Some(code), _) => format!(" ({})", code),
        (None, Some(reason)) if !reason.is_empty() => format!(" ({})", reason),
        _ => String::new(),
    }
}

impl TransportError {
    /// Whether the reconnection path should retry after this fault.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::ConnectFailed { .. } => true,
            TransportError::Rejected { status, .. } => *status >= 500 || *status == 429,
            TransportError::InvalidEndpoint { .. } => false,
            TransportError::Closed { .. } => true,
            TransportError::Stream { .. } => true,
            TransportError::SendFailed { .. } => true,
            TransportError::Timeout { .. } => true,
        }
    }

    /// Text suitable for display next to the connection indicator.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::ConnectFailed { .. } => {
                "Failed to create WebSocket connection".to_string()
            }
            TransportError::Rejected { status, .. } => {
                format!("Telemetry endpoint refused the connection (HTTP {})", status)
            }
            TransportError::InvalidEndpoint { endpoint, .. } => {
                format!("Telemetry endpoint '{}' is not a valid WebSocket URL", endpoint)
            }
            TransportError::Closed { .. } => "WebSocket connection closed".to_string(),
            TransportError::Stream { .. } => "WebSocket connection error".to_string(),
            TransportError::SendFailed { .. } => "Failed to send message to server".to_string(),
            TransportError::Timeout { operation, .. } => {
                format!("Telemetry {} timed out", operation)
            }
        }
    }

    /// Short code for log fields.
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportError::ConnectFailed { .. } => "E_TRANSPORT_CONN",
            TransportError::Rejected { .. } => "E_TRANSPORT_REJECTED",
            TransportError::InvalidEndpoint { .. } => "E_TRANSPORT_ENDPOINT",
            TransportError::Closed { .. } => "E_TRANSPORT_CLOSED",
            TransportError::Stream { .. } => "E_TRANSPORT_STREAM",
            TransportError::SendFailed { .. } => "E_TRANSPORT_SEND",
            TransportError::Timeout { .. } => "E_TRANSPORT_TIMEOUT",
        }
    }
}

/// Classify a tungstenite error raised while opening `endpoint`.
pub fn classify_connect_error(err: &tungstenite::Error, endpoint: &str) -> TransportError {
    match err {
        tungstenite::Error::Url(e) => TransportError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        },
        tungstenite::Error::Http(response) => TransportError::Rejected {
            endpoint: endpoint.to_string(),
            status: response.status().as_u16(),
        },
        tungstenite::Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => {
            TransportError::Timeout {
                operation: "connect".to_string(),
                duration_ms: 0,
            }
        }
        other => TransportError::ConnectFailed {
            endpoint: endpoint.to_string(),
            message: other.to_string(),
        },
    }
}

/// Classify a tungstenite error raised on an open stream.
pub fn classify_stream_error(err: &tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::Closed {
                code: None,
                reason: None,
            }
        }
        other => TransportError::Stream {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failed_is_retryable() {
        let err = TransportError::ConnectFailed {
            endpoint: "ws://localhost:8000/metrics".to_string(),
            message: "Connection refused".to_string(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.error_code(), "E_TRANSPORT_CONN");
        assert_eq!(err.user_message(), "Failed to create WebSocket connection");
    }

    #[test]
    fn test_rejected_retry_depends_on_status() {
        let server = TransportError::Rejected {
            endpoint: "ws://h/metrics".to_string(),
            status: 503,
        };
        let client = TransportError::Rejected {
            endpoint: "ws://h/metrics".to_string(),
            status: 404,
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn test_invalid_endpoint_not_retryable() {
        let err = TransportError::InvalidEndpoint {
            endpoint: "ftp://nope".to_string(),
            message: "unsupported scheme".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(err.user_message().contains("ftp://nope"));
    }

    #[test]
    fn test_closed_display() {
        let err = TransportError::Closed {
            code: Some(1001),
            reason: Some("going away".to_string()),
        };
        assert_eq!(err.to_string(), "connection closed (1001: going away)");

        let bare = TransportError::Closed {
            code: None,
            reason: None,
        };
        assert_eq!(bare.to_string(), "connection closed");
    }

    #[test]
    fn test_classify_stream_error_closed() {
        let err = classify_stream_error(&tungstenite::Error::ConnectionClosed);
        assert!(matches!(err, TransportError::Closed { .. }));
    }

    #[test]
    fn test_classify_connect_error_io() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = classify_connect_error(&tungstenite::Error::Io(io), "ws://127.0.0.1:1/metrics");
        match err {
            TransportError::ConnectFailed { endpoint, message } => {
                assert_eq!(endpoint, "ws://127.0.0.1:1/metrics");
                assert!(message.contains("refused"));
            }
            other => panic!("Expected ConnectFailed, got {:?}", other),
        }
    }
}

//! Error types for the DoorGuard client.
//!
//! Every failure a caller of the session can observe is one variant of
//! `DgError`. Precondition, timeout, connection-loss and device-reported
//! failures are kept distinct so callers can react to each differently.

use thiserror::Error;

/// Convenience type alias for Results using DgError.
pub type DgResult<T> = Result<T, DgError>;

/// Unified error type for the DoorGuard client.
#[derive(Error, Debug)]
pub enum DgError {
    // -- Session errors --
    /// The connection is not open; the request was never sent.
    #[error("not connected to device")]
    NotConnected,

    /// No matching response arrived within the call budget.
    #[error("request {request} timed out after {after_ms}ms")]
    Timeout {
        /// Request type that was sent.
        request: String,
        /// Budget that elapsed, in milliseconds.
        after_ms: u64,
    },

    /// The connection left the open state while the call was waiting.
    #[error("connection lost while waiting for {request}")]
    ConnectionLost {
        /// Request type that was sent.
        request: String,
    },

    /// The device answered with `success: false`.
    #[error("device reported failure: {0}")]
    Peer(String),

    /// A response payload did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    // -- Transport errors --
    /// Opening or using the transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A target address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DgError {
    /// Whether retrying the same call later could succeed.
    ///
    /// Device-reported failures are not retryable: the device understood
    /// the request and refused it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Timeout { .. } | Self::ConnectionLost { .. } | Self::Transport(_)
        )
    }
}

impl From<serde_json::Error> for DgError {
    fn from(e: serde_json::Error) -> Self {
        DgError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for DgError {
    fn from(e: toml::de::Error) -> Self {
        DgError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = DgError::Timeout {
            request: "lock_door".into(),
            after_ms: 5000,
        };
        assert_eq!(err.to_string(), "request lock_door timed out after 5000ms");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(DgError::NotConnected.is_retryable());
        assert!(DgError::ConnectionLost { request: "get_users".into() }.is_retryable());
        assert!(!DgError::Peer("User not found".into()).is_retryable());
        assert!(!DgError::Protocol("bad shape".into()).is_retryable());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: DgError = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, DgError::Serialization(_)));
    }
}

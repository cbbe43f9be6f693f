//! Error taxonomy for the streaming core.
//!
//! None of these escape a [`StreamSession`](crate::session::StreamSession):
//! the session logs them and folds them into its terminal `errored` state.

/// Message shown to the user when the push connection itself fails.
pub const CONNECTION_LOST_MESSAGE: &str = "Connection lost. Please try again.";

/// Connection-level failures of the push channel.
///
/// These are distinct from a domain `error` event sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be opened.
    #[error("failed to open push connection: {0}")]
    Connect(String),

    /// The server answered with a non-success status.
    #[error("push endpoint returned HTTP {0}")]
    Status(u16),

    /// Reading from an open connection failed.
    #[error("push connection read failed: {0}")]
    Read(String),

    /// The stream ended before a `done` or `error` event arrived.
    #[error("push connection dropped before completion")]
    Dropped,
}

impl TransportError {
    /// Best-effort static message for display.
    pub const fn user_message(&self) -> &'static str {
        CONNECTION_LOST_MESSAGE
    }
}

/// Crate-level error type.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The push connection failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A `done` or `meta` body was not valid JSON.
    #[error("malformed {channel} payload: {source}")]
    MalformedPayload {
        /// Channel the payload arrived on.
        channel: &'static str,
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// The node an operation targets is gone or detached.
    #[error("render target missing: {0}")]
    RenderTargetMissing(&'static str),
}

/// Convenience alias.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        assert_eq!(
            TransportError::Status(502).to_string(),
            "push endpoint returned HTTP 502"
        );
        assert_eq!(TransportError::Dropped.user_message(), CONNECTION_LOST_MESSAGE);
    }

    #[test]
    fn test_stream_error_from_transport() {
        let err: StreamError = TransportError::Dropped.into();
        assert!(matches!(err, StreamError::Transport(TransportError::Dropped)));
        assert!(err.to_string().contains("dropped"));
    }

    #[test]
    fn test_malformed_payload_keeps_source() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = StreamError::MalformedPayload { channel: "done", source };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("malformed done payload"));
    }
}

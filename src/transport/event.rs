//! Chunk events: Typed notifications normalized from raw wire events.

use crate::error::{StreamError, TransportError};
use serde_json::{Map, Value};
use tracing::warn;

/// Stand-in the server uses for real newlines in `message`/`error` data.
///
/// An inherited wire quirk; it is replaced verbatim.
pub const NEWLINE_SENTINEL: &str = "[newline]";

/// The four logical channels a transport subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Text delta.
    Message,
    /// Completion with a JSON payload.
    Done,
    /// Domain error text.
    Error,
    /// Auxiliary JSON annotations.
    Meta,
}

impl Channel {
    /// All subscribed channels.
    pub const ALL: [Self; 4] = [Self::Message, Self::Done, Self::Error, Self::Meta];

    /// Wire event name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Done => "done",
            Self::Error => "error",
            Self::Meta => "meta",
        }
    }

    /// Map a wire event name; unknown names are not subscribed.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|channel| channel.name() == name)
    }
}

/// A normalized push notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkEvent {
    /// Text delta, newline-decoded.
    Message {
        /// The delta.
        text: String,
    },
    /// Response complete.
    Done {
        /// Decoded body, `{}` if it was not valid JSON.
        payload: Value,
    },
    /// Server-reported error, newline-decoded.
    Error {
        /// The error text.
        text: String,
    },
    /// Auxiliary annotations.
    Meta {
        /// Decoded body, `{}` if it was not valid JSON.
        payload: Value,
    },
}

impl ChunkEvent {
    /// Normalize raw event data received on `channel`.
    pub fn normalize(channel: Channel, data: &str) -> Self {
        match channel {
            Channel::Message => Self::Message {
                text: decode_newlines(data),
            },
            Channel::Error => Self::Error {
                text: decode_newlines(data),
            },
            Channel::Done => Self::Done {
                payload: decode_payload(channel, data),
            },
            Channel::Meta => Self::Meta {
                payload: decode_payload(channel, data),
            },
        }
    }

    /// Whether this event ends the stream.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// What a transport delivers to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A normalized wire event.
    Chunk(ChunkEvent),
    /// The connection itself failed.
    Failed(TransportError),
}

/// Replace the newline sentinel with `\n`.
pub fn decode_newlines(data: &str) -> String {
    data.replace(NEWLINE_SENTINEL, "\n")
}

/// Best-effort JSON decode; malformed bodies become `{}` and are logged.
pub fn decode_payload(channel: Channel, data: &str) -> Value {
    serde_json::from_str(data).unwrap_or_else(|source| {
        let err = StreamError::MalformedPayload {
            channel: channel.name(),
            source,
        };
        warn!(error = %err, "falling back to empty payload");
        Value::Object(Map::new())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_names() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_name(channel.name()), Some(channel));
        }
        assert_eq!(Channel::from_name("ping"), None);
    }

    #[test]
    fn test_message_newline_sentinel() {
        let event = ChunkEvent::normalize(Channel::Message, "a[newline][newline]b");
        assert_eq!(event, ChunkEvent::Message { text: "a\n\nb".into() });
    }

    #[test]
    fn test_error_newline_sentinel() {
        let event = ChunkEvent::normalize(Channel::Error, "rate[newline]limited");
        assert_eq!(event, ChunkEvent::Error { text: "rate\nlimited".into() });
        assert!(event.is_terminal());
    }

    #[test]
    fn test_done_payload_parsed() {
        let event = ChunkEvent::normalize(Channel::Done, r#"{"id":"42"}"#);
        assert_eq!(event, ChunkEvent::Done { payload: json!({"id": "42"}) });
    }

    #[test]
    fn test_malformed_payload_becomes_empty_object() {
        let event = ChunkEvent::normalize(Channel::Meta, "{not json");
        assert_eq!(event, ChunkEvent::Meta { payload: json!({}) });
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_done_payload_does_not_decode_sentinel() {
        let event = ChunkEvent::normalize(Channel::Done, r#"{"note":"[newline]"}"#);
        assert_eq!(event, ChunkEvent::Done { payload: json!({"note": "[newline]"}) });
    }
}

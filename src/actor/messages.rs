//! Message types for actor communication.
//!
//! Worker threads never touch the document. They report back to the
//! engine, which applies results on its own thread.

use crate::dom::NodeId;
use crate::session::SessionId;
use serde_json::Value;
use std::time::Duration;

/// Results and requests posted to the engine by effect workers.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// A session started streaming.
    Begin {
        /// Source session.
        session: SessionId,
    },

    /// Auxiliary annotations arrived.
    Meta {
        /// Source session.
        session: SessionId,
        /// Decoded payload.
        payload: Value,
    },

    /// A fragment fetch finished; swap `html` in for `target`.
    FragmentLoaded {
        /// Source session.
        session: SessionId,
        /// Placeholder to replace.
        target: NodeId,
        /// Fragment markup.
        html: String,
    },

    /// A fragment fetch failed.
    FragmentFailed {
        /// Source session.
        session: SessionId,
        /// Failure description.
        error: String,
    },

    /// The view should follow the new content.
    ScrollToBottom {
        /// Source session.
        session: SessionId,
    },

    /// The user asked to stop a response.
    Stop {
        /// Session to abort.
        session: SessionId,
    },
}

impl EngineMessage {
    /// Whether this message answers a tracked request.
    pub const fn is_reply(&self) -> bool {
        matches!(self, Self::FragmentLoaded { .. } | Self::FragmentFailed { .. })
    }
}

/// Frame timing information.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    /// Frame number (monotonically increasing).
    pub frame: u64,
    /// Time elapsed since the ticker was started.
    pub elapsed: Duration,
}

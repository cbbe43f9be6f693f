//! # Streamark
//!
//! Flicker-free incremental markdown rendering for streamed assistant
//! responses.
//!
//! Text arrives as chunks over a server-push connection. Each display frame
//! the full accumulated text is rendered to HTML and reconciled into a live
//! document, keeping every unchanged leading node and a typing cursor at
//! the trailing edge.
//!
//! ## Core Concepts
//!
//! - **Full-snapshot reconciliation**: keep the shared signature prefix,
//!   replace the tail
//! - **Frame coalescing**: at most one render per display frame, latest
//!   text wins
//! - **Actor model**: transport, ticker and effect threads feed one
//!   document owner
//! - **Arena DOM**: generational node handles instead of pointers
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use streamark::{
//!     ChunkTransport, Engine, NoopEffects, PulldownSanitizer, SessionConfig, SessionTargets,
//!     StreamSession, TransportConfig,
//! };
//!
//! let mut engine = Engine::new();
//! let doc = engine.document_mut();
//! let container = doc.create_element("div");
//! doc.append_child(doc.root(), container);
//!
//! let transport = ChunkTransport::http(TransportConfig {
//!     url: Some("http://localhost:8000/stream".into()),
//!     ..TransportConfig::default()
//! })?;
//! let mut session = StreamSession::new(
//!     SessionConfig::default(),
//!     SessionTargets::container(container),
//!     transport,
//!     Arc::new(PulldownSanitizer::new()),
//!     Box::new(NoopEffects),
//! );
//! engine.drive(&mut session);
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod actor;
pub mod dom;
pub mod error;
pub mod markdown;
pub mod render;
pub mod session;
pub mod telemetry;
pub mod transport;

// Re-exports for convenience
pub use actor::{DriveReport, Engine, EngineConfig, EngineMessage};
pub use dom::{Document, NodeId};
pub use error::{Result, StreamError, TransportError, CONNECTION_LOST_MESSAGE};
pub use markdown::{MarkdownSanitizer, PulldownSanitizer};
pub use render::{CursorPlacer, ReconcilingRenderer, RenderSnapshot, Signature, TypingCursor};
pub use session::{
    HttpEffects, HttpEffectsConfig, NoopEffects, SessionConfig, SessionEffects, SessionId,
    SessionStatus, SessionTargets, StreamSession,
};
pub use transport::{ChunkEvent, ChunkTransport, TransportConfig, TransportEvent};

//! Transport module: Push connection to the server.
//!
//! - [`sse`]: `text/event-stream` framing
//! - [`ChunkEvent`]: normalized `message`/`done`/`error`/`meta` events
//! - [`ChunkTransport`]: one connection on a reader thread

mod chunk;
mod event;
pub mod sse;

pub use chunk::{ChunkTransport, Connector, HttpConnector, TransportConfig};
pub use event::{
    decode_newlines, decode_payload, Channel, ChunkEvent, TransportEvent, NEWLINE_SENTINEL,
};

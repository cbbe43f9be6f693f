//! Actor Model: Message-passing around a single document owner.
//!
//! - **Transport threads**: read push connections, send `TransportEvent`s
//! - **Frame Ticker**: emits display-frame boundaries
//! - **Effect workers**: fetch fragments, send `EngineMessage`s
//! - **Engine**: owns the document and applies everything in order
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   TransportEvent    ┌──────────────┐
//! │  Transport   │ ─────────────────▶  │              │
//! └──────────────┘                     │              │
//! ┌──────────────┐        Tick         │    Engine    │
//! │ Frame Ticker │ ─────────────────▶  │  (Document)  │
//! └──────────────┘                     │              │
//! ┌──────────────┐    EngineMessage    │              │
//! │Effect Worker │ ─────────────────▶  │              │
//! └──────────────┘                     └──────────────┘
//! ```

mod engine;
mod messages;
mod ticker;

pub use engine::{DriveReport, Engine, EngineConfig};
pub use messages::{EngineMessage, Tick};
pub use ticker::FrameTicker;

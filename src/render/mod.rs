//! Render module: Commit HTML snapshots into a live container.
//!
//! - [`ReconcilingRenderer`]: prefix-preserving child reconciliation
//! - [`Signature`]: bounded shape fingerprints used for the prefix check
//! - [`CursorPlacer`] / [`TypingCursor`]: trailing-edge marker placement

mod cursor;
mod reconcile;
mod signature;
mod snapshot;

pub use cursor::{CursorPlacer, Placement, TypingCursor, ZERO_WIDTH_SPACE};
pub use reconcile::{ReconcileResult, ReconcilingRenderer, RenderStats};
pub use signature::{Signature, TEXT_SIGNATURE_GRAPHEMES};
pub use snapshot::{RenderSnapshot, SnapshotSlot};

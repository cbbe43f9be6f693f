//! DOM module: The live document the renderer writes into.
//!
//! This module contains:
//! - [`Document`]: An arena of nodes addressed by generational handles
//! - [`NodeId`]: The handle type; equality is node identity
//! - [`Element`] / [`NodeData`]: Node payloads
//! - [`html`]: Fragment parsing and serialization

mod document;
pub mod html;
mod node;

pub use document::{Descendants, Document};
pub use html::parse_fragment;
pub use node::{Element, NodeData, NodeFlags, NodeId};

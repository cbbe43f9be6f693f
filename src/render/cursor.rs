//! Cursor Placer: Keep the typing marker at the trailing edge of content.
//!
//! Insertion point, in priority order:
//!
//! 1. After the last non-whitespace text node. Inside preformatted
//!    blocks a trailing newline run is split off first and the marker goes
//!    before it, so it does not dangle below the block's blank lines.
//! 2. As the last child of the deepest trailing inline element.
//! 3. As the last child of the last non-void element; failing that, after
//!    a zero-width text node appended to the root.

use crate::dom::{Document, NodeFlags, NodeId};
use tracing::debug;

/// Placeholder text used when the root has nothing to host the marker.
pub const ZERO_WIDTH_SPACE: &str = "\u{200b}";

/// Where the marker ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Right after a text node.
    AfterText(NodeId),
    /// Between a preformatted text node and its split-off newline tail.
    BeforeNewlines {
        /// Text node that keeps the content.
        text: NodeId,
        /// Split-off node holding the trailing newlines.
        tail: NodeId,
    },
    /// Last child of an inline element.
    InInline(NodeId),
    /// Last child of the last usable element.
    InElement(NodeId),
    /// After a freshly appended zero-width text node.
    AfterPlaceholder(NodeId),
}

/// Byte offset where a trailing run of `\n` starts, if there is one.
fn trailing_newline_start(text: &str) -> Option<usize> {
    let trimmed = text.trim_end_matches('\n');
    (trimmed.len() < text.len()).then_some(trimmed.len())
}

/// Stateless placement logic for a marker node.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorPlacer;

impl CursorPlacer {
    /// Move `marker` to the trailing edge of the content under `root`.
    ///
    /// The marker is detached from wherever it was first. Returns `None`
    /// without writing anything if `root` is not connected.
    pub fn place(doc: &mut Document, root: NodeId, marker: NodeId) -> Option<Placement> {
        if !doc.is_connected(root) || !doc.contains(marker) || marker == root {
            debug!("cursor target missing");
            return None;
        }
        doc.detach(marker);

        let nodes: Vec<NodeId> = doc.descendants(root).collect();

        let last_text = nodes.iter().rev().copied().find(|&node| {
            doc.text(node)
                .is_some_and(|text| !text.chars().all(char::is_whitespace))
        });
        if let Some(text_node) = last_text {
            return Some(Self::place_after_text(doc, root, text_node, marker));
        }

        let inline = nodes.iter().rev().copied().find(|&node| {
            doc.element(node).is_some_and(crate::dom::Element::is_inline)
        });
        if let Some(host) = inline {
            doc.append_child(host, marker);
            return Some(Placement::InInline(host));
        }

        let host = nodes
            .iter()
            .rev()
            .copied()
            .find(|&node| doc.element(node).is_some_and(|el| !el.is_void()));
        if let Some(host) = host {
            doc.append_child(host, marker);
            return Some(Placement::InElement(host));
        }

        let placeholder = doc.create_text(ZERO_WIDTH_SPACE);
        doc.append_child(root, placeholder);
        doc.insert_after(placeholder, marker);
        Some(Placement::AfterPlaceholder(placeholder))
    }

    fn place_after_text(
        doc: &mut Document,
        root: NodeId,
        text_node: NodeId,
        marker: NodeId,
    ) -> Placement {
        if Self::in_preformatted_block(doc, root, text_node) {
            let split_at = doc.text(text_node).and_then(trailing_newline_start);
            if let Some(tail) = split_at.and_then(|offset| doc.split_text(text_node, offset)) {
                doc.insert_before_sibling(tail, marker);
                return Placement::BeforeNewlines {
                    text: text_node,
                    tail,
                };
            }
        }
        doc.insert_after(text_node, marker);
        Placement::AfterText(text_node)
    }

    /// Whether the nearest block ancestor of `node` (up to `root`) is
    /// preformatted.
    fn in_preformatted_block(doc: &Document, root: NodeId, node: NodeId) -> bool {
        let mut current = doc.parent(node);
        while let Some(ancestor) = current {
            if let Some(element) = doc.element(ancestor) {
                if element.is_preformatted() {
                    return true;
                }
                if element.is_block() {
                    return false;
                }
            }
            if ancestor == root {
                return false;
            }
            current = doc.parent(ancestor);
        }
        false
    }
}

/// A typing indicator node owned by a streaming session.
///
/// The node is pinned, so re-rendering the block that currently holds it
/// only detaches it.
#[derive(Debug, Clone)]
pub struct TypingCursor {
    node: NodeId,
    stopped_class: String,
    stopped: bool,
}

impl TypingCursor {
    /// Create a detached marker `<span class="{class}">`.
    pub fn create(doc: &mut Document, class: &str, stopped_class: &str) -> Self {
        let node = doc.create_element_with("span", [("class", class), ("aria-hidden", "true")]);
        doc.insert_flags(node, NodeFlags::PINNED);
        Self {
            node,
            stopped_class: stopped_class.to_owned(),
            stopped: false,
        }
    }

    /// Marker handle.
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// Whether the cursor was frozen by a stop.
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Place the marker at the trailing edge of `root`.
    pub fn place(&self, doc: &mut Document, root: NodeId) -> Option<Placement> {
        CursorPlacer::place(doc, root, self.node)
    }

    /// Freeze the cursor in place.
    pub fn mark_stopped(&mut self, doc: &mut Document) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let class = doc
            .element(self.node)
            .and_then(|el| el.attr("class"))
            .map(|c| format!("{c} {}", self.stopped_class));
        if let Some(class) = class {
            doc.set_attribute(self.node, "class", &class);
        }
    }

    /// Detach and free the marker.
    pub fn remove(self, doc: &mut Document) {
        doc.remove(self.node);
    }
}

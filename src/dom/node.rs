//! Node: Handles, payloads and flags for arena-resident nodes.

use bitflags::bitflags;
use std::fmt;

/// Generational handle to a node in a [`Document`](super::Document).
///
/// A handle stays valid until the node is freed. Once the slot is reused
/// the generation no longer matches, so a stale handle can never alias a
/// newer node. Node identity in the renderer is handle equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

bitflags! {
    /// Per-node flags.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct NodeFlags: u8 {
        /// Survives removal of an ancestor: detached instead of freed.
        const PINNED = 0b0000_0001;
    }
}

/// Elements that never have children.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements laid out as blocks.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "div", "dl", "dt",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "tbody",
    "td", "tfoot", "th", "thead", "tr", "ul",
];

/// An element: lowercase tag name plus ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    /// Create an element with no attributes.
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    /// Tag name (lowercase).
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attributes in document order.
    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    /// Look up an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set or replace an attribute. Returns `true` if the value changed.
    pub fn set_attr(&mut self, name: &str, value: &str) -> bool {
        if let Some(slot) = self.attrs.iter_mut().find(|(key, _)| key == name) {
            if slot.1 == value {
                return false;
            }
            value.clone_into(&mut slot.1);
        } else {
            self.attrs.push((name.to_owned(), value.to_owned()));
        }
        true
    }

    /// Remove an attribute. Returns `true` if it was present.
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(key, _)| key != name);
        self.attrs.len() != before
    }

    /// Whether the whitespace-separated `class` attribute contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    /// Void elements cannot host children.
    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.tag.as_str())
    }

    /// Block-level by tag.
    pub fn is_block(&self) -> bool {
        BLOCK_ELEMENTS.contains(&self.tag.as_str())
    }

    /// Inline: neither block-level nor void.
    pub fn is_inline(&self) -> bool {
        !self.is_block() && !self.is_void()
    }

    /// `<pre>`, or an inline `white-space: pre | pre-wrap | pre-line` style.
    ///
    /// The arena has no style engine; the inline style attribute stands in
    /// for the computed style.
    pub fn is_preformatted(&self) -> bool {
        if self.tag == "pre" {
            return true;
        }
        self.attr("style").is_some_and(|style| {
            style.split(';').any(|decl| {
                decl.split_once(':').is_some_and(|(prop, value)| {
                    prop.trim().eq_ignore_ascii_case("white-space")
                        && value.trim().to_ascii_lowercase().starts_with("pre")
                })
            })
        })
    }
}

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// An element.
    Element(Element),
    /// A text node.
    Text(String),
    /// A comment node.
    Comment(String),
}

impl NodeData {
    /// The element, if this is one.
    pub const fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    /// The text, if this is a text node.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Arena record: payload plus tree links.
#[derive(Debug, Clone)]
pub(crate) struct NodeRecord {
    pub(crate) data: NodeData,
    pub(crate) flags: NodeFlags,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl NodeRecord {
    pub(crate) const fn new(data: NodeData) -> Self {
        Self {
            data,
            flags: NodeFlags::empty(),
            parent: None,
            children: Vec::new(),
        }
    }
}

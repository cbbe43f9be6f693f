//! Document: Arena-backed live node tree.
//!
//! Nodes live in a flat `Vec` of slots addressed by generational
//! [`NodeId`] handles. Ownership of a node transfers to its parent on
//! insert and is released on removal; freed slots are recycled with a
//! bumped generation.

use super::node::{Element, NodeData, NodeFlags, NodeId, NodeRecord};
use unicode_segmentation::UnicodeSegmentation;

/// A slot in the arena.
#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    record: Option<NodeRecord>,
}

/// A live document.
///
/// The root is a `body` element. Every write to a node connected to the
/// root bumps [`Document::mutation_count`]; building detached nodes does not.
#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    mutations: u64,
}

/// Lazy pre-order walk over a subtree, see [`Document::descendants`].
#[derive(Debug)]
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.stack.extend(self.doc.children(node).iter().rev().copied());
        Some(node)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with a `body` root.
    pub fn new() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            mutations: 0,
        };
        doc.root = doc.alloc(NodeData::Element(Element::new("body")));
        doc
    }

    /// The root element.
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Number of writes made to connected nodes so far.
    pub const fn mutation_count(&self) -> u64 {
        self.mutations
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Whether only the root exists.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    #[allow(clippy::cast_possible_truncation)]
    fn alloc(&mut self, data: NodeData) -> NodeId {
        let record = NodeRecord::new(data);
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                record: Some(record),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(Element::new(tag)))
    }

    /// Create a detached element with attributes.
    pub fn create_element_with<I, K, V>(&mut self, tag: &str, attrs: I) -> NodeId
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut element = Element::new(tag);
        for (name, value) in attrs {
            element.set_attr(name.as_ref(), value.as_ref());
        }
        self.alloc(NodeData::Element(element))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(text.into()))
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Comment(text.into()))
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    fn record(&self, id: NodeId) -> Option<&NodeRecord> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    fn record_mut(&mut self, id: NodeId) -> Option<&mut NodeRecord> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_mut())
    }

    /// Whether the handle refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.record(id).is_some()
    }

    /// Node payload.
    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.record(id).map(|record| &record.data)
    }

    /// Element payload, if `id` is an element.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.data(id).and_then(NodeData::as_element)
    }

    /// Text payload, if `id` is a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.data(id).and_then(NodeData::as_text)
    }

    /// Node flags (empty for dead handles).
    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.record(id).map_or(NodeFlags::empty(), |record| record.flags)
    }

    /// Add flags to a node.
    pub fn insert_flags(&mut self, id: NodeId, flags: NodeFlags) {
        if let Some(record) = self.record_mut(id) {
            record.flags.insert(flags);
        }
    }

    /// Parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.record(id).and_then(|record| record.parent)
    }

    /// Children in order (empty for dead handles).
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.record(id)
            .map_or(&[][..], |record| record.children.as_slice())
    }

    /// Next sibling of a node.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let pos = siblings.iter().position(|&child| child == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Whether the node is reachable from the root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return self.contains(current);
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Descendants of `id` in tree order (pre-order), excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            stack: self.children(id).iter().rev().copied().collect(),
        }
    }

    /// Find a connected element by its `id` attribute.
    pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.descendants(self.root).find(|&node| {
            self.element(node)
                .and_then(|el| el.attr("id"))
                .is_some_and(|value| value == element_id)
        })
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        match self.data(id) {
            Some(NodeData::Text(text) | NodeData::Comment(text)) => text.clone(),
            Some(NodeData::Element(_)) => self
                .descendants(id)
                .filter_map(|node| self.text(node))
                .collect(),
            None => String::new(),
        }
    }

    /// The first `max_graphemes` grapheme clusters of the text content.
    ///
    /// Text nodes are visited lazily and the walk stops as soon as the
    /// bound is reached. A cluster split across two text nodes is kept
    /// whole.
    pub fn text_prefix(&self, id: NodeId, max_graphemes: usize) -> String {
        match self.data(id) {
            Some(NodeData::Text(text) | NodeData::Comment(text)) => {
                return text.graphemes(true).take(max_graphemes).collect();
            }
            Some(NodeData::Element(_)) => {}
            None => return String::new(),
        }
        let mut out = String::new();
        for text in self.descendants(id).filter_map(|node| self.text(node)) {
            out.push_str(text);
            // Only a cluster past the bound proves the last kept one complete.
            if let Some((cut, _)) = out.grapheme_indices(true).nth(max_graphemes) {
                out.truncate(cut);
                return out;
            }
        }
        out
    }

    /// Number of element children.
    pub fn child_element_count(&self, id: NodeId) -> usize {
        self.children(id)
            .iter()
            .filter(|&&child| self.element(child).is_some())
            .count()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    fn touch(&mut self, parent: NodeId) {
        if self.is_connected(parent) {
            self.mutations += 1;
        }
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference`.
    ///
    /// `child` is detached from its current parent first. A missing
    /// `reference`, or one that is not a child of `parent`, appends.
    /// Refuses to create cycles or to host children under void elements.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> bool {
        if !self.contains(child) || self.is_inclusive_ancestor(child, parent) {
            return false;
        }
        match self.data(parent) {
            Some(NodeData::Element(element)) if !element.is_void() => {}
            _ => return false,
        }
        if reference == Some(child) {
            return self.parent(child) == Some(parent);
        }
        self.detach(child);

        let Some(record) = self.record_mut(parent) else {
            return false;
        };
        let pos = reference
            .and_then(|r| record.children.iter().position(|&c| c == r))
            .unwrap_or(record.children.len());
        record.children.insert(pos, child);
        if let Some(child_record) = self.record_mut(child) {
            child_record.parent = Some(parent);
        }
        self.touch(parent);
        true
    }

    /// Insert `new` immediately after `node` in `node`'s parent.
    pub fn insert_after(&mut self, node: NodeId, new: NodeId) -> bool {
        let Some(parent) = self.parent(node) else {
            return false;
        };
        let next = self.next_sibling(node);
        self.insert_before(parent, new, next)
    }

    /// Insert `new` immediately before `node` in `node`'s parent.
    pub fn insert_before_sibling(&mut self, node: NodeId, new: NodeId) -> bool {
        let Some(parent) = self.parent(node) else {
            return false;
        };
        self.insert_before(parent, new, Some(node))
    }

    /// Unlink a node from its parent. The node stays alive.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        if let Some(record) = self.record_mut(parent) {
            record.children.retain(|&c| c != id);
        }
        if let Some(record) = self.record_mut(id) {
            record.parent = None;
        }
        self.touch(parent);
        true
    }

    /// Detach a node and free its subtree.
    ///
    /// Pinned descendants are detached and kept alive. Removing the root
    /// is refused.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        self.detach(id);
        self.free_subtree(id);
        true
    }

    /// Free a detached subtree, such as parsed nodes that went unused.
    ///
    /// Refuses attached nodes and the root.
    pub fn discard(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) || self.parent(id).is_some() {
            return false;
        }
        self.free_subtree(id);
        true
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if node != id && self.flags(node).contains(NodeFlags::PINNED) {
                if let Some(record) = self.record_mut(node) {
                    record.parent = None;
                }
                continue;
            }
            let Some(slot) = self.slots.get_mut(node.index as usize) else {
                continue;
            };
            if slot.generation != node.generation {
                continue;
            }
            if let Some(record) = slot.record.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(node.index);
                stack.extend(record.children);
            }
        }
    }

    /// Split a text node at a byte offset, like DOM `Text.splitText`.
    ///
    /// The original keeps `[..offset]`; a new node holding the tail is
    /// inserted right after it and returned. The offset must be a char
    /// boundary within the text.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Option<NodeId> {
        let text = self.text(id)?;
        if offset > text.len() || !text.is_char_boundary(offset) {
            return None;
        }
        let tail = text[offset..].to_owned();
        if let Some(NodeData::Text(text)) = self.record_mut(id).map(|r| &mut r.data) {
            text.truncate(offset);
        }
        let tail_node = self.create_text(tail);
        if self.parent(id).is_some() {
            self.touch(id);
            self.insert_after(id, tail_node);
        }
        Some(tail_node)
    }

    /// Set an attribute on an element.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        let changed = match self.record_mut(id).map(|r| &mut r.data) {
            Some(NodeData::Element(element)) => element.set_attr(name, value),
            _ => return false,
        };
        if changed {
            self.touch(id);
        }
        true
    }

    /// Remove an attribute from an element.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> bool {
        let removed = match self.record_mut(id).map(|r| &mut r.data) {
            Some(NodeData::Element(element)) => element.remove_attr(name),
            _ => false,
        };
        if removed {
            self.touch(id);
        }
        removed
    }

    /// Replace a node's text.
    ///
    /// Text and comment nodes have their data replaced; elements lose all
    /// children and get a single text child.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> bool {
        let is_element = match self.record_mut(id).map(|r| &mut r.data) {
            Some(NodeData::Text(data) | NodeData::Comment(data)) => {
                if data.as_str() == text {
                    return true;
                }
                text.clone_into(data);
                false
            }
            Some(NodeData::Element(_)) => true,
            None => return false,
        };
        if !is_element {
            self.touch(id);
            return true;
        }
        for child in self.children(id).to_vec() {
            self.remove(child);
        }
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
        true
    }
}

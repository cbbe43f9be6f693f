//! Render snapshot: Positional record of what the renderer attached.

use super::signature::Signature;
use crate::dom::{Document, NodeId};

/// One tracked top-level node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSlot {
    /// The attached node.
    pub node: NodeId,
    /// Signature computed when the node was parsed.
    pub signature: Signature,
}

/// Ordered `(node, signature)` pairs, one per tracked child of the
/// container, in DOM order.
#[derive(Debug, Clone, Default)]
pub struct RenderSnapshot {
    slots: Vec<SnapshotSlot>,
}

impl RenderSnapshot {
    /// An empty snapshot.
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of tracked nodes.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Tracked slots in order.
    pub fn slots(&self) -> &[SnapshotSlot] {
        &self.slots
    }

    /// Tracked nodes in order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().map(|slot| slot.node)
    }

    /// Track a newly attached node.
    pub fn push(&mut self, node: NodeId, signature: Signature) {
        self.slots.push(SnapshotSlot { node, signature });
    }

    /// Length of the strict positional common prefix with `next`.
    pub fn shared_prefix(&self, next: &[Signature]) -> usize {
        self.slots
            .iter()
            .zip(next)
            .take_while(|(slot, signature)| slot.signature == **signature)
            .count()
    }

    /// Drop tracking from the first slot whose node is no longer a child
    /// of `container` in the recorded order.
    ///
    /// Someone else may have removed nodes; the snapshot only describes
    /// what is actually attached.
    pub fn retain_attached(&mut self, doc: &Document, container: NodeId) {
        let children = doc.children(container);
        let mut from = 0;
        let mut live = 0;
        for slot in &self.slots {
            match children[from..].iter().position(|&c| c == slot.node) {
                Some(offset) => {
                    from += offset + 1;
                    live += 1;
                }
                None => break,
            }
        }
        self.slots.truncate(live);
    }

    /// Split off every slot at or beyond `len`.
    pub fn split_off(&mut self, len: usize) -> Vec<SnapshotSlot> {
        if len >= self.slots.len() {
            return Vec::new();
        }
        self.slots.split_off(len)
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Document, NodeId, RenderSnapshot) {
        let mut doc = Document::new();
        let container = doc.root();
        let mut snapshot = RenderSnapshot::new();
        for text in ["a", "b", "c"] {
            let node = doc.create_text(text);
            doc.append_child(container, node);
            let signature = Signature::of(&doc, node);
            snapshot.push(node, signature);
        }
        (doc, container, snapshot)
    }

    #[test]
    fn test_shared_prefix() {
        let (_doc, _, snapshot) = fixture();
        let same: Vec<_> = snapshot.slots().iter().map(|s| s.signature.clone()).collect();
        assert_eq!(snapshot.shared_prefix(&same), 3);
        assert_eq!(snapshot.shared_prefix(&same[..2]), 2);

        let mut other = Document::new();
        let x = other.create_text("x");
        let mut diverged = same.clone();
        diverged[1] = Signature::of(&other, x);
        assert_eq!(snapshot.shared_prefix(&diverged), 1);
    }

    #[test]
    fn test_retain_attached_truncates_at_first_missing() {
        let (mut doc, container, mut snapshot) = fixture();
        let middle = snapshot.slots()[1].node;
        doc.remove(middle);
        snapshot.retain_attached(&doc, container);
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_split_off() {
        let (_, _, mut snapshot) = fixture();
        let tail = snapshot.split_off(1);
        assert_eq!(tail.len(), 2);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.split_off(5).is_empty());
    }
}

//! Reconciling Renderer: Apply full HTML snapshots with minimal writes.
//!
//! Each update receives the *complete* current HTML, not a delta. The
//! renderer exploits the append-or-truncate shape of streamed output:
//!
//! 1. Parse the new HTML into detached top-level nodes
//! 2. Compute a [`Signature`] per node
//! 3. Keep the strict positional prefix whose signatures still match
//! 4. Remove every tracked node past that prefix (from the end backward)
//! 5. Insert the new tail before the anchor, or at the end
//!
//! There is no move detection and no tree diffing below the top level.

use super::signature::Signature;
use super::snapshot::RenderSnapshot;
use crate::dom::{parse_fragment, Document, NodeId};
use crate::error::StreamError;
use tracing::{debug, trace};

/// Statistics about one update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    /// Leading nodes left untouched.
    pub kept: usize,
    /// Tracked nodes removed.
    pub removed: usize,
    /// New nodes inserted.
    pub appended: usize,
}

impl ReconcileResult {
    /// Whether any node was removed or inserted.
    pub const fn changed(&self) -> bool {
        self.removed > 0 || self.appended > 0
    }
}

/// Cumulative renderer statistics.
#[derive(Debug, Clone, Default)]
pub struct RenderStats {
    /// Updates that reached the diff stage.
    pub commits: u64,
    /// Updates skipped because the HTML was identical.
    pub skipped: u64,
    /// Total nodes removed.
    pub nodes_removed: u64,
    /// Total nodes inserted.
    pub nodes_appended: u64,
}

/// Keeps a container's children in sync with successive HTML snapshots.
#[derive(Debug)]
pub struct ReconcilingRenderer {
    /// Element whose children are managed.
    container: NodeId,
    /// Node new content is inserted before, when it is a child of the container.
    anchor: Option<NodeId>,
    /// Positional record of attached nodes.
    snapshot: RenderSnapshot,
    /// Last committed HTML.
    last_html: Option<String>,
    /// Statistics.
    stats: RenderStats,
}

impl ReconcilingRenderer {
    /// Create a renderer managing the children of `container`.
    pub fn new(container: NodeId) -> Self {
        Self {
            container,
            anchor: None,
            snapshot: RenderSnapshot::new(),
            last_html: None,
            stats: RenderStats::default(),
        }
    }

    /// Container being managed.
    pub const fn container(&self) -> NodeId {
        self.container
    }

    /// Set the node new content must be inserted before.
    pub const fn set_anchor(&mut self, anchor: Option<NodeId>) {
        self.anchor = anchor;
    }

    /// Current snapshot.
    pub const fn snapshot(&self) -> &RenderSnapshot {
        &self.snapshot
    }

    /// Cumulative statistics.
    pub const fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// Make the container's children match `html`.
    ///
    /// Returns `true` if any node was removed or inserted. Identical HTML
    /// performs zero writes. A missing container is a silent no-op.
    pub fn update(&mut self, doc: &mut Document, html: &str) -> bool {
        match self.try_update(doc, html) {
            Ok(result) => result.changed(),
            Err(err) => {
                debug!(error = %err, "skipping render");
                false
            }
        }
    }

    /// Like [`update`](Self::update) but reports what happened.
    pub fn try_update(
        &mut self,
        doc: &mut Document,
        html: &str,
    ) -> Result<ReconcileResult, StreamError> {
        if !doc.is_connected(self.container) {
            return Err(StreamError::RenderTargetMissing("container"));
        }
        if self.last_html.as_deref() == Some(html) {
            self.stats.skipped += 1;
            return Ok(ReconcileResult::default());
        }

        let fresh = parse_fragment(doc, html);
        let signatures: Vec<Signature> = fresh.iter().map(|&n| Signature::of(doc, n)).collect();

        self.snapshot.retain_attached(doc, self.container);
        let shared = self.snapshot.shared_prefix(&signatures);

        let stale = self.snapshot.split_off(shared);
        let removed = stale.len();
        for slot in stale.into_iter().rev() {
            doc.remove(slot.node);
        }

        let anchor = self
            .anchor
            .filter(|&a| doc.parent(a) == Some(self.container));
        let mut appended = 0;
        for (index, (node, signature)) in fresh.into_iter().zip(signatures).enumerate() {
            if index < shared {
                // Parsed duplicate of a kept node.
                doc.discard(node);
                continue;
            }
            if doc.insert_before(self.container, node, anchor) {
                self.snapshot.push(node, signature);
                appended += 1;
            } else {
                doc.discard(node);
            }
        }

        self.last_html = Some(html.to_owned());
        self.stats.commits += 1;
        self.stats.nodes_removed += removed as u64;
        self.stats.nodes_appended += appended as u64;

        let result = ReconcileResult {
            kept: shared,
            removed,
            appended,
        };
        trace!(?result, "reconciled");
        Ok(result)
    }

    /// Detach all tracked nodes and forget the snapshot and last HTML.
    pub fn reset(&mut self, doc: &mut Document) {
        for node in self.snapshot.nodes().collect::<Vec<_>>().into_iter().rev() {
            doc.remove(node);
        }
        self.snapshot.clear();
        self.last_html = None;
    }
}

//! Signature: Cheap shape fingerprints for top-level nodes.
//!
//! Equal content always yields an equal signature. The converse does not
//! hold: element text is only hashed up to [`TEXT_SIGNATURE_GRAPHEMES`],
//! so two long blocks sharing that prefix (and tag, attributes and child
//! count) compare equal and the second is treated as unchanged.

use crate::dom::{Document, NodeData, NodeId};
use std::fmt;

/// Grapheme clusters of element text folded into a signature.
///
/// Changing this alters which edits the renderer can see. Text and comment
/// nodes are always hashed in full.
pub const TEXT_SIGNATURE_GRAPHEMES: usize = 200;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a.
fn fnv1a(bytes: &[u8], seed: u32) -> u32 {
    bytes.iter().fold(seed, |hash, &byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

fn hash_str(text: &str) -> u32 {
    fnv1a(text.as_bytes(), FNV_OFFSET)
}

/// Opaque fingerprint of a node's shape.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Compute the signature of `node`.
    ///
    /// Elements: tag, child-element count, attribute hash and a hash of
    /// the bounded text prefix. Text/comment nodes: a hash of the full text.
    pub fn of(doc: &Document, node: NodeId) -> Self {
        match doc.data(node) {
            Some(NodeData::Element(element)) => {
                let attr_hash = element.attrs().iter().fold(FNV_OFFSET, |hash, (name, value)| {
                    let hash = fnv1a(name.as_bytes(), hash);
                    let hash = fnv1a(b"=", hash);
                    let hash = fnv1a(value.as_bytes(), hash);
                    fnv1a(b";", hash)
                });
                let bounded = doc.text_prefix(node, TEXT_SIGNATURE_GRAPHEMES);
                Self(format!(
                    "{}:{}:{:08x}:{:08x}",
                    element.tag(),
                    doc.child_element_count(node),
                    attr_hash,
                    hash_str(&bounded)
                ))
            }
            Some(NodeData::Text(text)) => Self(format!("#text:{:08x}", hash_str(text))),
            Some(NodeData::Comment(text)) => Self(format!("#comment:{:08x}", hash_str(text))),
            None => Self(String::from("#gone")),
        }
    }

    /// The raw signature string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.0)
    }
}

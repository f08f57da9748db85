//! Node type and the per-level empty-subtree table.

use alloc::vec::Vec;
use light_hasher::Hasher;

use crate::error::ConcurrentMerkleTreeError;

/// A 32-byte tree node. Equality is byte equality.
pub type Node = [u8; 32];

/// The canonical empty leaf.
pub const EMPTY: Node = [0u8; 32];

/// Deepest tree the engine supports.
///
/// Leaf indices are `u32` and the critical-bit math in
/// [`ChangeLog::update_proof_or_leaf`](crate::ChangeLog::update_proof_or_leaf)
/// shifts them left by `32 - max_depth`, so depth stays well below 32.
pub const MAX_SUPPORTED_DEPTH: usize = 30;

/// Roots of all-empty subtrees, one per level `0..=max_depth`.
///
/// `level 0` is [`EMPTY`] and `level i` is `H(level i-1, level i-1)`. The
/// table is built once per tree and never recomputed by operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmptyNodes {
    nodes: Vec<Node>,
}

impl EmptyNodes {
    /// Build the table for a tree of `max_depth` levels.
    ///
    /// Copies from the hasher's precomputed zero-bytes table when it starts at
    /// [`EMPTY`], and hashes the remaining levels otherwise.
    ///
    /// # Errors
    /// Returns [`ConcurrentMerkleTreeError::HashFailed`] if the hasher fails.
    pub fn new<H: Hasher>(max_depth: usize) -> Result<Self, ConcurrentMerkleTreeError> {
        let zero_bytes = H::zero_bytes();
        let mut nodes: Vec<Node> = Vec::with_capacity(max_depth + 1);
        if zero_bytes.first() == Some(&EMPTY) {
            nodes.extend(zero_bytes.iter().take(max_depth + 1).copied());
        } else {
            nodes.push(EMPTY);
        }

        while nodes.len() <= max_depth {
            let below = nodes.last().copied().unwrap_or(EMPTY);
            let parent = H::hashv(&[&below, &below])
                .map_err(|_| ConcurrentMerkleTreeError::HashFailed)?;
            nodes.push(parent);
        }

        Ok(Self { nodes })
    }

    /// Empty-subtree root at `level`. Levels above the table yield [`EMPTY`].
    #[inline]
    pub fn get(&self, level: usize) -> Node {
        self.nodes.get(level).copied().unwrap_or(EMPTY)
    }

    /// Root of an entirely empty tree.
    #[inline]
    pub fn root(&self) -> Node {
        self.nodes.last().copied().unwrap_or(EMPTY)
    }

    /// Empty-subtree roots for levels `0..max_depth`, i.e. the proof of any
    /// leaf in an empty tree.
    pub fn proof(&self) -> &[Node] {
        let len = self.nodes.len().saturating_sub(1);
        &self.nodes[..len]
    }

    /// Depth the table was built for.
    pub fn max_depth(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use light_hasher::Sha256;

    #[test]
    fn test_empty_nodes_chain() {
        let table = EmptyNodes::new::<Sha256>(10).unwrap();
        assert_eq!(table.max_depth(), 10);
        assert_eq!(table.get(0), EMPTY, "level 0 must be the empty leaf");
        for level in 1..=10 {
            let below = table.get(level - 1);
            let expected = Sha256::hashv(&[&below, &below]).unwrap();
            assert_eq!(table.get(level), expected, "level {} mismatch", level);
        }
        assert_eq!(table.root(), table.get(10));
        assert_eq!(table.proof().len(), 10);
    }

    #[test]
    fn test_empty_nodes_max_depth() {
        let table = EmptyNodes::new::<Sha256>(MAX_SUPPORTED_DEPTH).unwrap();
        assert_eq!(table.proof().len(), MAX_SUPPORTED_DEPTH);
        assert_ne!(table.root(), EMPTY);
    }
}

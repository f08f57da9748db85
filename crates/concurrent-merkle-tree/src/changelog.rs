//! Changelog entries recorded by every tree mutation.
//!
//! An entry keeps the full leaf-to-root route written by one mutation. Any
//! other leaf's proof overlaps that route in exactly one place: the level of
//! the highest bit where the two leaf indices differ (the critical bit). At
//! that level the route node *is* the other leaf's sibling, so replaying
//! entries in order refreshes a stale proof one level per entry.

use alloc::{vec, vec::Vec};
use light_hasher::Hasher;

use crate::{
    error::ConcurrentMerkleTreeError,
    hash::compute_parent_node,
    node::{EMPTY, Node},
};

/// One recorded leaf mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeLog {
    /// Root produced by the mutation
    pub root: Node,
    /// Route nodes after the mutation: `path[0]` is the new leaf and
    /// `path[i]` the node at level `i`
    pub path: Vec<Node>,
    /// Leaf index that was written
    pub index: u32,
}

impl ChangeLog {
    /// Build an entry from its parts.
    pub fn new(root: Node, path: Vec<Node>, index: u32) -> Self {
        Self { root, path, index }
    }

    /// Zeroed entry for a tree of `max_depth` levels.
    pub fn zeroed(max_depth: usize) -> Self {
        Self {
            root: EMPTY,
            path: vec![EMPTY; max_depth],
            index: 0,
        }
    }

    /// Write `leaf` at `index` using `proof`, recording the route and root.
    ///
    /// # Errors
    /// Returns [`ConcurrentMerkleTreeError::HashFailed`] if the hasher fails.
    pub fn from_proof<H: Hasher>(
        leaf: Node,
        proof: &[Node],
        index: u32,
    ) -> Result<Self, ConcurrentMerkleTreeError> {
        let mut path = Vec::with_capacity(proof.len());
        let mut node = leaf;
        for (level, sibling) in proof.iter().enumerate() {
            path.push(node);
            node = compute_parent_node::<H>(&node, sibling, index, level)?;
        }
        Ok(Self {
            root: node,
            path,
            index,
        })
    }

    /// The leaf this entry wrote.
    #[inline]
    pub fn leaf(&self) -> Node {
        self.path.first().copied().unwrap_or(EMPTY)
    }

    /// Level of the proof of `leaf_index` that this entry's route overlaps.
    ///
    /// Only meaningful when `leaf_index != self.index`.
    #[inline]
    pub fn critbit_index(&self, leaf_index: u32) -> usize {
        let max_depth = self.path.len() as u32;
        let padding = 32u32.saturating_sub(max_depth);
        let leading = (leaf_index ^ self.index)
            .checked_shl(padding)
            .unwrap_or(0)
            .leading_zeros();
        max_depth.saturating_sub(1).saturating_sub(leading) as usize
    }

    /// Fast-forward `proof` (or `leaf`) of `leaf_index` past this entry.
    ///
    /// If this entry wrote a different leaf, the proof node at the critical
    /// bit is replaced with the entry's route node. If it wrote `leaf_index`
    /// itself, `leaf` becomes the value it wrote.
    pub fn update_proof_or_leaf(&self, leaf_index: u32, proof: &mut [Node], leaf: &mut Node) {
        if leaf_index != self.index {
            let critbit = self.critbit_index(leaf_index);
            if let (Some(slot), Some(node)) = (proof.get_mut(critbit), self.path.get(critbit)) {
                *slot = *node;
            }
        } else {
            *leaf = self.leaf();
        }
    }
}

//! Rightmost path tracking.

use alloc::vec::Vec;

use crate::node::Node;

/// Proof to the rightmost leaf of the tree.
///
/// Lets `append` compute the new leaf's route without a caller-supplied
/// proof. `index` is one past the rightmost leaf, i.e. the position the next
/// append writes to, so an empty tree has `index == 0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    /// Siblings from the leaf level up to just below the root
    pub proof: Vec<Node>,
    /// Value of the rightmost leaf (`EMPTY` for an empty tree)
    pub leaf: Node,
    /// Number of leaves appended so far
    pub index: u32,
}

impl Path {
    /// Build a path from its parts.
    pub fn new(proof: Vec<Node>, leaf: Node, index: u32) -> Self {
        Self { proof, leaf, index }
    }
}

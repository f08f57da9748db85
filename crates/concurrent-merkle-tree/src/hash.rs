//! Hashing helpers shared by the tree, the changelog and callers that only
//! need to check a proof.

use light_hasher::Hasher;
use pinocchio_log::log;

use crate::{error::ConcurrentMerkleTreeError, node::Node};

/// Hash two children into their parent.
///
/// # Errors
/// Returns [`ConcurrentMerkleTreeError::HashFailed`] if the hasher fails.
#[inline]
pub fn hash_pair<H: Hasher>(left: &Node, right: &Node) -> Result<Node, ConcurrentMerkleTreeError> {
    H::hashv(&[left, right]).map_err(|_| {
        log!("merkle hash error");
        ConcurrentMerkleTreeError::HashFailed
    })
}

/// Parent of `node` at `level`, where `index` is the leaf index whose route
/// `node` lies on.
///
/// # Errors
/// Returns [`ConcurrentMerkleTreeError::HashFailed`] if the hasher fails.
#[inline]
pub fn compute_parent_node<H: Hasher>(
    node: &Node,
    sibling: &Node,
    index: u32,
    level: usize,
) -> Result<Node, ConcurrentMerkleTreeError> {
    if ((index >> level) & 1) == 0 {
        hash_pair::<H>(node, sibling)
    } else {
        hash_pair::<H>(sibling, node)
    }
}

/// Recompute the root reached from `leaf` at `index` through `proof`.
///
/// `proof[0]` is the sibling at the leaf level and the last element is the
/// sibling just below the root.
///
/// # Errors
/// Returns [`ConcurrentMerkleTreeError::HashFailed`] if the hasher fails.
pub fn recompute_root<H: Hasher>(
    leaf: Node,
    proof: &[Node],
    index: u32,
) -> Result<Node, ConcurrentMerkleTreeError> {
    let mut node = leaf;
    for (level, sibling) in proof.iter().enumerate() {
        node = compute_parent_node::<H>(&node, sibling, index, level)?;
    }
    Ok(node)
}

/// Check that `leaf` at `index` hashes to `root` through `proof`.
///
/// Pure: reads nothing but its arguments.
///
/// # Errors
/// Returns [`ConcurrentMerkleTreeError::InvalidProof`] if the recomputed root
/// differs from `root`.
pub fn verify_leaf<H: Hasher>(
    root: &Node,
    leaf: &Node,
    index: u32,
    proof: &[Node],
) -> Result<(), ConcurrentMerkleTreeError> {
    let computed = recompute_root::<H>(*leaf, proof, index)?;
    if computed != *root {
        log!("verify_leaf: proof does not match root for index {}", index);
        return Err(ConcurrentMerkleTreeError::InvalidProof);
    }
    Ok(())
}

//! Canopy: a cache of the upper levels of the tree.
//!
//! A tree of depth `D` with a canopy of depth `N` stores every node of the
//! `N` levels just below the root (the root itself excluded) after the tree
//! core. Callers then only send the lowest `D - N` proof nodes and the rest
//! are read from the canopy.
//!
//! The canopy is a full binary tree without its root, `2^(N+1) - 2` nodes,
//! laid out in heap order: node index `i` (root = 1, children `2i`, `2i + 1`)
//! lives in slot `i - 2`. A zeroed slot stands for an empty subtree.
//!
//! Every mutation refreshes the canopy from the mutation's change event.

use alloc::vec::Vec;
use concurrent_merkle_tree::{ConcurrentMerkleTreeError, EMPTY, EmptyNodes, Node};
use core::mem::size_of;
use light_hasher::Hasher;
use pinocchio_log::log;

use crate::{errors::AccountCompressionError, events::ChangeLogEvent};

/// Check that `canopy_bytes` holds whole nodes.
///
/// # Errors
/// Returns [`AccountCompressionError::CanopyLengthMismatch`] otherwise.
#[inline(always)]
pub fn check_canopy_bytes(canopy_bytes: &[u8]) -> Result<(), AccountCompressionError> {
    if canopy_bytes.len() % size_of::<Node>() != 0 {
        log!(
            "canopy byte length {} is not a multiple of {}",
            canopy_bytes.len(),
            size_of::<Node>()
        );
        return Err(AccountCompressionError::CanopyLengthMismatch);
    }
    Ok(())
}

fn canopy_nodes(canopy_bytes: &[u8]) -> Result<&[Node], AccountCompressionError> {
    check_canopy_bytes(canopy_bytes)?;
    bytemuck::try_cast_slice(canopy_bytes).map_err(|_| AccountCompressionError::CanopyLengthMismatch)
}

fn canopy_nodes_mut(canopy_bytes: &mut [u8]) -> Result<&mut [Node], AccountCompressionError> {
    check_canopy_bytes(canopy_bytes)?;
    bytemuck::try_cast_slice_mut(canopy_bytes)
        .map_err(|_| AccountCompressionError::CanopyLengthMismatch)
}

/// Number of levels the canopy caches.
///
/// # Errors
/// Returns [`AccountCompressionError::CanopyLengthMismatch`] unless the node
/// count is `2^(n+1) - 2` for some `n <= max_depth`.
#[inline(always)]
pub fn cached_path_length(canopy: &[Node], max_depth: u32) -> Result<u32, AccountCompressionError> {
    // The root is not stored, so a full canopy holds two nodes less than a power of two
    let full_size = canopy.len() + 2;
    if !full_size.is_power_of_two() {
        log!("canopy length {} is not 2 less than a power of 2", canopy.len());
        return Err(AccountCompressionError::CanopyLengthMismatch);
    }
    let max_full_size = 1usize.checked_shl(max_depth + 1).unwrap_or(usize::MAX);
    if full_size > max_full_size {
        log!(
            "canopy size {} exceeds tree of depth {}",
            canopy.len(),
            max_depth
        );
        return Err(AccountCompressionError::CanopyLengthMismatch);
    }
    Ok(full_size.trailing_zeros() - 1)
}

/// Number of levels cached by the canopy in `canopy_bytes`.
///
/// # Errors
/// Returns [`AccountCompressionError::CanopyLengthMismatch`] for a malformed canopy.
pub fn canopy_depth(canopy_bytes: &[u8], max_depth: u32) -> Result<u32, AccountCompressionError> {
    cached_path_length(canopy_nodes(canopy_bytes)?, max_depth)
}

/// Level of heap node `node_idx` in a tree of `max_depth` levels.
#[inline(always)]
fn node_level(node_idx: u32, max_depth: u32) -> usize {
    (max_depth - (31 - node_idx.leading_zeros())) as usize
}

/// Heap index of canopy leaf `index` in a canopy of `path_len` levels.
#[inline(always)]
fn leaf_node_index_to_canopy_index(path_len: u32, index: u32) -> usize {
    (1 << path_len) + index as usize
}

fn node_or_empty(canopy: &[Node], node_idx: usize, level: usize, empty_nodes: &EmptyNodes) -> Node {
    match canopy.get(node_idx - 2) {
        Some(node) if *node != EMPTY => *node,
        _ => empty_nodes.get(level),
    }
}

/// Write the nodes of `change_log` that fall inside the canopy.
///
/// # Errors
/// Returns [`AccountCompressionError::CanopyLengthMismatch`] for a malformed canopy.
pub fn update_canopy(
    canopy_bytes: &mut [u8],
    max_depth: u32,
    change_log: Option<&ChangeLogEvent>,
) -> Result<(), AccountCompressionError> {
    let canopy = canopy_nodes_mut(canopy_bytes)?;
    let path_len = cached_path_length(canopy, max_depth)?;
    if let Some(event) = change_log {
        // Path runs leaf to root, so walk it backwards and skip the root
        for path_node in event.path.iter().rev().skip(1).take(path_len as usize) {
            if let Some(slot) = canopy.get_mut((path_node.index as usize).wrapping_sub(2)) {
                *slot = path_node.node;
            }
        }
    }
    Ok(())
}

/// Complete a truncated `proof` of leaf `index` with nodes from the canopy.
///
/// Only as many canopy nodes are appended as needed to reach the depth of
/// `empty_nodes`. A proof that is still short afterwards is left for the
/// caller to reject.
///
/// # Errors
/// Returns [`AccountCompressionError::CanopyLengthMismatch`] for a malformed canopy.
pub fn fill_in_proof_from_canopy(
    canopy_bytes: &[u8],
    empty_nodes: &EmptyNodes,
    index: u32,
    proof: &mut Vec<Node>,
) -> Result<(), AccountCompressionError> {
    let max_depth = empty_nodes.max_depth() as u32;
    let canopy = canopy_nodes(canopy_bytes)?;
    let path_len = cached_path_length(canopy, max_depth)?;
    if path_len == 0 {
        return Ok(());
    }
    if u64::from(index) >= 1u64 << max_depth {
        return Err(ConcurrentMerkleTreeError::LeafIndexOutOfBounds.into());
    }

    // Heap index of the canopy node above `index` at the lowest canopy level
    let mut node_idx = ((1u32 << max_depth) + index) >> (max_depth - path_len);
    let mut inferred_nodes = Vec::with_capacity(path_len as usize);
    while node_idx > 1 {
        let sibling = (node_idx ^ 1) as usize;
        inferred_nodes.push(node_or_empty(
            canopy,
            sibling,
            node_level(node_idx, max_depth),
            empty_nodes,
        ));
        node_idx >>= 1;
    }

    let overlap = (proof.len() + inferred_nodes.len()).saturating_sub(max_depth as usize);
    proof.extend(inferred_nodes.iter().skip(overlap));
    Ok(())
}

/// Set the lowest canopy level from `start_index` on and rehash every canopy
/// node above the written range.
///
/// # Errors
/// Returns [`AccountCompressionError::CanopyLengthMismatch`] for a malformed
/// canopy or a range past the end of the lowest canopy level.
pub fn set_canopy_leaf_nodes<H: Hasher>(
    canopy_bytes: &mut [u8],
    empty_nodes: &EmptyNodes,
    start_index: u32,
    nodes: &[Node],
) -> Result<(), AccountCompressionError> {
    let max_depth = empty_nodes.max_depth() as u32;
    let canopy = canopy_nodes_mut(canopy_bytes)?;
    let path_len = cached_path_length(canopy, max_depth)?;
    if nodes.is_empty() {
        return Ok(());
    }
    if start_index as usize + nodes.len() > 1usize << path_len {
        log!(
            "canopy leaf range {}+{} exceeds {} canopy leaves",
            start_index,
            nodes.len(),
            1u64 << path_len
        );
        return Err(AccountCompressionError::CanopyLengthMismatch);
    }

    let mut start_node = leaf_node_index_to_canopy_index(path_len, start_index);
    canopy[start_node - 2..start_node - 2 + nodes.len()].copy_from_slice(nodes);

    let mut end_node = start_node + nodes.len() - 1;
    let leaf_level = (max_depth - path_len) as usize;
    for level in leaf_level + 1..max_depth as usize {
        start_node >>= 1;
        end_node >>= 1;
        for node in start_node..=end_node {
            let left = node_or_empty(canopy, node << 1, level - 1, empty_nodes);
            let right = node_or_empty(canopy, (node << 1) + 1, level - 1, empty_nodes);
            canopy[node - 2] = H::hashv(&[&left, &right])
                .map_err(|_| ConcurrentMerkleTreeError::HashFailed)?;
        }
    }
    Ok(())
}

/// Check that the top canopy level hashes to `expected_root`.
///
/// An empty canopy always passes.
///
/// # Errors
/// Returns [`AccountCompressionError::CanopyRootMismatch`] otherwise.
pub fn check_canopy_root<H: Hasher>(
    canopy_bytes: &[u8],
    empty_nodes: &EmptyNodes,
    expected_root: &Node,
) -> Result<(), AccountCompressionError> {
    let max_depth = empty_nodes.max_depth() as u32;
    let canopy = canopy_nodes(canopy_bytes)?;
    if canopy.is_empty() {
        return Ok(());
    }
    cached_path_length(canopy, max_depth)?;
    let level = max_depth as usize - 1;
    let left = node_or_empty(canopy, 2, level, empty_nodes);
    let right = node_or_empty(canopy, 3, level, empty_nodes);
    let root = H::hashv(&[&left, &right]).map_err(|_| ConcurrentMerkleTreeError::HashFailed)?;
    if root != *expected_root {
        log!("canopy root does not match the expected root");
        return Err(AccountCompressionError::CanopyRootMismatch);
    }
    Ok(())
}

/// Check that no canopy node lies entirely to the right of leaf `index`.
///
/// # Errors
/// - [`ConcurrentMerkleTreeError::LeafIndexOutOfBounds`] if `index >= 2^max_depth`
/// - [`AccountCompressionError::CanopyRightmostLeafMismatch`] if such a node is set
pub fn check_canopy_no_nodes_to_right_of_index(
    canopy_bytes: &[u8],
    max_depth: u32,
    index: u32,
) -> Result<(), AccountCompressionError> {
    let canopy = canopy_nodes(canopy_bytes)?;
    let path_len = cached_path_length(canopy, max_depth)?;
    if u64::from(index) >= 1u64 << max_depth {
        return Err(ConcurrentMerkleTreeError::LeafIndexOutOfBounds.into());
    }

    let mut node_idx = (((1u32 << max_depth) + index) >> (max_depth - path_len)) as usize;
    // Walk up from the lowest canopy level; each level spans [2^l, 2^(l+1))
    while node_idx > 1 {
        let level_end = 1usize << (usize::BITS - node_idx.leading_zeros());
        for right in node_idx + 1..level_end {
            if canopy[right - 2] != EMPTY {
                log!("canopy node {} is right of leaf {}", right, index);
                return Err(AccountCompressionError::CanopyRightmostLeafMismatch);
            }
        }
        node_idx >>= 1;
    }
    Ok(())
}

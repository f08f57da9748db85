//! Change log event definition.

use super::{Event, EventType};
use alloc::vec::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use concurrent_merkle_tree::{ChangeLog, Node};
use pinocchio::pubkey::Pubkey;

/// A node on a mutation's route together with its heap index.
///
/// Heap indices number the root `1` and the children of `i` as `2i` and
/// `2i + 1`, so leaf `l` of a depth `D` tree is node `2^D + l`.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathNode {
    /// Node value after the mutation
    pub node: Node,
    /// Heap index of the node
    pub index: u32,
}

impl PathNode {
    /// Pair a node with its heap index.
    pub const fn new(node: Node, index: u32) -> Self {
        Self { node, index }
    }
}

/// Event emitted for every tree mutation and for initialization.
///
/// Carries the full leaf-to-root route, so an indexer holding the previous
/// tree can apply the change without reading the account.
///
/// # Usage by Indexers
///
/// 1. Check `seq` is one past the last event seen for `tree_id`
/// 2. Write every `path` node at its heap index
/// 3. Compare `root` with the last path node
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChangeLogEvent {
    /// Tree account the change was applied to.
    pub tree_id: Pubkey,
    /// Root after the change.
    pub root: Node,
    /// Leaf value before the change, [`EMPTY`](concurrent_merkle_tree::EMPTY) for appends.
    pub previous_leaf: Node,
    /// Leaf value after the change.
    pub new_leaf: Node,
    /// Leaf index written.
    pub index: u32,
    /// Tree sequence number after the change.
    pub seq: u64,
    /// Route from the leaf up to and including the root.
    pub path: Vec<PathNode>,
}

impl Event for ChangeLogEvent {
    const EVENT_TYPE: EventType = EventType::ChangeLog;
}

/// Heap index of the route node at `level` above leaf `index`.
#[inline]
pub const fn heap_index(max_depth: u32, index: u32, level: u32) -> u32 {
    (1 << (max_depth - level)) + (index >> level)
}

impl ChangeLogEvent {
    /// Describe the mutation recorded in `change_log`.
    pub fn new(tree_id: Pubkey, change_log: &ChangeLog, previous_leaf: Node, seq: u64) -> Self {
        let max_depth = change_log.path.len() as u32;
        let index = change_log.index;
        let mut path = Vec::with_capacity(change_log.path.len() + 1);
        for (level, node) in change_log.path.iter().enumerate() {
            path.push(PathNode::new(*node, heap_index(max_depth, index, level as u32)));
        }
        path.push(PathNode::new(change_log.root, 1));

        Self {
            tree_id,
            root: change_log.root,
            previous_leaf,
            new_leaf: change_log.leaf(),
            index,
            seq,
            path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concurrent_merkle_tree::EMPTY;
    use light_hasher::Sha256;

    #[test]
    fn test_heap_indices_run_leaf_to_root() {
        let proof = [[1u8; 32], [2u8; 32], [3u8; 32]];
        let change_log = ChangeLog::from_proof::<Sha256>([9u8; 32], &proof, 5).unwrap();
        let event = ChangeLogEvent::new([7u8; 32], &change_log, EMPTY, 3);

        let indices: Vec<u32> = event.path.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![13, 6, 3, 1]);
        assert_eq!(event.path[0].node, [9u8; 32]);
        assert_eq!(event.path[3].node, change_log.root);
        assert_eq!(event.root, change_log.root);
        assert_eq!(event.new_leaf, [9u8; 32]);
        assert_eq!(event.seq, 3);
    }

    #[test]
    fn test_event_bytes_decode() {
        let change_log = ChangeLog::from_proof::<Sha256>([1u8; 32], &[EMPTY; 3], 0).unwrap();
        let event = ChangeLogEvent::new([7u8; 32], &change_log, [2u8; 32], 1);
        let bytes = event.to_event_bytes().unwrap();

        assert_eq!(&bytes[..8], &1u64.to_le_bytes());
        assert_eq!(&bytes[8..40], &[7u8; 32], "tree_id follows the discriminator");
        assert_eq!(ChangeLogEvent::from_event_bytes(&bytes).unwrap(), event);
    }
}

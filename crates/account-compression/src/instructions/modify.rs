//! Leaf mutation handlers: `Append`, `ReplaceLeaf` and `InsertOrAppend`.
//!
//! All three share the same shape: authorize, complete the proof from the
//! canopy, mutate an in-memory copy of the tree, then commit.

use concurrent_merkle_tree::{EMPTY, Node};
use light_hasher::Hasher;

use super::{Context, commit, complete_proof};
use crate::{
    authority::assert_valid_authority,
    errors::AccountCompressionError,
    events::ChangeLogEvent,
    state::{TreeAccountMut, load_tree},
};

/// Instruction data for `ReplaceLeaf`.
#[derive(Clone, Copy, Debug)]
pub struct ReplaceLeafData<'a> {
    /// Root the proof was built against
    pub root: Node,
    /// Leaf value the caller expects at `index`
    pub previous_leaf: Node,
    /// Value to write
    pub new_leaf: Node,
    /// Leaf index
    pub index: u32,
    /// Proof of `previous_leaf`, possibly truncated by the canopy depth
    pub proof: &'a [Node],
}

/// Instruction data for `InsertOrAppend`.
#[derive(Clone, Copy, Debug)]
pub struct InsertOrAppendData<'a> {
    /// Root the proof was built against
    pub root: Node,
    /// Value to write
    pub leaf: Node,
    /// Leaf index to fill if it is empty
    pub index: u32,
    /// Proof of an empty leaf at `index`, possibly truncated by the canopy depth
    pub proof: &'a [Node],
}

/// Process append instruction.
///
/// Writes `leaf` after the rightmost leaf. No proof is needed.
///
/// # Errors
/// - [`AccountCompressionError::Unauthorized`] if the signer is not the authority
/// - [`AccountCompressionError::TreeNotInitialized`] for a prepared tree without a root
/// - [`ConcurrentMerkleTreeError::TreeFull`](concurrent_merkle_tree::ConcurrentMerkleTreeError::TreeFull)
///   once every leaf is used
pub fn process_append<H: Hasher>(ctx: Context<'_>, leaf: Node) -> Result<(), AccountCompressionError> {
    let account = TreeAccountMut::split(ctx.tree)?;
    assert_valid_authority(&account.header, ctx.signer)?;

    let mut tree = load_tree::<H>(&account.header, account.tree_bytes)?;
    tree.append(leaf)?;

    let event = ChangeLogEvent::new(*ctx.tree_id, tree.change_log(), EMPTY, tree.sequence_number());
    commit(account, &tree, &event, ctx.sink)
}

/// Process replace leaf instruction.
///
/// Replaces `previous_leaf` at `index`. The proof may be stale by up to the
/// changelog capacity. Writing the next append position with an
/// [`EMPTY`] previous leaf appends.
///
/// # Errors
/// - [`AccountCompressionError::Unauthorized`] if the signer is not the authority
/// - [`ConcurrentMerkleTreeError::LeafIndexOutOfBounds`](concurrent_merkle_tree::ConcurrentMerkleTreeError::LeafIndexOutOfBounds)
///   if `index >= 2^max_depth` or past the next append position
/// - [`AccountCompressionError::CanopyMismatch`] if the proof is too short for the canopy
/// - [`ConcurrentMerkleTreeError::LeafContentMismatch`](concurrent_merkle_tree::ConcurrentMerkleTreeError::LeafContentMismatch)
///   if the leaf is not `previous_leaf`
/// - [`ConcurrentMerkleTreeError::ConcurrentModification`](concurrent_merkle_tree::ConcurrentMerkleTreeError::ConcurrentModification)
///   if the proof cannot be fast-forwarded
pub fn process_replace_leaf<H: Hasher>(
    ctx: Context<'_>,
    data: ReplaceLeafData<'_>,
) -> Result<(), AccountCompressionError> {
    let account = TreeAccountMut::split(ctx.tree)?;
    assert_valid_authority(&account.header, ctx.signer)?;
    account.header.assert_valid_leaf_index(data.index)?;

    let mut tree = load_tree::<H>(&account.header, account.tree_bytes)?;
    let proof = complete_proof(account.canopy_bytes, tree.empty_nodes(), data.index, data.proof)?;
    tree.set_leaf(data.root, data.previous_leaf, data.new_leaf, &proof, data.index)?;

    let event = ChangeLogEvent::new(
        *ctx.tree_id,
        tree.change_log(),
        data.previous_leaf,
        tree.sequence_number(),
    );
    commit(account, &tree, &event, ctx.sink)
}

/// Process insert or append instruction.
///
/// Writes `leaf` at `index` if that leaf is currently empty, otherwise
/// appends it. The event reports the index actually written.
///
/// # Errors
/// - [`AccountCompressionError::Unauthorized`] if the signer is not the authority
/// - [`ConcurrentMerkleTreeError::LeafIndexOutOfBounds`](concurrent_merkle_tree::ConcurrentMerkleTreeError::LeafIndexOutOfBounds)
///   if `index >= 2^max_depth`
/// - [`AccountCompressionError::CanopyMismatch`] if the proof is too short for the canopy
/// - [`ConcurrentMerkleTreeError::ConcurrentModification`](concurrent_merkle_tree::ConcurrentMerkleTreeError::ConcurrentModification)
///   if the proof cannot be fast-forwarded
/// - [`ConcurrentMerkleTreeError::TreeFull`](concurrent_merkle_tree::ConcurrentMerkleTreeError::TreeFull)
///   if the fallback append finds no room
pub fn process_insert_or_append<H: Hasher>(
    ctx: Context<'_>,
    data: InsertOrAppendData<'_>,
) -> Result<(), AccountCompressionError> {
    let account = TreeAccountMut::split(ctx.tree)?;
    assert_valid_authority(&account.header, ctx.signer)?;
    account.header.assert_valid_leaf_index(data.index)?;

    let mut tree = load_tree::<H>(&account.header, account.tree_bytes)?;
    let proof = complete_proof(account.canopy_bytes, tree.empty_nodes(), data.index, data.proof)?;
    tree.fill_empty_or_append(data.root, data.leaf, &proof, data.index)?;

    let event = ChangeLogEvent::new(*ctx.tree_id, tree.change_log(), EMPTY, tree.sequence_number());
    commit(account, &tree, &event, ctx.sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::{Event, NoopSink},
        instructions::process_initialize,
        state::{TreeConfig, account_size, current_root, sequence_number},
        test_utils::{FailingSink, RecordingSink},
    };
    use concurrent_merkle_tree::{ConcurrentMerkleTree, ConcurrentMerkleTreeError};
    use light_hasher::Sha256;

    const TREE_ID: [u8; 32] = [9u8; 32];
    const AUTHORITY: [u8; 32] = [1u8; 32];

    fn new_account(depth: u32, buffer: u32, canopy: u32) -> Vec<u8> {
        let mut data = vec![0u8; account_size(depth, buffer, canopy)];
        process_initialize::<Sha256>(
            Context::new(&mut data, &TREE_ID, &AUTHORITY, &mut NoopSink),
            TreeConfig::new(depth, buffer, canopy),
            0,
        )
        .unwrap();
        data
    }

    fn append(data: &mut [u8], leaf: Node) -> Result<(), AccountCompressionError> {
        process_append::<Sha256>(Context::new(data, &TREE_ID, &AUTHORITY, &mut NoopSink), leaf)
    }

    #[test]
    fn test_append_tracks_in_memory_tree() {
        let mut data = new_account(3, 8, 0);
        let mut expected = ConcurrentMerkleTree::<Sha256>::new(3, 8).unwrap();

        for i in 0..5u8 {
            append(&mut data, [i + 1; 32]).unwrap();
            expected.append([i + 1; 32]).unwrap();
        }

        assert_eq!(current_root(&data).unwrap(), expected.root());
        assert_eq!(sequence_number(&data).unwrap(), 5);
    }

    #[test]
    fn test_append_requires_authority() {
        let mut data = new_account(3, 8, 0);
        let before = data.clone();
        assert_eq!(
            process_append::<Sha256>(
                Context::new(&mut data, &TREE_ID, &[2u8; 32], &mut NoopSink),
                [1u8; 32]
            ),
            Err(AccountCompressionError::Unauthorized)
        );
        assert_eq!(data, before);
    }

    #[test]
    fn test_replace_leaf_with_canopy_truncated_proof() {
        let mut data = new_account(5, 8, 2);
        let mut expected = ConcurrentMerkleTree::<Sha256>::new(5, 8).unwrap();
        for i in 0..4u8 {
            append(&mut data, [i + 1; 32]).unwrap();
            expected.append([i + 1; 32]).unwrap();
        }

        // Leaf 2 of a depth-5 tree with leaves 1..4: siblings are leaf 3,
        // the hash of leaves 0 and 1, then empty subtrees
        let full_proof = [
            [4u8; 32],
            Sha256::hashv(&[&[1u8; 32], &[2u8; 32]]).unwrap(),
            expected.empty_node(2),
            expected.empty_node(3),
            expected.empty_node(4),
        ];
        let root = expected.root();
        let mut sink = RecordingSink::default();
        process_replace_leaf::<Sha256>(
            Context::new(&mut data, &TREE_ID, &AUTHORITY, &mut sink),
            ReplaceLeafData {
                root,
                previous_leaf: [3u8; 32],
                new_leaf: [7u8; 32],
                index: 2,
                proof: &full_proof[..3],
            },
        )
        .unwrap();
        expected
            .set_leaf(root, [3u8; 32], [7u8; 32], &full_proof, 2)
            .unwrap();

        assert_eq!(current_root(&data).unwrap(), expected.root());
        let event = ChangeLogEvent::from_event_bytes(&sink.events[0].1).unwrap();
        assert_eq!(event.previous_leaf, [3u8; 32]);
        assert_eq!(event.new_leaf, [7u8; 32]);
        assert_eq!(event.index, 2);
        assert_eq!(event.seq, 5);
    }

    #[test]
    fn test_replace_leaf_short_proof_is_canopy_mismatch() {
        let mut data = new_account(5, 8, 2);
        append(&mut data, [1u8; 32]).unwrap();
        let root = current_root(&data).unwrap();
        let before = data.clone();

        assert_eq!(
            process_replace_leaf::<Sha256>(
                Context::new(&mut data, &TREE_ID, &AUTHORITY, &mut NoopSink),
                ReplaceLeafData {
                    root,
                    previous_leaf: [1u8; 32],
                    new_leaf: [2u8; 32],
                    index: 0,
                    proof: &[EMPTY; 2],
                },
            ),
            Err(AccountCompressionError::CanopyMismatch)
        );
        assert_eq!(data, before);
    }

    #[test]
    fn test_insert_or_append_falls_back_to_append() {
        let mut data = new_account(3, 8, 0);
        append(&mut data, [1u8; 32]).unwrap();
        let root = current_root(&data).unwrap();
        let mut sink = RecordingSink::default();

        // Leaf 0 is taken, so the new leaf lands at index 1
        let empty = ConcurrentMerkleTree::<Sha256>::new(3, 8).unwrap();
        let proof = [EMPTY, empty.empty_node(1), empty.empty_node(2)];
        process_insert_or_append::<Sha256>(
            Context::new(&mut data, &TREE_ID, &AUTHORITY, &mut sink),
            InsertOrAppendData {
                root,
                leaf: [2u8; 32],
                index: 0,
                proof: &proof,
            },
        )
        .unwrap();

        let event = ChangeLogEvent::from_event_bytes(&sink.events[0].1).unwrap();
        assert_eq!(event.index, 1);
        assert_eq!(event.new_leaf, [2u8; 32]);
    }

    #[test]
    fn test_sink_failure_leaves_account_untouched() {
        let mut data = new_account(3, 8, 1);
        let before = data.clone();
        assert_eq!(
            process_append::<Sha256>(
                Context::new(&mut data, &TREE_ID, &AUTHORITY, &mut FailingSink),
                [1u8; 32]
            ),
            Err(AccountCompressionError::EventSerializationFailed)
        );
        assert_eq!(data, before);
    }

    #[test]
    fn test_out_of_bounds_index() {
        let mut data = new_account(3, 8, 0);
        let root = current_root(&data).unwrap();
        assert_eq!(
            process_replace_leaf::<Sha256>(
                Context::new(&mut data, &TREE_ID, &AUTHORITY, &mut NoopSink),
                ReplaceLeafData {
                    root,
                    previous_leaf: EMPTY,
                    new_leaf: [2u8; 32],
                    index: 8,
                    proof: &[EMPTY; 3],
                },
            ),
            Err(ConcurrentMerkleTreeError::LeafIndexOutOfBounds.into())
        );
    }
}

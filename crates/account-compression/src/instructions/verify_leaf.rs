//! `VerifyLeaf` instruction handler.

use concurrent_merkle_tree::Node;
use light_hasher::Hasher;

use super::complete_proof;
use crate::{
    errors::AccountCompressionError,
    state::{TreeAccountRef, load_tree},
};

/// Instruction data for `VerifyLeaf`.
#[derive(Clone, Copy, Debug)]
pub struct VerifyLeafData<'a> {
    /// Root the proof was built against
    pub root: Node,
    /// Leaf value expected at `index`
    pub leaf: Node,
    /// Leaf index
    pub index: u32,
    /// Proof of `leaf`, possibly truncated by the canopy depth
    pub proof: &'a [Node],
}

/// Process verify leaf instruction.
///
/// Checks that `leaf` is currently stored at `index`, fast-forwarding a
/// stale proof through the changelog. Needs no signer and never writes.
///
/// # Errors
/// - [`AccountCompressionError::CanopyMismatch`] if the proof is too short for the canopy
/// - [`ConcurrentMerkleTreeError::LeafIndexOutOfBounds`](concurrent_merkle_tree::ConcurrentMerkleTreeError::LeafIndexOutOfBounds)
///   if `index` is past the rightmost leaf
/// - [`ConcurrentMerkleTreeError::InvalidProof`](concurrent_merkle_tree::ConcurrentMerkleTreeError::InvalidProof)
///   or [`ConcurrentMerkleTreeError::LeafContentMismatch`](concurrent_merkle_tree::ConcurrentMerkleTreeError::LeafContentMismatch)
///   if the leaf is not there
pub fn process_verify_leaf<H: Hasher>(
    tree: &[u8],
    data: VerifyLeafData<'_>,
) -> Result<(), AccountCompressionError> {
    let account = TreeAccountRef::split(tree)?;
    account.header.assert_valid_leaf_index(data.index)?;

    let tree = load_tree::<H>(&account.header, account.tree_bytes)?;
    let proof = complete_proof(account.canopy_bytes, tree.empty_nodes(), data.index, data.proof)?;
    tree.prove_leaf(data.root, data.leaf, &proof, data.index)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::NoopSink,
        instructions::{Context, process_append, process_initialize},
        state::{TreeConfig, account_size, current_root},
    };
    use concurrent_merkle_tree::{ConcurrentMerkleTree, ConcurrentMerkleTreeError, EMPTY};
    use light_hasher::Sha256;

    #[test]
    fn test_verify_leaf_does_not_write() {
        let mut data = vec![0u8; account_size(3, 8, 0)];
        process_initialize::<Sha256>(
            Context::new(&mut data, &[0u8; 32], &[1u8; 32], &mut NoopSink),
            TreeConfig::new(3, 8, 0),
            0,
        )
        .unwrap();
        process_append::<Sha256>(
            Context::new(&mut data, &[0u8; 32], &[1u8; 32], &mut NoopSink),
            [4u8; 32],
        )
        .unwrap();
        let root = current_root(&data).unwrap();
        let empty = ConcurrentMerkleTree::<Sha256>::new(3, 8).unwrap();
        let proof = [EMPTY, empty.empty_node(1), empty.empty_node(2)];
        let before = data.clone();

        process_verify_leaf::<Sha256>(
            &data,
            VerifyLeafData {
                root,
                leaf: [4u8; 32],
                index: 0,
                proof: &proof,
            },
        )
        .unwrap();
        assert_eq!(
            process_verify_leaf::<Sha256>(
                &data,
                VerifyLeafData {
                    root,
                    leaf: [5u8; 32],
                    index: 0,
                    proof: &proof,
                },
            ),
            Err(ConcurrentMerkleTreeError::InvalidProof.into())
        );
        assert_eq!(data, before);
    }
}

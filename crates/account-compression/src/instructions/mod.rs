//! Operations over a tree account buffer.
//!
//! Each handler takes the raw account bytes in a [`Context`] and either
//! applies the whole operation or returns an error with the bytes untouched.
//!
//! # Instruction Categories
//!
//! - **Lifecycle**: `initialize`, `prepare_batch`, `append_canopy_nodes`,
//!   `init_prepared_tree_with_root`, `close`
//! - **Leaf mutations**: `append`, `replace_leaf`, `insert_or_append`
//! - **Read-only**: `verify_leaf`
//! - **Admin**: `transfer_authority`
//!
//! # Commit Order
//!
//! 1. Split the account and check authority and leaf index
//! 2. Load the tree
//! 3. Complete the proof from the canopy and mutate the tree in memory
//! 4. Emit the change event
//! 5. Write the tree core, then refresh the canopy

mod batch;
mod close;
mod initialize;
mod modify;
mod transfer_authority;
mod verify_leaf;

// Re-export data structs
pub use batch::InitPreparedTreeData;
pub use modify::{InsertOrAppendData, ReplaceLeafData};
pub use verify_leaf::VerifyLeafData;

// Re-export handlers
pub use batch::{
    process_append_canopy_nodes, process_init_prepared_tree_with_root, process_prepare_batch,
};
pub use close::process_close;
pub use initialize::process_initialize;
pub use modify::{process_append, process_insert_or_append, process_replace_leaf};
pub use transfer_authority::process_transfer_authority;
pub use verify_leaf::process_verify_leaf;

use alloc::vec::Vec;
use concurrent_merkle_tree::{ConcurrentMerkleTree, EmptyNodes, Node};
use light_hasher::Hasher;
use pinocchio::pubkey::Pubkey;
use pinocchio_log::log;

use crate::{
    canopy::{canopy_depth, fill_in_proof_from_canopy, update_canopy},
    errors::AccountCompressionError,
    events::{ChangeLogEvent, EventSink, emit_event},
    state::{TreeAccountMut, store_tree, tree_core_size},
};

/// Inputs shared by every mutating operation.
pub struct Context<'a> {
    /// Tree account bytes
    pub tree: &'a mut [u8],
    /// Address of the tree account, copied into events
    pub tree_id: &'a Pubkey,
    /// Key that signed the operation
    pub signer: &'a Pubkey,
    /// Receives the events the operation emits
    pub sink: &'a mut dyn EventSink,
}

impl<'a> Context<'a> {
    /// Bundle the operation inputs.
    pub fn new(
        tree: &'a mut [u8],
        tree_id: &'a Pubkey,
        signer: &'a Pubkey,
        sink: &'a mut dyn EventSink,
    ) -> Self {
        Self {
            tree,
            tree_id,
            signer,
            sink,
        }
    }
}

/// Append the canopy nodes `proof` is missing for leaf `index`.
///
/// `empty_nodes` is the table of the tree the proof belongs to.
///
/// # Errors
/// - [`AccountCompressionError::CanopyLengthMismatch`] for a malformed canopy
/// - [`AccountCompressionError::CanopyMismatch`] if the proof is still short
pub(crate) fn complete_proof(
    canopy_bytes: &[u8],
    empty_nodes: &EmptyNodes,
    index: u32,
    proof: &[Node],
) -> Result<Vec<Node>, AccountCompressionError> {
    let max_depth = empty_nodes.max_depth();
    let mut proof = proof.to_vec();
    fill_in_proof_from_canopy(canopy_bytes, empty_nodes, index, &mut proof)?;
    if proof.len() < max_depth {
        log!(
            "proof of {} nodes does not reach depth {} with the canopy",
            proof.len(),
            max_depth
        );
        return Err(AccountCompressionError::CanopyMismatch);
    }
    Ok(proof)
}

/// Emit `event`, then write `tree` and refresh the canopy.
///
/// Everything that can fail before the first write is checked first.
pub(crate) fn commit<H: Hasher>(
    account: TreeAccountMut<'_>,
    tree: &ConcurrentMerkleTree<H>,
    event: &ChangeLogEvent,
    sink: &mut dyn EventSink,
) -> Result<(), AccountCompressionError> {
    canopy_depth(account.canopy_bytes, tree.max_depth())?;
    if account.tree_bytes.len() != tree_core_size(tree.max_depth(), tree.max_buffer_size()) {
        return Err(AccountCompressionError::AccountSizeMismatch);
    }
    emit_event(sink, event)?;
    store_tree(tree, account.tree_bytes)?;
    update_canopy(account.canopy_bytes, tree.max_depth(), Some(event))
}

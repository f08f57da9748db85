//! Batch initialization handlers.
//!
//! Large trees can be built off-chain and installed in three steps:
//!
//! 1. `prepare_batch` writes the header and leaves the tree core zeroed
//! 2. `append_canopy_nodes` uploads the lowest canopy level, possibly in
//!    several calls
//! 3. `init_prepared_tree_with_root` checks the canopy against the root and
//!    installs the tree from its rightmost leaf and proof
//!
//! Until step 3 succeeds every leaf operation fails with `TreeNotInitialized`.

use concurrent_merkle_tree::{ConcurrentMerkleTree, EMPTY, EmptyNodes, Node};
use light_hasher::Hasher;
use pinocchio_log::log;

use super::{Context, commit, complete_proof};
use crate::{
    authority::assert_valid_authority,
    canopy::{check_canopy_no_nodes_to_right_of_index, check_canopy_root, set_canopy_leaf_nodes},
    errors::AccountCompressionError,
    events::ChangeLogEvent,
    state::{
        CONCURRENT_MERKLE_TREE_HEADER_SIZE, ConcurrentMerkleTreeHeader, TreeAccountMut, TreeConfig,
        tree_bytes_uninitialized,
    },
};

/// Instruction data for `InitPreparedTreeWithRoot`.
#[derive(Clone, Copy, Debug)]
pub struct InitPreparedTreeData<'a> {
    /// Root of the tree built off-chain
    pub root: Node,
    /// Rightmost (last written) leaf
    pub rightmost_leaf: Node,
    /// Index of the rightmost leaf
    pub rightmost_index: u32,
    /// Proof of the rightmost leaf, possibly truncated by the canopy depth
    pub proof: &'a [Node],
}

fn assert_prepared(account: &TreeAccountMut<'_>) -> Result<(), AccountCompressionError> {
    account.header.assert_is_batch_initialized()?;
    if !tree_bytes_uninitialized(account.tree_bytes) {
        log!("batch: tree already holds a root");
        return Err(AccountCompressionError::TreeAlreadyInitialized);
    }
    Ok(())
}

/// Process prepare batch instruction.
///
/// Writes a batch-flagged header for `config` and leaves the tree core
/// zeroed. The signer becomes the tree authority. No event is emitted.
///
/// # Errors
/// Same as [`process_initialize`](super::process_initialize).
pub fn process_prepare_batch(
    ctx: Context<'_>,
    config: TreeConfig,
    creation_slot: u64,
) -> Result<(), AccountCompressionError> {
    let data = ctx.tree;
    let mut header = ConcurrentMerkleTreeHeader::read(data)?;
    header.assert_uninitialized()?;
    config.validate()?;
    if data.len() != config.account_size() {
        log!(
            "prepare_batch: account has {} bytes, expected {}",
            data.len(),
            config.account_size()
        );
        return Err(AccountCompressionError::AccountSizeMismatch);
    }

    header.initialize_batched(&config, ctx.signer, creation_slot);
    header.write(data)?;
    data[CONCURRENT_MERKLE_TREE_HEADER_SIZE..].fill(0);

    log!(
        "prepare_batch: depth {} buffer {} canopy {}",
        config.max_depth,
        config.max_buffer_size,
        config.canopy_depth
    );
    Ok(())
}

/// Process append canopy nodes instruction.
///
/// Writes `nodes` into the lowest canopy level from `start_index` on and
/// rehashes the canopy above them.
///
/// # Errors
/// - [`AccountCompressionError::BatchNotInitialized`] unless the account was prepared
/// - [`AccountCompressionError::TreeAlreadyInitialized`] once a root is installed
/// - [`AccountCompressionError::Unauthorized`] if the signer is not the authority
/// - [`AccountCompressionError::CanopyLengthMismatch`] if the range exceeds the canopy
pub fn process_append_canopy_nodes<H: Hasher>(
    ctx: Context<'_>,
    start_index: u32,
    nodes: &[Node],
) -> Result<(), AccountCompressionError> {
    let account = TreeAccountMut::split(ctx.tree)?;
    assert_prepared(&account)?;
    assert_valid_authority(&account.header, ctx.signer)?;

    let empty_nodes = EmptyNodes::new::<H>(account.header.max_depth as usize)?;
    set_canopy_leaf_nodes::<H>(account.canopy_bytes, &empty_nodes, start_index, nodes)
}

/// Process init prepared tree with root instruction.
///
/// Installs a tree whose leaves were written off-chain. The uploaded canopy
/// must hash to `root` and must not extend past the rightmost leaf; the
/// rightmost proof must verify against `root`.
///
/// # Errors
/// - [`AccountCompressionError::BatchNotInitialized`] unless the account was prepared
/// - [`AccountCompressionError::TreeAlreadyInitialized`] once a root is installed
/// - [`AccountCompressionError::Unauthorized`] if the signer is not the authority
/// - [`AccountCompressionError::CanopyRootMismatch`] if the canopy disagrees with `root`
/// - [`AccountCompressionError::CanopyRightmostLeafMismatch`] if the canopy has nodes
///   right of the rightmost leaf
/// - [`ConcurrentMerkleTreeError::InvalidProof`](concurrent_merkle_tree::ConcurrentMerkleTreeError::InvalidProof)
///   if the rightmost proof does not reach `root`
pub fn process_init_prepared_tree_with_root<H: Hasher>(
    ctx: Context<'_>,
    data: InitPreparedTreeData<'_>,
) -> Result<(), AccountCompressionError> {
    let account = TreeAccountMut::split(ctx.tree)?;
    assert_prepared(&account)?;
    assert_valid_authority(&account.header, ctx.signer)?;
    account.header.assert_valid_leaf_index(data.rightmost_index)?;

    let max_depth = account.header.max_depth;
    let tree = ConcurrentMerkleTree::<H>::new(max_depth, account.header.max_buffer_size)?;
    check_canopy_root::<H>(account.canopy_bytes, tree.empty_nodes(), &data.root)?;
    check_canopy_no_nodes_to_right_of_index(account.canopy_bytes, max_depth, data.rightmost_index)?;

    let proof = complete_proof(
        account.canopy_bytes,
        tree.empty_nodes(),
        data.rightmost_index,
        data.proof,
    )?;
    let tree = tree.with_root(data.root, data.rightmost_leaf, &proof, data.rightmost_index)?;

    let event = ChangeLogEvent::new(*ctx.tree_id, tree.change_log(), EMPTY, tree.sequence_number());
    commit(account, &tree, &event, ctx.sink)?;

    log!("init_prepared_tree_with_root: rightmost index {}", data.rightmost_index);
    Ok(())
}

//! `Initialize` instruction handler.
//!
//! Creates an empty tree in a zeroed or closed account. The signer becomes
//! the tree authority.

use concurrent_merkle_tree::{ConcurrentMerkleTree, EMPTY};
use light_hasher::Hasher;
use pinocchio_log::log;

use super::Context;
use crate::{
    canopy::canopy_depth,
    errors::AccountCompressionError,
    events::{ChangeLogEvent, emit_event},
    state::{CONCURRENT_MERKLE_TREE_HEADER_SIZE, ConcurrentMerkleTreeHeader, TreeConfig, store_tree},
};

/// Process initialize instruction.
///
/// The account must be exactly [`TreeConfig::account_size`] bytes. The
/// canopy is cleared and the genesis change event is emitted with `seq = 0`.
///
/// # Errors
/// - [`AccountCompressionError::TreeAlreadyInitialized`] if the header is already set
/// - [`ConcurrentMerkleTreeError::UnsupportedDepthSizePair`](concurrent_merkle_tree::ConcurrentMerkleTreeError::UnsupportedDepthSizePair)
///   or [`AccountCompressionError::CanopyLengthMismatch`] for an invalid `config`
/// - [`AccountCompressionError::AccountSizeMismatch`] if the account has the wrong size
pub fn process_initialize<H: Hasher>(
    ctx: Context<'_>,
    config: TreeConfig,
    creation_slot: u64,
) -> Result<(), AccountCompressionError> {
    let Context {
        tree: data,
        tree_id,
        signer,
        sink,
    } = ctx;

    let mut header = ConcurrentMerkleTreeHeader::read(data)?;
    header.assert_uninitialized()?;
    config.validate()?;
    if data.len() != config.account_size() {
        log!(
            "initialize: account has {} bytes, expected {}",
            data.len(),
            config.account_size()
        );
        return Err(AccountCompressionError::AccountSizeMismatch);
    }

    let tree = ConcurrentMerkleTree::<H>::new(config.max_depth, config.max_buffer_size)?;
    header.initialize(&config, signer, creation_slot);

    let (header_bytes, rest) = data.split_at_mut(CONCURRENT_MERKLE_TREE_HEADER_SIZE);
    let (tree_bytes, canopy_bytes) = rest.split_at_mut(config.tree_size());
    canopy_depth(canopy_bytes, config.max_depth)?;

    let event = ChangeLogEvent::new(*tree_id, tree.change_log(), EMPTY, tree.sequence_number());
    emit_event(sink, &event)?;

    header.write(header_bytes)?;
    store_tree(&tree, tree_bytes)?;
    canopy_bytes.fill(0);

    log!(
        "initialize: depth {} buffer {} canopy {}",
        config.max_depth,
        config.max_buffer_size,
        config.canopy_depth
    );
    Ok(())
}

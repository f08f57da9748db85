//! `Close` instruction handler.
//!
//! Zeroes an empty tree account so it can be reinitialized or reclaimed.

use light_hasher::Hasher;
use pinocchio_log::log;

use super::Context;
use crate::{
    authority::assert_valid_authority,
    errors::AccountCompressionError,
    events::{TreeClosedEvent, emit_event},
    state::{TreeAccountRef, load_tree, tree_bytes_uninitialized},
};

/// Process close instruction.
///
/// The tree must hold no leaves: either every leaf was replaced with
/// [`EMPTY`](concurrent_merkle_tree::EMPTY), or the account was prepared for
/// batch initialization and never received a root. On success the whole
/// account, header included, is zeroed.
///
/// # Errors
/// - [`AccountCompressionError::Unauthorized`] if the signer is not the authority
/// - [`ConcurrentMerkleTreeError::TreeNotEmpty`](concurrent_merkle_tree::ConcurrentMerkleTreeError::TreeNotEmpty)
///   if any leaf is set
pub fn process_close<H: Hasher>(ctx: Context<'_>) -> Result<(), AccountCompressionError> {
    let account = TreeAccountRef::split(ctx.tree)?;
    assert_valid_authority(&account.header, ctx.signer)?;

    if !tree_bytes_uninitialized(account.tree_bytes) {
        let tree = load_tree::<H>(&account.header, account.tree_bytes)?;
        tree.prove_tree_is_empty()?;
    }

    let event = TreeClosedEvent {
        tree_id: *ctx.tree_id,
        authority: account.header.authority,
    };
    emit_event(ctx.sink, &event)?;
    ctx.tree.fill(0);

    log!("close: tree account zeroed");
    Ok(())
}

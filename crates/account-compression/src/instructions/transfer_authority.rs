//! `TransferAuthority` instruction handler.
//!
//! Replaces the tree authority in a single step. The new authority takes
//! effect immediately.

use pinocchio::pubkey::Pubkey;
use pinocchio_log::log;

use super::Context;
use crate::{
    authority::transfer_authority_impl,
    errors::AccountCompressionError,
    events::{AuthorityTransferredEvent, emit_event},
    state::TreeAccountMut,
};

/// Process transfer authority instruction.
///
/// Works on prepared trees as well as initialized ones.
///
/// # Errors
/// - [`AccountCompressionError::IncorrectAccountType`] if the account is not a tree
/// - [`AccountCompressionError::Unauthorized`] if the signer is not the authority
pub fn process_transfer_authority(
    ctx: Context<'_>,
    new_authority: &Pubkey,
) -> Result<(), AccountCompressionError> {
    let mut account = TreeAccountMut::split(ctx.tree)?;
    let previous_authority = account.header.authority;
    transfer_authority_impl(&mut account.header, ctx.signer, new_authority)?;

    let event = AuthorityTransferredEvent {
        tree_id: *ctx.tree_id,
        previous_authority,
        new_authority: *new_authority,
    };
    emit_event(ctx.sink, &event)?;
    account.header.write(account.header_bytes)?;

    log!("transfer_authority: authority replaced");
    Ok(())
}

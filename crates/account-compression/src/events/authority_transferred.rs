//! Authority transferred event definition.

use super::{Event, EventType};
use borsh::{BorshDeserialize, BorshSerialize};
use pinocchio::pubkey::Pubkey;

/// Event emitted after `transfer_authority` replaces the tree authority.
///
/// # Security Considerations
///
/// The new authority controls every leaf of the tree, so indexers should
/// alert on unexpected transfers.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuthorityTransferredEvent {
    /// Tree account whose authority changed.
    pub tree_id: Pubkey,
    /// Authority that signed the transfer.
    pub previous_authority: Pubkey,
    /// Authority from now on.
    pub new_authority: Pubkey,
}

impl Event for AuthorityTransferredEvent {
    const EVENT_TYPE: EventType = EventType::AuthorityTransferred;
}

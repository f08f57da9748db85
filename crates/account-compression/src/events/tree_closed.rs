//! Tree closed event definition.

use super::{Event, EventType};
use borsh::{BorshDeserialize, BorshSerialize};
use pinocchio::pubkey::Pubkey;

/// Event emitted when an empty tree account is closed and zeroed.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct TreeClosedEvent {
    /// Tree account that was closed.
    pub tree_id: Pubkey,
    /// Authority that closed it.
    pub authority: Pubkey,
}

impl Event for TreeClosedEvent {
    const EVENT_TYPE: EventType = EventType::TreeClosed;
}

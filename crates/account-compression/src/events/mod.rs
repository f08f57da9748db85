//! Event definitions for tree accounts.
//!
//! Every mutation hands one encoded event to an [`EventSink`] supplied by the
//! caller, so indexers can mirror the tree off-chain from events alone.
//!
//! # Event Types
//!
//! ## Core Events (1-15)
//! - [`ChangeLogEvent`] - Emitted by initialize and every leaf mutation
//!
//! ## Admin Events (48-63)
//! - [`AuthorityTransferredEvent`] - Emitted when the tree authority changes
//! - [`TreeClosedEvent`] - Emitted when an empty tree is closed
//!
//! # Wire Format
//!
//! ```text
//! [discriminator: 8 bytes (EventType as u64 LE)]
//! [body: Borsh-serialized event]
//! ```
//!
//! Operations emit before writing the account, so a sink error leaves the
//! account untouched.

mod authority_transferred;
mod change_log;
mod tree_closed;

pub use authority_transferred::*;
pub use change_log::*;
pub use tree_closed::*;

use alloc::vec::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use pinocchio_log::log;

use crate::errors::AccountCompressionError;

/// Bytes of the discriminator prefix.
pub const EVENT_DISCRIMINATOR_SIZE: usize = 8;

/// Event type discriminators for identifying event types in logs.
///
/// # Ranges
/// - **1-15**: Core events (tree mutations)
/// - **48-63**: Admin events (authority and lifecycle)
#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::IntoStaticStr)]
pub enum EventType {
    // =========================================================================
    // Core Events (1-15)
    // =========================================================================
    /// Leaf written, appended or tree initialized
    ChangeLog = 1,
    // Reserved: 2-15

    // =========================================================================
    // Admin Events (48-63)
    // =========================================================================
    /// Tree authority replaced
    AuthorityTransferred = 48,
    /// Empty tree closed and zeroed
    TreeClosed = 49,
    // Reserved: 50-63
}

impl EventType {
    /// Discriminator written before the event body.
    pub const fn discriminator(self) -> u64 {
        self as u64
    }

    /// Event name for logs.
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// An event with a fixed discriminator and a Borsh body.
pub trait Event: BorshSerialize + BorshDeserialize {
    /// Discriminator of this event.
    const EVENT_TYPE: EventType;

    /// Encode as `[discriminator | borsh body]`.
    ///
    /// # Errors
    /// Returns [`AccountCompressionError::EventSerializationFailed`] if Borsh fails.
    fn to_event_bytes(&self) -> Result<Vec<u8>, AccountCompressionError> {
        let mut bytes = Vec::with_capacity(EVENT_DISCRIMINATOR_SIZE + 64);
        bytes.extend_from_slice(&Self::EVENT_TYPE.discriminator().to_le_bytes());
        self.serialize(&mut bytes)
            .map_err(|_| AccountCompressionError::EventSerializationFailed)?;
        Ok(bytes)
    }

    /// Decode bytes produced by [`to_event_bytes`](Self::to_event_bytes).
    ///
    /// # Errors
    /// Returns [`AccountCompressionError::EventSerializationFailed`] for a
    /// foreign discriminator or a malformed body.
    fn from_event_bytes(bytes: &[u8]) -> Result<Self, AccountCompressionError>
    where
        Self: Sized,
    {
        let (discriminator, body) = bytes
            .split_first_chunk::<EVENT_DISCRIMINATOR_SIZE>()
            .ok_or(AccountCompressionError::EventSerializationFailed)?;
        if u64::from_le_bytes(*discriminator) != Self::EVENT_TYPE.discriminator() {
            return Err(AccountCompressionError::EventSerializationFailed);
        }
        borsh::from_slice(body).map_err(|_| AccountCompressionError::EventSerializationFailed)
    }
}

/// Destination for encoded events.
pub trait EventSink {
    /// Accept one encoded event.
    ///
    /// # Errors
    /// Any error aborts the operation that produced the event.
    fn emit(&mut self, event_type: EventType, data: &[u8]) -> Result<(), AccountCompressionError>;
}

/// Writes events to the program log as raw data.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event_type: EventType, data: &[u8]) -> Result<(), AccountCompressionError> {
        log!("event {}: {} bytes", event_type.name(), data.len());
        pinocchio::log::sol_log_data(&[data]);
        Ok(())
    }
}

/// Drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&mut self, _event_type: EventType, _data: &[u8]) -> Result<(), AccountCompressionError> {
        Ok(())
    }
}

/// Encode `event` and hand it to `sink`.
///
/// # Errors
/// - [`AccountCompressionError::EventSerializationFailed`] if encoding fails
/// - any error returned by the sink
pub fn emit_event<T: Event>(
    sink: &mut dyn EventSink,
    event: &T,
) -> Result<(), AccountCompressionError> {
    let data = event.to_event_bytes()?;
    sink.emit(T::EVENT_TYPE, &data)
}

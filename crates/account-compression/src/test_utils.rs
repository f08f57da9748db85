//! Sinks shared by unit tests.

use alloc::vec::Vec;

use crate::{
    errors::AccountCompressionError,
    events::{EventSink, EventType},
};

/// Keeps every emitted event.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) events: Vec<(EventType, Vec<u8>)>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event_type: EventType, data: &[u8]) -> Result<(), AccountCompressionError> {
        self.events.push((event_type, data.to_vec()));
        Ok(())
    }
}

/// Rejects every event.
pub(crate) struct FailingSink;

impl EventSink for FailingSink {
    fn emit(&mut self, _event_type: EventType, _data: &[u8]) -> Result<(), AccountCompressionError> {
        Err(AccountCompressionError::EventSerializationFailed)
    }
}

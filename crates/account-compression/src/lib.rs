//! Account Compression
//!
//! Concurrent merkle trees stored in flat account buffers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 instructions (&mut [u8] handlers)            │
//! │  • initialize / prepare_batch / init_prepared_tree_with_root │
//! │  • append / replace_leaf / insert_or_append / verify_leaf    │
//! │  • transfer_authority / close                                │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                     │
//!          ▼                   ▼                     ▼
//! ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐
//! │      state      │  │     canopy      │  │     events      │
//! │  header, tree   │  │  cached upper   │  │  ChangeLogEvent │
//! │  core encoding  │  │  tree levels    │  │  and sinks      │
//! └─────────────────┘  └─────────────────┘  └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │             concurrent-merkle-tree (in-memory engine)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`state`]: Header, geometry table and tree core encoding
//! - [`canopy`]: Proof completion from cached upper levels
//! - [`events`]: Event encoding and sinks
//! - [`instructions`]: Operation handlers
//! - [`authority`]: Authority checks
//! - [`errors`]: Error codes

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod authority;
pub mod canopy;
pub mod errors;
pub mod events;
pub mod instructions;
pub mod state;

#[cfg(test)]
mod test_utils;

pub use concurrent_merkle_tree::{ConcurrentMerkleTreeError, EMPTY, Node};
pub use errors::AccountCompressionError;
pub use events::{ChangeLogEvent, EventSink, EventType, LogSink, NoopSink, PathNode};
pub use instructions::*;
pub use state::{
    ConcurrentMerkleTreeHeader, MAX_CANOPY_DEPTH, TreeConfig, VALID_DEPTH_SIZE_PAIRS,
    account_size, authority as tree_authority, buffer_size, current_root, merkle_tree_get_size,
    sequence_number,
};

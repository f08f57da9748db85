//! Tree account state.
//!
//! # Account Layout
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ ConcurrentMerkleTreeHeader   │  56 bytes
//! ├──────────────────────────────┤
//! │ Tree core                    │  tree_core_size(max_depth, max_buffer_size)
//! ├──────────────────────────────┤
//! │ Canopy                       │  canopy_size(canopy_depth), may be empty
//! └──────────────────────────────┘
//! ```
//!
//! The canopy depth is not stored: it is recovered from the bytes left after
//! the tree core.

pub mod config;
pub mod header;
pub mod merkle_tree;

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub use config::{
    MAX_CANOPY_DEPTH, TreeConfig, VALID_DEPTH_SIZE_PAIRS, account_size, canopy_size,
    change_log_size, is_valid_depth_size_pair, merkle_tree_get_size, tree_core_size,
};
pub use header::{CONCURRENT_MERKLE_TREE_HEADER_SIZE, ConcurrentMerkleTreeHeader};
pub use merkle_tree::{
    TreeAccountMut, TreeAccountRef, authority, buffer_size, current_root, load_tree,
    sequence_number, store_tree, tree_bytes_uninitialized,
};

/// Account discriminator stored in the first header byte.
#[derive(Clone, Copy, Debug, IntoPrimitive, TryFromPrimitive, PartialEq, Eq)]
#[repr(u8)]
pub enum AccountType {
    /// Zeroed account, never initialized or closed
    Uninitialized = 0,
    /// Concurrent merkle tree
    ConcurrentMerkleTree = 1,
}

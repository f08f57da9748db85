//! Tree geometry and the byte sizes derived from it.

use concurrent_merkle_tree::{ConcurrentMerkleTreeError, MAX_SUPPORTED_DEPTH};
use core::mem::size_of;
use pinocchio_log::log;

use super::header::CONCURRENT_MERKLE_TREE_HEADER_SIZE;
use crate::errors::AccountCompressionError;

/// Deepest canopy an account may carry.
pub const MAX_CANOPY_DEPTH: u32 = 17;

/// Supported `(max_depth, max_buffer_size)` pairs.
///
/// Fixing the table bounds the account sizes callers have to allocate.
pub const VALID_DEPTH_SIZE_PAIRS: [(u32, u32); 34] = [
    (3, 8),
    (5, 8),
    (6, 16),
    (7, 16),
    (8, 16),
    (9, 16),
    (10, 32),
    (11, 32),
    (12, 32),
    (13, 32),
    (14, 64),
    (14, 256),
    (14, 1024),
    (14, 2048),
    (15, 64),
    (16, 64),
    (17, 64),
    (18, 64),
    (19, 64),
    (20, 64),
    (20, 256),
    (20, 1024),
    (20, 2048),
    (24, 64),
    (24, 256),
    (24, 512),
    (24, 1024),
    (24, 2048),
    (26, 512),
    (26, 1024),
    (26, 2048),
    (30, 512),
    (30, 1024),
    (30, 2048),
];

const NODE_SIZE: usize = 32;

/// `sequence_number | active_index | buffer_size | rightmost_index | rightmost_leaf`
pub(crate) const TREE_CORE_FIXED_SIZE: usize =
    size_of::<u64>() + 3 * size_of::<u32>() + NODE_SIZE;

/// Bytes of one changelog entry: `root | path | index`.
pub const fn change_log_size(max_depth: u32) -> usize {
    NODE_SIZE + max_depth as usize * NODE_SIZE + size_of::<u32>()
}

/// Bytes of the tree core (counters, rightmost path and changelog).
pub const fn tree_core_size(max_depth: u32, max_buffer_size: u32) -> usize {
    TREE_CORE_FIXED_SIZE
        + max_depth as usize * NODE_SIZE
        + max_buffer_size as usize * change_log_size(max_depth)
}

/// Bytes of a canopy caching `canopy_depth` levels: `2^(canopy_depth + 1) - 2` nodes.
pub const fn canopy_size(canopy_depth: u32) -> usize {
    ((1usize << (canopy_depth + 1)) - 2) * NODE_SIZE
}

/// Bytes following the header: tree core plus canopy.
pub const fn merkle_tree_get_size(max_depth: u32, max_buffer_size: u32, canopy_depth: u32) -> usize {
    tree_core_size(max_depth, max_buffer_size) + canopy_size(canopy_depth)
}

/// Total account bytes for the geometry.
pub const fn account_size(max_depth: u32, max_buffer_size: u32, canopy_depth: u32) -> usize {
    CONCURRENT_MERKLE_TREE_HEADER_SIZE + merkle_tree_get_size(max_depth, max_buffer_size, canopy_depth)
}

/// Whether `(max_depth, max_buffer_size)` is in [`VALID_DEPTH_SIZE_PAIRS`].
pub fn is_valid_depth_size_pair(max_depth: u32, max_buffer_size: u32) -> bool {
    VALID_DEPTH_SIZE_PAIRS.contains(&(max_depth, max_buffer_size))
}

/// Geometry of one tree account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeConfig {
    /// Tree depth
    pub max_depth: u32,
    /// Changelog capacity
    pub max_buffer_size: u32,
    /// Upper levels cached in the canopy, `0` for none
    pub canopy_depth: u32,
}

impl TreeConfig {
    /// Geometry from its parts. Call [`validate`](Self::validate) before use.
    pub const fn new(max_depth: u32, max_buffer_size: u32, canopy_depth: u32) -> Self {
        Self {
            max_depth,
            max_buffer_size,
            canopy_depth,
        }
    }

    /// Check the geometry against the supported table and canopy limits.
    ///
    /// # Errors
    /// - [`ConcurrentMerkleTreeError::UnsupportedDepthSizePair`] if the pair is not in the table
    /// - [`AccountCompressionError::CanopyLengthMismatch`] if the canopy is deeper than
    ///   [`MAX_CANOPY_DEPTH`] or the tree
    pub fn validate(&self) -> Result<(), AccountCompressionError> {
        if !is_valid_depth_size_pair(self.max_depth, self.max_buffer_size)
            || self.max_depth as usize > MAX_SUPPORTED_DEPTH
        {
            log!(
                "unsupported depth/size pair: {} {}",
                self.max_depth,
                self.max_buffer_size
            );
            return Err(ConcurrentMerkleTreeError::UnsupportedDepthSizePair.into());
        }
        if self.canopy_depth > MAX_CANOPY_DEPTH || self.canopy_depth > self.max_depth {
            log!(
                "canopy depth {} too large for max depth {}",
                self.canopy_depth,
                self.max_depth
            );
            return Err(AccountCompressionError::CanopyLengthMismatch);
        }
        Ok(())
    }

    /// Bytes of the tree core.
    pub const fn tree_size(&self) -> usize {
        tree_core_size(self.max_depth, self.max_buffer_size)
    }

    /// Bytes of the canopy.
    pub const fn canopy_size(&self) -> usize {
        canopy_size(self.canopy_depth)
    }

    /// Total account bytes.
    pub const fn account_size(&self) -> usize {
        account_size(self.max_depth, self.max_buffer_size, self.canopy_depth)
    }
}

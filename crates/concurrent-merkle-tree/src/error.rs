//! Error types for the concurrent merkle tree engine.
//!
//! # Error Code Ranges
//!
//! | Range | Category | Description |
//! |-------|----------|-------------|
//! | 0-3 | Validation | Geometry, indices and proof shape supplied by the caller |
//! | 4-5 | Conflict | Stale proofs the changelog could not reconcile |
//! | 6-7 | Capacity | Full trees and non-empty trees |
//! | 8 | Hashing | Failures reported by the hasher |
//!
//! # Error Code Reference
//!
//! ## Validation Errors (0-3)
//! - 0: UnsupportedDepthSizePair
//! - 1: LeafIndexOutOfBounds
//! - 2: InvalidProofLength
//! - 3: InvalidProof
//!
//! ## Conflict Errors (4-5)
//! - 4: ConcurrentModification
//! - 5: LeafContentMismatch
//!
//! ## Capacity Errors (6-7)
//! - 6: TreeFull
//! - 7: TreeNotEmpty
//!
//! ## Hashing Errors (8)
//! - 8: HashFailed

use pinocchio::program_error::ProgramError;

/// Errors produced by [`ConcurrentMerkleTree`](crate::ConcurrentMerkleTree) operations.
///
/// Every error is returned before the tree is mutated, so a failed call leaves
/// the tree exactly as it was.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::IntoStaticStr)]
pub enum ConcurrentMerkleTreeError {
    // =========================================================================
    // Validation Errors (0-3)
    // =========================================================================
    /// Depth is outside `1..=30` or the buffer size is not a non-zero power of two
    UnsupportedDepthSizePair = 0,
    /// Leaf index is `>= 2^max_depth` or skips past the next append position
    LeafIndexOutOfBounds = 1,
    /// Proof does not contain exactly `max_depth` nodes
    InvalidProofLength = 2,
    /// Proof does not hash to the expected root
    InvalidProof = 3,

    // =========================================================================
    // Conflict Errors (4-5)
    // =========================================================================
    /// Stale proof could not be fast-forwarded to the current root
    ConcurrentModification = 4,
    /// The leaf at the index no longer holds the value the caller claimed
    LeafContentMismatch = 5,

    // =========================================================================
    // Capacity Errors (6-7)
    // =========================================================================
    /// All `2^max_depth` leaves have been appended
    TreeFull = 6,
    /// Root differs from the all-empty root
    TreeNotEmpty = 7,

    // =========================================================================
    // Hashing Errors (8)
    // =========================================================================
    /// The hasher rejected its input
    HashFailed = 8,
}

impl ConcurrentMerkleTreeError {
    /// Convert to error code
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    /// Create from error code
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::UnsupportedDepthSizePair),
            1 => Some(Self::LeafIndexOutOfBounds),
            2 => Some(Self::InvalidProofLength),
            3 => Some(Self::InvalidProof),
            4 => Some(Self::ConcurrentModification),
            5 => Some(Self::LeafContentMismatch),
            6 => Some(Self::TreeFull),
            7 => Some(Self::TreeNotEmpty),
            8 => Some(Self::HashFailed),
            _ => None,
        }
    }

    /// Static name of the variant, for logs.
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl From<ConcurrentMerkleTreeError> for ProgramError {
    fn from(e: ConcurrentMerkleTreeError) -> Self {
        ProgramError::Custom(e.to_u32())
    }
}

//! Error types for the account compression layer.
//!
//! # Error Code Ranges
//!
//! | Range | Category | Description |
//! |-------|----------|-------------|
//! | 0-8 | Tree | Errors raised by the concurrent merkle tree engine |
//! | 100-104 | Account | Account type, lifecycle and size checks |
//! | 105-108 | Canopy | Canopy shape and contents |
//! | 109-110 | Authority & Events | Signer checks and event encoding |
//!
//! # Error Code Reference
//!
//! ## Tree Errors (0-8)
//! Codes are [`ConcurrentMerkleTreeError::to_u32`] unchanged.
//!
//! ## Account Errors (100-104)
//! - 100: IncorrectAccountType
//! - 101: TreeAlreadyInitialized
//! - 102: TreeNotInitialized
//! - 103: BatchNotInitialized
//! - 104: AccountSizeMismatch
//!
//! ## Canopy Errors (105-108)
//! - 105: CanopyLengthMismatch
//! - 106: CanopyMismatch
//! - 107: CanopyRootMismatch
//! - 108: CanopyRightmostLeafMismatch
//!
//! ## Authority & Event Errors (109-110)
//! - 109: Unauthorized
//! - 110: EventSerializationFailed

use concurrent_merkle_tree::ConcurrentMerkleTreeError;
use pinocchio::program_error::ProgramError;

/// Errors produced by account compression operations.
///
/// Operations validate before writing, so an error means the account buffer
/// was not modified.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AccountCompressionError {
    /// Engine error, passed through with its own code
    Tree(ConcurrentMerkleTreeError),

    // =========================================================================
    // Account Errors (100-104)
    // =========================================================================
    /// Header account type is not the one the operation expects
    IncorrectAccountType,
    /// Header or tree bytes are already initialized
    TreeAlreadyInitialized,
    /// Tree bytes were never written (batch prepared but not initialized)
    TreeNotInitialized,
    /// Batch operation on a header that was not prepared for batch init
    BatchNotInitialized,
    /// Buffer is too small for the geometry in its header
    AccountSizeMismatch,

    // =========================================================================
    // Canopy Errors (105-108)
    // =========================================================================
    /// Canopy byte length is not a valid canopy size for the tree
    CanopyLengthMismatch,
    /// Proof plus canopy nodes do not cover the tree depth
    CanopyMismatch,
    /// Top of the canopy does not hash to the claimed root
    CanopyRootMismatch,
    /// Canopy holds nodes to the right of the rightmost leaf
    CanopyRightmostLeafMismatch,

    // =========================================================================
    // Authority & Event Errors (109-110)
    // =========================================================================
    /// Signer is not the tree authority
    Unauthorized,
    /// Event payload could not be encoded
    EventSerializationFailed,
}

impl AccountCompressionError {
    /// Numeric error code.
    pub const fn code(self) -> u32 {
        match self {
            Self::Tree(e) => e.to_u32(),
            Self::IncorrectAccountType => 100,
            Self::TreeAlreadyInitialized => 101,
            Self::TreeNotInitialized => 102,
            Self::BatchNotInitialized => 103,
            Self::AccountSizeMismatch => 104,
            Self::CanopyLengthMismatch => 105,
            Self::CanopyMismatch => 106,
            Self::CanopyRootMismatch => 107,
            Self::CanopyRightmostLeafMismatch => 108,
            Self::Unauthorized => 109,
            Self::EventSerializationFailed => 110,
        }
    }
}

impl From<ConcurrentMerkleTreeError> for AccountCompressionError {
    fn from(e: ConcurrentMerkleTreeError) -> Self {
        Self::Tree(e)
    }
}

impl From<AccountCompressionError> for ProgramError {
    fn from(e: AccountCompressionError) -> Self {
        ProgramError::Custom(e.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_errors_keep_engine_codes() {
        let err: AccountCompressionError = ConcurrentMerkleTreeError::TreeFull.into();
        assert_eq!(err, AccountCompressionError::Tree(ConcurrentMerkleTreeError::TreeFull));
        assert_eq!(
            ProgramError::from(err),
            ProgramError::Custom(ConcurrentMerkleTreeError::TreeFull.to_u32())
        );
    }

    #[test]
    fn test_account_error_codes_do_not_overlap_engine() {
        let account_errors = [
            AccountCompressionError::IncorrectAccountType,
            AccountCompressionError::TreeAlreadyInitialized,
            AccountCompressionError::TreeNotInitialized,
            AccountCompressionError::BatchNotInitialized,
            AccountCompressionError::AccountSizeMismatch,
            AccountCompressionError::CanopyLengthMismatch,
            AccountCompressionError::CanopyMismatch,
            AccountCompressionError::CanopyRootMismatch,
            AccountCompressionError::CanopyRightmostLeafMismatch,
            AccountCompressionError::Unauthorized,
            AccountCompressionError::EventSerializationFailed,
        ];
        for (offset, err) in account_errors.iter().enumerate() {
            assert_eq!(err.code(), 100 + offset as u32, "{:?} has the wrong code", err);
            assert!(ConcurrentMerkleTreeError::from_u32(err.code()).is_none());
        }
    }
}

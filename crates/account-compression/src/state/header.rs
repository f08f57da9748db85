//! Tree account header.

use bytemuck::{Pod, Zeroable};
use concurrent_merkle_tree::ConcurrentMerkleTreeError;
use core::mem::size_of;
use pinocchio::pubkey::Pubkey;
use pinocchio_log::log;

use super::{AccountType, config::TreeConfig};
use crate::{authority::HasAuthority, errors::AccountCompressionError};

/// Bytes of [`ConcurrentMerkleTreeHeader`] at the start of every tree account.
pub const CONCURRENT_MERKLE_TREE_HEADER_SIZE: usize = size_of::<ConcurrentMerkleTreeHeader>();

/// Account header preceding the tree core and canopy.
///
/// # Account Layout
/// ```text
/// [account_type: 1][is_batch_initialized: 1][padding: 2]
/// [max_depth: 4][max_buffer_size: 4][padding: 4]
/// [authority: 32][creation_slot: 8]
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ConcurrentMerkleTreeHeader {
    /// [`AccountType`] discriminator
    pub account_type: u8,
    /// Non-zero once `prepare_batch_merkle_tree` ran on this account
    pub is_batch_initialized: u8,
    /// Padding for alignment
    pub _padding: [u8; 2],
    /// Tree depth
    pub max_depth: u32,
    /// Changelog capacity
    pub max_buffer_size: u32,
    /// Padding for alignment
    pub _padding2: [u8; 4],
    /// Key allowed to modify the tree
    pub authority: Pubkey,
    /// Slot the tree was created in
    pub creation_slot: u64,
}

impl ConcurrentMerkleTreeHeader {
    /// Read the header from the start of `data`.
    ///
    /// # Errors
    /// Returns [`AccountCompressionError::AccountSizeMismatch`] if `data` is
    /// shorter than the header.
    pub fn read(data: &[u8]) -> Result<Self, AccountCompressionError> {
        let bytes = data
            .get(..CONCURRENT_MERKLE_TREE_HEADER_SIZE)
            .ok_or(AccountCompressionError::AccountSizeMismatch)?;
        bytemuck::try_pod_read_unaligned(bytes).map_err(|_| AccountCompressionError::AccountSizeMismatch)
    }

    /// Write the header to the start of `data`.
    ///
    /// # Errors
    /// Returns [`AccountCompressionError::AccountSizeMismatch`] if `data` is
    /// shorter than the header.
    pub fn write(&self, data: &mut [u8]) -> Result<(), AccountCompressionError> {
        let bytes = data
            .get_mut(..CONCURRENT_MERKLE_TREE_HEADER_SIZE)
            .ok_or(AccountCompressionError::AccountSizeMismatch)?;
        bytes.copy_from_slice(bytemuck::bytes_of(self));
        Ok(())
    }

    /// Header for a freshly created tree.
    pub fn initialize(&mut self, config: &TreeConfig, authority: &Pubkey, creation_slot: u64) {
        self.account_type = AccountType::ConcurrentMerkleTree.into();
        self.is_batch_initialized = 0;
        self.max_depth = config.max_depth;
        self.max_buffer_size = config.max_buffer_size;
        self.authority = *authority;
        self.creation_slot = creation_slot;
    }

    /// Header for a tree that will be initialized later with a root.
    pub fn initialize_batched(&mut self, config: &TreeConfig, authority: &Pubkey, creation_slot: u64) {
        self.initialize(config, authority, creation_slot);
        self.is_batch_initialized = 1;
    }

    /// Decoded account type.
    ///
    /// # Errors
    /// Returns [`AccountCompressionError::IncorrectAccountType`] for an unknown discriminator.
    pub fn account_type(&self) -> Result<AccountType, AccountCompressionError> {
        AccountType::try_from(self.account_type).map_err(|_| {
            log!("unknown account type {}", self.account_type);
            AccountCompressionError::IncorrectAccountType
        })
    }

    /// Check that the header belongs to a tree.
    ///
    /// # Errors
    /// Returns [`AccountCompressionError::IncorrectAccountType`] otherwise.
    pub fn assert_valid(&self) -> Result<(), AccountCompressionError> {
        if self.account_type()? != AccountType::ConcurrentMerkleTree {
            log!("account is not a concurrent merkle tree");
            return Err(AccountCompressionError::IncorrectAccountType);
        }
        Ok(())
    }

    /// Check that the header is still blank.
    ///
    /// # Errors
    /// Returns [`AccountCompressionError::TreeAlreadyInitialized`] otherwise.
    pub fn assert_uninitialized(&self) -> Result<(), AccountCompressionError> {
        if self.account_type()? != AccountType::Uninitialized {
            log!("tree account already initialized");
            return Err(AccountCompressionError::TreeAlreadyInitialized);
        }
        Ok(())
    }

    /// Check that the header was prepared for batch initialization.
    ///
    /// # Errors
    /// - [`AccountCompressionError::IncorrectAccountType`] if the header is not a tree
    /// - [`AccountCompressionError::BatchNotInitialized`] if the batch flag is unset
    pub fn assert_is_batch_initialized(&self) -> Result<(), AccountCompressionError> {
        self.assert_valid()?;
        if self.is_batch_initialized == 0 {
            log!("tree was not prepared for batch initialization");
            return Err(AccountCompressionError::BatchNotInitialized);
        }
        Ok(())
    }

    /// Check that `index` addresses a leaf of this tree.
    ///
    /// # Errors
    /// Returns [`ConcurrentMerkleTreeError::LeafIndexOutOfBounds`] if `index >= 2^max_depth`.
    pub fn assert_valid_leaf_index(&self, index: u32) -> Result<(), AccountCompressionError> {
        let capacity = 1u64.checked_shl(self.max_depth).unwrap_or(u64::MAX);
        if u64::from(index) >= capacity {
            log!(
                "leaf index {} out of bounds for depth {}",
                index,
                self.max_depth
            );
            return Err(ConcurrentMerkleTreeError::LeafIndexOutOfBounds.into());
        }
        Ok(())
    }
}

impl HasAuthority for ConcurrentMerkleTreeHeader {
    fn authority(&self) -> &Pubkey {
        &self.authority
    }

    fn authority_mut(&mut self) -> &mut Pubkey {
        &mut self.authority
    }
}

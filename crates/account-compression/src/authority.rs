//! Authority helpers.
//!
//! Every mutating tree operation is gated on the signer matching the
//! authority stored in the tree header. The checks live here so each
//! operation handler calls the same code.
//!
//! # Usage
//!
//! 1. Implement `HasAuthority` for the header type
//! 2. Call `assert_valid_authority` before mutating, or
//!    `transfer_authority_impl` to hand the tree to a new authority
//!
//! # Example
//!
//! ```ignore
//! impl HasAuthority for ConcurrentMerkleTreeHeader {
//!     fn authority(&self) -> &Pubkey { &self.authority }
//!     fn authority_mut(&mut self) -> &mut Pubkey { &mut self.authority }
//! }
//!
//! let mut header = ConcurrentMerkleTreeHeader::read(data)?;
//! transfer_authority_impl(&mut header, signer, new_authority)?;
//! header.write(data)?;
//! ```

use pinocchio::pubkey::Pubkey;
use pinocchio_log::log;

use crate::errors::AccountCompressionError;

/// Types that record which key may modify them.
pub trait HasAuthority {
    /// Get the current authority pubkey.
    fn authority(&self) -> &Pubkey;
    /// Get mutable reference to authority pubkey.
    fn authority_mut(&mut self) -> &mut Pubkey;
}

/// Check that `signer` is the current authority.
///
/// # Errors
/// Returns [`AccountCompressionError::Unauthorized`] otherwise.
#[inline]
pub fn assert_valid_authority<T: HasAuthority>(
    config: &T,
    signer: &Pubkey,
) -> Result<(), AccountCompressionError> {
    if config.authority() != signer {
        log!("signer is not the tree authority");
        return Err(AccountCompressionError::Unauthorized);
    }
    Ok(())
}

/// Replace the authority in one step.
///
/// # Arguments
/// * `config` - Header holding the authority
/// * `signer` - The pubkey of the signing authority
/// * `new_authority` - The pubkey that becomes the authority
///
/// # Returns
/// * `Ok(())` if the authority was replaced
/// * `Err(AccountCompressionError::Unauthorized)` if signer is not the current authority
#[inline]
pub fn transfer_authority_impl<T: HasAuthority>(
    config: &mut T,
    signer: &Pubkey,
    new_authority: &Pubkey,
) -> Result<(), AccountCompressionError> {
    assert_valid_authority(config, signer)?;

    *config.authority_mut() = *new_authority;

    Ok(())
}

//! Tree core encoding and the account views built on it.
//!
//! # Tree Core Layout (little endian)
//!
//! ```text
//! [sequence_number: 8][active_index: 4][buffer_size: 4][rightmost_index: 4]
//! [rightmost_leaf: 32][rightmost_proof: 32 * max_depth]
//! [change_log; max_buffer_size] = [root: 32][path: 32 * max_depth][index: 4]
//! ```

use alloc::vec::Vec;
use concurrent_merkle_tree::{ChangeLog, ConcurrentMerkleTree, ConcurrentMerkleTreeError, EMPTY, Node, Path};
use core::mem::size_of;
use light_hasher::Hasher;
use pinocchio::pubkey::Pubkey;
use pinocchio_log::log;

use super::{
    config::{TREE_CORE_FIXED_SIZE, change_log_size, is_valid_depth_size_pair, tree_core_size},
    header::{CONCURRENT_MERKLE_TREE_HEADER_SIZE, ConcurrentMerkleTreeHeader},
};
use crate::errors::AccountCompressionError;

// =============================================================================
// Account views
// =============================================================================

fn checked_tree_size(
    header: &ConcurrentMerkleTreeHeader,
    data_len: usize,
) -> Result<usize, AccountCompressionError> {
    header.assert_valid()?;
    if !is_valid_depth_size_pair(header.max_depth, header.max_buffer_size) {
        log!(
            "header holds unsupported depth/size pair: {} {}",
            header.max_depth,
            header.max_buffer_size
        );
        return Err(ConcurrentMerkleTreeError::UnsupportedDepthSizePair.into());
    }
    let tree_size = tree_core_size(header.max_depth, header.max_buffer_size);
    if data_len < CONCURRENT_MERKLE_TREE_HEADER_SIZE + tree_size {
        log!(
            "account has {} bytes, tree needs {}",
            data_len,
            CONCURRENT_MERKLE_TREE_HEADER_SIZE + tree_size
        );
        return Err(AccountCompressionError::AccountSizeMismatch);
    }
    Ok(tree_size)
}

/// Tree account split into header, tree core and canopy.
pub struct TreeAccountMut<'a> {
    /// Decoded header
    pub header: ConcurrentMerkleTreeHeader,
    /// Raw header bytes
    pub header_bytes: &'a mut [u8],
    /// Tree core bytes
    pub tree_bytes: &'a mut [u8],
    /// Everything after the tree core
    pub canopy_bytes: &'a mut [u8],
}

impl<'a> TreeAccountMut<'a> {
    /// Split an account whose header marks it as a tree.
    ///
    /// # Errors
    /// - [`AccountCompressionError::IncorrectAccountType`] if the header is not a tree
    /// - [`ConcurrentMerkleTreeError::UnsupportedDepthSizePair`] for a corrupt geometry
    /// - [`AccountCompressionError::AccountSizeMismatch`] if the buffer is too short
    pub fn split(data: &'a mut [u8]) -> Result<Self, AccountCompressionError> {
        let header = ConcurrentMerkleTreeHeader::read(data)?;
        let tree_size = checked_tree_size(&header, data.len())?;
        let (header_bytes, rest) = data.split_at_mut(CONCURRENT_MERKLE_TREE_HEADER_SIZE);
        let (tree_bytes, canopy_bytes) = rest.split_at_mut(tree_size);
        Ok(Self {
            header,
            header_bytes,
            tree_bytes,
            canopy_bytes,
        })
    }
}

/// Read-only [`TreeAccountMut`].
pub struct TreeAccountRef<'a> {
    /// Decoded header
    pub header: ConcurrentMerkleTreeHeader,
    /// Tree core bytes
    pub tree_bytes: &'a [u8],
    /// Everything after the tree core
    pub canopy_bytes: &'a [u8],
}

impl<'a> TreeAccountRef<'a> {
    /// Split an account whose header marks it as a tree.
    ///
    /// # Errors
    /// Same as [`TreeAccountMut::split`].
    pub fn split(data: &'a [u8]) -> Result<Self, AccountCompressionError> {
        let header = ConcurrentMerkleTreeHeader::read(data)?;
        let tree_size = checked_tree_size(&header, data.len())?;
        let (_, rest) = data.split_at(CONCURRENT_MERKLE_TREE_HEADER_SIZE);
        let (tree_bytes, canopy_bytes) = rest.split_at(tree_size);
        Ok(Self {
            header,
            tree_bytes,
            canopy_bytes,
        })
    }

    fn active_root(&self) -> Result<Node, AccountCompressionError> {
        let mut reader = Reader::new(self.tree_bytes);
        reader.skip(size_of::<u64>())?;
        let active_index = reader.u32()?;
        let depth = self.header.max_depth;
        let offset = TREE_CORE_FIXED_SIZE
            + depth as usize * NODE_SIZE
            + active_index as usize * change_log_size(depth);
        let mut reader = Reader::new(self.tree_bytes);
        reader.skip(offset)?;
        let root = reader.node()?;
        if root == EMPTY {
            return Err(AccountCompressionError::TreeNotInitialized);
        }
        Ok(root)
    }
}

// =============================================================================
// Encoding
// =============================================================================

const NODE_SIZE: usize = size_of::<Node>();

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], AccountCompressionError> {
        if self.bytes.len() < len {
            return Err(AccountCompressionError::AccountSizeMismatch);
        }
        let (head, tail) = self.bytes.split_at(len);
        self.bytes = tail;
        Ok(head)
    }

    fn skip(&mut self, len: usize) -> Result<(), AccountCompressionError> {
        self.take(len).map(|_| ())
    }

    fn u32(&mut self) -> Result<u32, AccountCompressionError> {
        let bytes = self.take(size_of::<u32>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn u64(&mut self) -> Result<u64, AccountCompressionError> {
        let bytes = self.take(size_of::<u64>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn node(&mut self) -> Result<Node, AccountCompressionError> {
        let mut node = EMPTY;
        node.copy_from_slice(self.take(NODE_SIZE)?);
        Ok(node)
    }

    fn nodes(&mut self, count: usize) -> Result<Vec<Node>, AccountCompressionError> {
        let bytes = self.take(count * NODE_SIZE)?;
        let nodes: &[Node] = bytemuck::try_cast_slice(bytes)
            .map_err(|_| AccountCompressionError::AccountSizeMismatch)?;
        Ok(nodes.to_vec())
    }
}

struct Writer<'a> {
    bytes: &'a mut [u8],
    offset: usize,
}

impl<'a> Writer<'a> {
    /// Callers check the buffer length up front, so writes past the end are dropped.
    fn put(&mut self, src: &[u8]) {
        let end = self.offset + src.len();
        if let Some(dst) = self.bytes.get_mut(self.offset..end) {
            dst.copy_from_slice(src);
        }
        self.offset = end;
    }
}

/// Whether the tree core was never written.
pub fn tree_bytes_uninitialized(tree_bytes: &[u8]) -> bool {
    tree_bytes.iter().all(|&b| b == 0)
}

/// Decode the tree core described by `header`.
///
/// # Errors
/// - [`AccountCompressionError::TreeNotInitialized`] if the core is all zeroes
/// - [`AccountCompressionError::AccountSizeMismatch`] if `tree_bytes` is too short
/// - engine errors if the decoded state is inconsistent with the geometry
pub fn load_tree<H: Hasher>(
    header: &ConcurrentMerkleTreeHeader,
    tree_bytes: &[u8],
) -> Result<ConcurrentMerkleTree<H>, AccountCompressionError> {
    if tree_bytes_uninitialized(tree_bytes) {
        log!("tree core has not been initialized");
        return Err(AccountCompressionError::TreeNotInitialized);
    }
    let depth = header.max_depth as usize;
    let mut reader = Reader::new(tree_bytes);

    let sequence_number = reader.u64()?;
    let active_index = reader.u32()?;
    let _buffer_size = reader.u32()?;
    let rightmost_index = reader.u32()?;
    let rightmost_leaf = reader.node()?;
    let rightmost_proof = reader.nodes(depth)?;

    let mut change_logs = Vec::with_capacity(header.max_buffer_size as usize);
    for _ in 0..header.max_buffer_size {
        let root = reader.node()?;
        let path = reader.nodes(depth)?;
        let index = reader.u32()?;
        change_logs.push(ChangeLog::new(root, path, index));
    }

    let tree = ConcurrentMerkleTree::from_parts(
        header.max_depth,
        header.max_buffer_size,
        sequence_number,
        active_index,
        change_logs,
        Path::new(rightmost_proof, rightmost_leaf, rightmost_index),
    )?;
    Ok(tree)
}

/// Encode `tree` into `tree_bytes`.
///
/// # Errors
/// Returns [`AccountCompressionError::AccountSizeMismatch`] before writing
/// anything if `tree_bytes` does not have the tree's exact core size.
pub fn store_tree<H: Hasher>(
    tree: &ConcurrentMerkleTree<H>,
    tree_bytes: &mut [u8],
) -> Result<(), AccountCompressionError> {
    if tree_bytes.len() != tree_core_size(tree.max_depth(), tree.max_buffer_size()) {
        return Err(AccountCompressionError::AccountSizeMismatch);
    }
    let mut writer = Writer {
        bytes: tree_bytes,
        offset: 0,
    };

    writer.put(&tree.sequence_number().to_le_bytes());
    writer.put(&tree.active_index().to_le_bytes());
    writer.put(&tree.buffer_size().to_le_bytes());
    let rightmost = tree.rightmost_proof();
    writer.put(&rightmost.index.to_le_bytes());
    writer.put(&rightmost.leaf);
    writer.put(bytemuck::cast_slice(rightmost.proof.as_slice()));

    for change_log in tree.change_logs() {
        writer.put(&change_log.root);
        writer.put(bytemuck::cast_slice(change_log.path.as_slice()));
        writer.put(&change_log.index.to_le_bytes());
    }
    Ok(())
}

// =============================================================================
// Read accessors
// =============================================================================

/// Current root of the tree in `data`.
///
/// # Errors
/// - [`TreeAccountRef::split`] errors
/// - [`AccountCompressionError::TreeNotInitialized`] for a batch-prepared tree without a root
pub fn current_root(data: &[u8]) -> Result<Node, AccountCompressionError> {
    TreeAccountRef::split(data)?.active_root()
}

/// Number of successful mutations of the tree in `data`.
///
/// # Errors
/// Same as [`current_root`].
pub fn sequence_number(data: &[u8]) -> Result<u64, AccountCompressionError> {
    let account = TreeAccountRef::split(data)?;
    account.active_root()?;
    Reader::new(account.tree_bytes).u64()
}

/// Changelog entries currently held by the tree in `data`.
///
/// # Errors
/// Same as [`current_root`].
pub fn buffer_size(data: &[u8]) -> Result<u32, AccountCompressionError> {
    let account = TreeAccountRef::split(data)?;
    account.active_root()?;
    let mut reader = Reader::new(account.tree_bytes);
    reader.skip(size_of::<u64>() + size_of::<u32>())?;
    reader.u32()
}

/// Authority of the tree in `data`.
///
/// # Errors
/// Same as [`TreeAccountRef::split`].
pub fn authority(data: &[u8]) -> Result<Pubkey, AccountCompressionError> {
    Ok(TreeAccountRef::split(data)?.header.authority)
}

//! The concurrent merkle tree.

use alloc::{vec, vec::Vec};
use core::{cmp::Ordering, marker::PhantomData};
use light_hasher::Hasher;
use pinocchio_log::log;

use crate::{
    changelog::ChangeLog,
    error::ConcurrentMerkleTreeError,
    hash::{compute_parent_node, hash_pair, recompute_root},
    node::{EMPTY, EmptyNodes, MAX_SUPPORTED_DEPTH, Node},
    path::Path,
};

/// Check depth and buffer size before any allocation.
///
/// Depth must be `1..=30` and the buffer a non-zero power of two (the ring
/// buffer is indexed with a mask).
///
/// # Errors
/// Returns [`ConcurrentMerkleTreeError::UnsupportedDepthSizePair`] otherwise.
pub fn check_bounds(max_depth: u32, max_buffer_size: u32) -> Result<(), ConcurrentMerkleTreeError> {
    if max_depth == 0 || max_depth as usize > MAX_SUPPORTED_DEPTH {
        log!("unsupported max_depth {}", max_depth);
        return Err(ConcurrentMerkleTreeError::UnsupportedDepthSizePair);
    }
    if !max_buffer_size.is_power_of_two() {
        log!("unsupported max_buffer_size {}", max_buffer_size);
        return Err(ConcurrentMerkleTreeError::UnsupportedDepthSizePair);
    }
    Ok(())
}

/// Fixed-depth Merkle tree that accepts proofs built against recent roots.
///
/// Every mutation records its leaf-to-root route in a ring buffer of
/// `max_buffer_size` [`ChangeLog`] entries. A proof built against any root
/// still in the buffer is fast-forwarded through the entries written after
/// it, so independent callers working from the same stale root all succeed
/// as long as they touch different leaves.
///
/// Appends need no proof: the tree keeps the proof of its rightmost leaf
/// ([`Path`]) and derives the next leaf's route from it.
///
/// # State
///
/// - `active_index == sequence_number % max_buffer_size`
/// - `change_logs[active_index]` holds the current root
/// - slot 0 holds the genesis entry until the buffer wraps
///
/// Operations validate everything first and only then write, so a failed
/// call leaves the tree untouched.
pub struct ConcurrentMerkleTree<H: Hasher> {
    max_depth: u32,
    max_buffer_size: u32,
    sequence_number: u64,
    active_index: u32,
    change_logs: Vec<ChangeLog>,
    rightmost_proof: Path,
    empty_nodes: EmptyNodes,
    _hasher: PhantomData<H>,
}

impl<H: Hasher> Clone for ConcurrentMerkleTree<H> {
    fn clone(&self) -> Self {
        Self {
            max_depth: self.max_depth,
            max_buffer_size: self.max_buffer_size,
            sequence_number: self.sequence_number,
            active_index: self.active_index,
            change_logs: self.change_logs.clone(),
            rightmost_proof: self.rightmost_proof.clone(),
            empty_nodes: self.empty_nodes.clone(),
            _hasher: PhantomData,
        }
    }
}

impl<H: Hasher> PartialEq for ConcurrentMerkleTree<H> {
    fn eq(&self, other: &Self) -> bool {
        self.max_depth == other.max_depth
            && self.max_buffer_size == other.max_buffer_size
            && self.sequence_number == other.sequence_number
            && self.active_index == other.active_index
            && self.change_logs == other.change_logs
            && self.rightmost_proof == other.rightmost_proof
    }
}

impl<H: Hasher> core::fmt::Debug for ConcurrentMerkleTree<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConcurrentMerkleTree")
            .field("max_depth", &self.max_depth)
            .field("max_buffer_size", &self.max_buffer_size)
            .field("sequence_number", &self.sequence_number)
            .field("active_index", &self.active_index)
            .field("rightmost_index", &self.rightmost_proof.index)
            .finish_non_exhaustive()
    }
}

impl<H: Hasher> ConcurrentMerkleTree<H> {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Create an empty tree.
    ///
    /// After initialization:
    /// - `root` = empty-subtree root at `max_depth`
    /// - `sequence_number = 0`, `active_index = 0`
    /// - the rightmost proof is the empty proof at index 0
    ///
    /// # Errors
    /// Returns [`ConcurrentMerkleTreeError::UnsupportedDepthSizePair`] for an
    /// invalid geometry.
    pub fn new(max_depth: u32, max_buffer_size: u32) -> Result<Self, ConcurrentMerkleTreeError> {
        check_bounds(max_depth, max_buffer_size)?;
        let depth = max_depth as usize;
        let empty_nodes = EmptyNodes::new::<H>(depth)?;

        let mut change_logs = vec![ChangeLog::zeroed(depth); max_buffer_size as usize];
        change_logs[0] = ChangeLog::new(empty_nodes.root(), empty_nodes.proof().to_vec(), 0);

        let rightmost_proof = Path::new(empty_nodes.proof().to_vec(), EMPTY, 0);

        Ok(Self {
            max_depth,
            max_buffer_size,
            sequence_number: 0,
            active_index: 0,
            change_logs,
            rightmost_proof,
            empty_nodes,
            _hasher: PhantomData,
        })
    }

    /// Create a tree whose leaves were built elsewhere, trusting `root`.
    ///
    /// Only the rightmost leaf is checked: `rightmost_leaf` at
    /// `rightmost_index` must hash to `root` through `proof`.
    ///
    /// # Errors
    /// - [`ConcurrentMerkleTreeError::UnsupportedDepthSizePair`] for an invalid geometry
    /// - the errors of [`with_root`](Self::with_root)
    pub fn initialize_with_root(
        max_depth: u32,
        max_buffer_size: u32,
        root: Node,
        rightmost_leaf: Node,
        proof: &[Node],
        rightmost_index: u32,
    ) -> Result<Self, ConcurrentMerkleTreeError> {
        Self::new(max_depth, max_buffer_size)?.with_root(root, rightmost_leaf, proof, rightmost_index)
    }

    /// Seed a freshly created tree with a root built elsewhere.
    ///
    /// Lets callers use [`empty_nodes`](Self::empty_nodes) to complete `proof`
    /// before the root is installed.
    ///
    /// # Errors
    /// - [`ConcurrentMerkleTreeError::TreeNotEmpty`] if the tree was already mutated
    /// - [`ConcurrentMerkleTreeError::LeafIndexOutOfBounds`] if `rightmost_index >= 2^max_depth`
    /// - [`ConcurrentMerkleTreeError::InvalidProofLength`] if `proof` is not `max_depth` long
    /// - [`ConcurrentMerkleTreeError::InvalidProof`] if the proof does not reach `root`
    pub fn with_root(
        mut self,
        root: Node,
        rightmost_leaf: Node,
        proof: &[Node],
        rightmost_index: u32,
    ) -> Result<Self, ConcurrentMerkleTreeError> {
        if self.sequence_number != 0 {
            log!("with_root: tree already has {} mutations", self.sequence_number);
            return Err(ConcurrentMerkleTreeError::TreeNotEmpty);
        }
        self.check_leaf_index(rightmost_index)?;
        self.check_proof_length(proof)?;

        let genesis = ChangeLog::from_proof::<H>(rightmost_leaf, proof, rightmost_index)?;
        if genesis.root != root {
            log!(
                "with_root: rightmost proof failed to verify at index {}",
                rightmost_index
            );
            return Err(ConcurrentMerkleTreeError::InvalidProof);
        }

        self.change_logs[0] = genesis;
        self.rightmost_proof = Path::new(proof.to_vec(), rightmost_leaf, rightmost_index + 1);
        Ok(self)
    }

    /// Rebuild a tree from persisted state.
    ///
    /// # Errors
    /// - [`ConcurrentMerkleTreeError::UnsupportedDepthSizePair`] for an invalid
    ///   geometry or if the buffers do not match it
    /// - [`ConcurrentMerkleTreeError::InvalidProofLength`] if a stored path has
    ///   the wrong length
    pub fn from_parts(
        max_depth: u32,
        max_buffer_size: u32,
        sequence_number: u64,
        active_index: u32,
        change_logs: Vec<ChangeLog>,
        rightmost_proof: Path,
    ) -> Result<Self, ConcurrentMerkleTreeError> {
        check_bounds(max_depth, max_buffer_size)?;
        if change_logs.len() != max_buffer_size as usize || active_index >= max_buffer_size {
            log!(
                "from_parts: {} changelog entries, active index {}",
                change_logs.len(),
                active_index
            );
            return Err(ConcurrentMerkleTreeError::UnsupportedDepthSizePair);
        }
        let depth = max_depth as usize;
        if rightmost_proof.proof.len() != depth
            || change_logs.iter().any(|entry| entry.path.len() != depth)
        {
            return Err(ConcurrentMerkleTreeError::InvalidProofLength);
        }

        Ok(Self {
            max_depth,
            max_buffer_size,
            sequence_number,
            active_index,
            change_logs,
            rightmost_proof,
            empty_nodes: EmptyNodes::new::<H>(depth)?,
            _hasher: PhantomData,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current root.
    pub fn root(&self) -> Node {
        self.change_log().root
    }

    /// Most recent changelog entry.
    pub fn change_log(&self) -> &ChangeLog {
        &self.change_logs[self.active_index as usize]
    }

    /// All changelog slots in storage order.
    pub fn change_logs(&self) -> &[ChangeLog] {
        &self.change_logs
    }

    /// Proof, value and next index of the rightmost leaf.
    pub fn rightmost_proof(&self) -> &Path {
        &self.rightmost_proof
    }

    /// Number of successful mutations.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Slot of the newest changelog entry.
    pub fn active_index(&self) -> u32 {
        self.active_index
    }

    /// Number of mutations currently held in the changelog,
    /// `min(sequence_number, max_buffer_size)`.
    pub fn buffer_size(&self) -> u32 {
        self.sequence_number.min(self.max_buffer_size as u64) as u32
    }

    /// Index the next append writes to.
    pub fn rightmost_index(&self) -> u32 {
        self.rightmost_proof.index
    }

    /// Value of the rightmost leaf.
    pub fn rightmost_leaf(&self) -> Node {
        self.rightmost_proof.leaf
    }

    /// Tree depth.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Changelog capacity.
    pub fn max_buffer_size(&self) -> u32 {
        self.max_buffer_size
    }

    /// Empty-subtree root at `level`.
    pub fn empty_node(&self, level: u32) -> Node {
        self.empty_nodes.get(level as usize)
    }

    /// Empty-subtree table built with the tree.
    pub fn empty_nodes(&self) -> &EmptyNodes {
        &self.empty_nodes
    }

    /// Number of leaves the tree can hold.
    pub fn capacity(&self) -> u32 {
        1u32 << self.max_depth
    }

    // =========================================================================
    // Read-only checks
    // =========================================================================

    /// Check that `leaf` at `index` is currently in the tree.
    ///
    /// A proof built against an older root still in the changelog is
    /// fast-forwarded first, exactly as [`set_leaf`](Self::set_leaf) would.
    /// Never mutates the tree.
    ///
    /// # Errors
    /// - [`ConcurrentMerkleTreeError::LeafIndexOutOfBounds`] if `index` is past the rightmost leaf
    /// - [`ConcurrentMerkleTreeError::InvalidProofLength`] if `proof` is not `max_depth` long
    /// - [`ConcurrentMerkleTreeError::LeafContentMismatch`] if the leaf was overwritten since `claimed_root`
    /// - [`ConcurrentMerkleTreeError::InvalidProof`] if the proof cannot be reconciled
    pub fn prove_leaf(
        &self,
        claimed_root: Node,
        leaf: Node,
        proof: &[Node],
        index: u32,
    ) -> Result<(), ConcurrentMerkleTreeError> {
        self.check_leaf_index(index)?;
        if index > self.rightmost_proof.index {
            log!(
                "prove_leaf: index {} past rightmost index {}",
                index,
                self.rightmost_proof.index
            );
            return Err(ConcurrentMerkleTreeError::LeafIndexOutOfBounds);
        }
        self.check_proof_length(proof)?;

        match self.fast_forward(claimed_root, leaf, proof, index) {
            Ok(_) => Ok(()),
            Err(ConcurrentMerkleTreeError::ConcurrentModification) => {
                Err(ConcurrentMerkleTreeError::InvalidProof)
            }
            Err(ConcurrentMerkleTreeError::LeafContentMismatch) if claimed_root == self.root() => {
                Err(ConcurrentMerkleTreeError::InvalidProof)
            }
            Err(e) => Err(e),
        }
    }

    /// Check `leaf` and `proof` against the current root without fast-forwarding.
    pub fn check_valid_proof(&self, leaf: Node, proof: &[Node], index: u32) -> bool {
        if self.check_leaf_index(index).is_err() || self.check_proof_length(proof).is_err() {
            return false;
        }
        matches!(recompute_root::<H>(leaf, proof, index), Ok(root) if root == self.root())
    }

    /// Check that every leaf is empty.
    ///
    /// # Errors
    /// Returns [`ConcurrentMerkleTreeError::TreeNotEmpty`] if the root is not
    /// the empty-subtree root.
    pub fn prove_tree_is_empty(&self) -> Result<(), ConcurrentMerkleTreeError> {
        if self.root() != self.empty_nodes.root() {
            log!("tree is not empty: sequence number {}", self.sequence_number);
            return Err(ConcurrentMerkleTreeError::TreeNotEmpty);
        }
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append `leaf` after the rightmost leaf. No proof is needed.
    ///
    /// Returns the new root.
    ///
    /// # Errors
    /// - [`ConcurrentMerkleTreeError::TreeFull`] once `2^max_depth` leaves exist
    /// - [`ConcurrentMerkleTreeError::HashFailed`] if the hasher fails
    pub fn append(&mut self, leaf: Node) -> Result<Node, ConcurrentMerkleTreeError> {
        let next_index = self.rightmost_proof.index;
        if next_index >= self.capacity() {
            log!("append: tree full at {} leaves", next_index);
            return Err(ConcurrentMerkleTreeError::TreeFull);
        }

        if next_index == 0 {
            let proof = self.rightmost_proof.proof.clone();
            return self.apply(leaf, &proof, 0);
        }

        let last_index = next_index - 1;
        let intersection = next_index.trailing_zeros() as usize;
        let mut rightmost = self.rightmost_proof.clone();
        let mut path = vec![EMPTY; self.max_depth as usize];
        let mut node = leaf;
        let mut intersection_node = rightmost.leaf;

        for (level, route_node) in path.iter_mut().enumerate() {
            *route_node = node;
            match level.cmp(&intersection) {
                Ordering::Less => {
                    // Below the intersection the new leaf only has empty siblings,
                    // while the old rightmost route keeps climbing toward it
                    let empty = self.empty_nodes.get(level);
                    intersection_node = compute_parent_node::<H>(
                        &intersection_node,
                        &rightmost.proof[level],
                        last_index,
                        level,
                    )?;
                    node = hash_pair::<H>(&node, &empty)?;
                    rightmost.proof[level] = empty;
                }
                Ordering::Equal => {
                    node = hash_pair::<H>(&intersection_node, &node)?;
                    rightmost.proof[level] = intersection_node;
                }
                Ordering::Greater => {
                    node = compute_parent_node::<H>(
                        &node,
                        &rightmost.proof[level],
                        last_index,
                        level,
                    )?;
                }
            }
        }

        rightmost.index = next_index + 1;
        rightmost.leaf = leaf;
        let root = node;

        self.push_change_log(ChangeLog::new(root, path, next_index));
        self.rightmost_proof = rightmost;
        Ok(root)
    }

    /// Replace `previous_leaf` at `index` with `new_leaf`.
    ///
    /// `proof` may have been built against any root still in the changelog
    /// (`claimed_root`); it is fast-forwarded to the current root before
    /// use. Writing at the next append position with `previous_leaf == EMPTY`
    /// is an append.
    ///
    /// Returns the new root.
    ///
    /// # Errors
    /// - [`ConcurrentMerkleTreeError::LeafIndexOutOfBounds`] if `index >= 2^max_depth` or past the next append position
    /// - [`ConcurrentMerkleTreeError::InvalidProofLength`] if `proof` is not `max_depth` long
    /// - [`ConcurrentMerkleTreeError::LeafContentMismatch`] if the leaf is not `previous_leaf`
    /// - [`ConcurrentMerkleTreeError::ConcurrentModification`] if the proof cannot be fast-forwarded
    pub fn set_leaf(
        &mut self,
        claimed_root: Node,
        previous_leaf: Node,
        new_leaf: Node,
        proof: &[Node],
        index: u32,
    ) -> Result<Node, ConcurrentMerkleTreeError> {
        self.check_leaf_index(index)?;
        if index > self.rightmost_proof.index {
            log!(
                "set_leaf: index {} past rightmost index {}",
                index,
                self.rightmost_proof.index
            );
            return Err(ConcurrentMerkleTreeError::LeafIndexOutOfBounds);
        }
        self.check_proof_length(proof)?;

        if index == self.rightmost_proof.index {
            if previous_leaf != EMPTY {
                log!("set_leaf: leaf {} has never been written", index);
                return Err(ConcurrentMerkleTreeError::LeafContentMismatch);
            }
            return self.append(new_leaf);
        }

        let proof = self.fast_forward(claimed_root, previous_leaf, proof, index)?;
        self.apply(new_leaf, &proof, index)
    }

    /// Write `leaf` at `index` if that leaf is empty, otherwise append it.
    ///
    /// Returns the new root.
    ///
    /// # Errors
    /// - [`ConcurrentMerkleTreeError::LeafIndexOutOfBounds`] if `index >= 2^max_depth`
    /// - [`ConcurrentMerkleTreeError::InvalidProofLength`] if `proof` is not `max_depth` long
    /// - [`ConcurrentMerkleTreeError::ConcurrentModification`] if the proof cannot be fast-forwarded
    /// - [`ConcurrentMerkleTreeError::TreeFull`] if the fallback append finds the tree full
    pub fn fill_empty_or_append(
        &mut self,
        claimed_root: Node,
        leaf: Node,
        proof: &[Node],
        index: u32,
    ) -> Result<Node, ConcurrentMerkleTreeError> {
        self.check_leaf_index(index)?;
        self.check_proof_length(proof)?;
        if index >= self.rightmost_proof.index {
            return self.append(leaf);
        }

        match self.fast_forward(claimed_root, EMPTY, proof, index) {
            Ok(proof) => self.apply(leaf, &proof, index),
            Err(ConcurrentMerkleTreeError::LeafContentMismatch) => self.append(leaf),
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_leaf_index(&self, index: u32) -> Result<(), ConcurrentMerkleTreeError> {
        if index >= self.capacity() {
            log!(
                "leaf index {} out of bounds for depth {}",
                index,
                self.max_depth
            );
            return Err(ConcurrentMerkleTreeError::LeafIndexOutOfBounds);
        }
        Ok(())
    }

    fn check_proof_length(&self, proof: &[Node]) -> Result<(), ConcurrentMerkleTreeError> {
        if proof.len() != self.max_depth as usize {
            log!(
                "proof has {} nodes, expected {}",
                proof.len(),
                self.max_depth
            );
            return Err(ConcurrentMerkleTreeError::InvalidProofLength);
        }
        Ok(())
    }

    /// Entries that describe a reachable state: the genesis entry plus every
    /// mutation, capped by the buffer.
    fn live_entries(&self) -> u32 {
        self.sequence_number
            .saturating_add(1)
            .min(self.max_buffer_size as u64) as u32
    }

    /// Slot of the newest entry whose root is `root`.
    fn find_root_in_changelog(&self, root: Node) -> Option<u32> {
        let mask = self.max_buffer_size - 1;
        (0..self.live_entries())
            .map(|i| self.active_index.wrapping_sub(i) & mask)
            .find(|&slot| self.change_logs[slot as usize].root == root)
    }

    /// Replay changelog entries over `proof` and `leaf`, oldest first.
    ///
    /// With `after = Some(slot)` only the entries newer than `slot` are
    /// replayed; with `None` the whole live buffer is.
    fn replay(&self, index: u32, proof: &mut [Node], leaf: &mut Node, after: Option<u32>) {
        let mask = self.max_buffer_size - 1;
        let (mut slot, count) = match after {
            Some(found) => (
                found.wrapping_add(1) & mask,
                self.active_index.wrapping_sub(found) & mask,
            ),
            None => {
                let live = self.live_entries();
                (
                    self.active_index.wrapping_add(1).wrapping_sub(live) & mask,
                    live,
                )
            }
        };

        for _ in 0..count {
            self.change_logs[slot as usize].update_proof_or_leaf(index, proof, leaf);
            slot = slot.wrapping_add(1) & mask;
        }
    }

    /// Bring `proof` of `leaf` at `index` from `claimed_root` to the current root.
    fn fast_forward(
        &self,
        claimed_root: Node,
        leaf: Node,
        proof: &[Node],
        index: u32,
    ) -> Result<Vec<Node>, ConcurrentMerkleTreeError> {
        let current_root = self.root();
        let mut proof = proof.to_vec();

        if claimed_root == current_root {
            if recompute_root::<H>(leaf, &proof, index)? != current_root {
                log!("leaf {} does not match the current root", index);
                return Err(ConcurrentMerkleTreeError::LeafContentMismatch);
            }
            return Ok(proof);
        }

        let after = self.find_root_in_changelog(claimed_root);
        if after.is_none() {
            log!("claimed root not in changelog, replaying full buffer");
        }

        let mut latest_leaf = leaf;
        self.replay(index, &mut proof, &mut latest_leaf, after);
        if latest_leaf != leaf {
            log!("leaf {} was modified since the claimed root", index);
            return Err(ConcurrentMerkleTreeError::LeafContentMismatch);
        }

        if recompute_root::<H>(leaf, &proof, index)? != current_root {
            log!(
                "proof for leaf {} could not be fast-forwarded, sequence number {}",
                index,
                self.sequence_number
            );
            return Err(ConcurrentMerkleTreeError::ConcurrentModification);
        }
        Ok(proof)
    }

    /// Write `leaf` at `index` with a proof valid for the current root.
    fn apply(
        &mut self,
        leaf: Node,
        proof: &[Node],
        index: u32,
    ) -> Result<Node, ConcurrentMerkleTreeError> {
        let change_log = ChangeLog::from_proof::<H>(leaf, proof, index)?;

        let mut rightmost = self.rightmost_proof.clone();
        if index < rightmost.index {
            change_log.update_proof_or_leaf(
                rightmost.index - 1,
                &mut rightmost.proof,
                &mut rightmost.leaf,
            );
        } else {
            rightmost.proof.copy_from_slice(proof);
            rightmost.index = index + 1;
            rightmost.leaf = leaf;
        }

        let root = change_log.root;
        self.push_change_log(change_log);
        self.rightmost_proof = rightmost;
        Ok(root)
    }

    fn push_change_log(&mut self, change_log: ChangeLog) {
        let mask = self.max_buffer_size - 1;
        self.active_index = (self.active_index + 1) & mask;
        self.change_logs[self.active_index as usize] = change_log;
        self.sequence_number = self.sequence_number.saturating_add(1);
    }
}

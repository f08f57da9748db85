//! Shared test helpers for the account compression tests.
//!
//! - [`ReferenceTree`]: fully materialized Merkle tree used as the source of truth
//! - [`TestTree`]: an account buffer plus the reference tree it should match
//! - [`RecordingSink`] / [`FailingSink`]: event sinks

#![allow(dead_code)]

use account_compression::{
    AccountCompressionError, Context, EventSink, EventType, InsertOrAppendData, ReplaceLeafData,
    TreeConfig, account_size, process_append, process_initialize, process_insert_or_append,
    process_replace_leaf,
};
use concurrent_merkle_tree::{EMPTY, Node};
use light_hasher::{Hasher, Sha256};
use sha2::Digest;

pub const TREE_ID: [u8; 32] = [0xAA; 32];
pub const AUTHORITY: [u8; 32] = [0x01; 32];

/// Deterministic leaf derived from `seed`.
pub fn make_leaf(seed: u64) -> Node {
    sha2::Sha256::digest(seed.to_le_bytes()).into()
}

// ============================================================================
// Sinks
// ============================================================================

/// Keeps every emitted event.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<(EventType, Vec<u8>)>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event_type: EventType, data: &[u8]) -> Result<(), AccountCompressionError> {
        self.events.push((event_type, data.to_vec()));
        Ok(())
    }
}

/// Rejects every event.
pub struct FailingSink;

impl EventSink for FailingSink {
    fn emit(&mut self, _event_type: EventType, _data: &[u8]) -> Result<(), AccountCompressionError> {
        Err(AccountCompressionError::EventSerializationFailed)
    }
}

// ============================================================================
// Reference tree
// ============================================================================

/// Fully materialized Merkle tree.
pub struct ReferenceTree {
    depth: usize,
    /// `levels[0]` are the leaves, `levels[depth]` holds the root
    levels: Vec<Vec<Node>>,
}

impl ReferenceTree {
    pub fn new(depth: usize) -> Self {
        let mut levels = vec![vec![EMPTY; 1 << depth]];
        for level in 0..depth {
            let above: Vec<Node> = levels[level]
                .chunks(2)
                .map(|pair| Sha256::hashv(&[&pair[0], &pair[1]]).unwrap())
                .collect();
            levels.push(above);
        }
        Self { depth, levels }
    }

    pub fn root(&self) -> Node {
        self.levels[self.depth][0]
    }

    pub fn leaf(&self, index: u32) -> Node {
        self.levels[0][index as usize]
    }

    pub fn set(&mut self, index: u32, leaf: Node) {
        let mut position = index as usize;
        self.levels[0][position] = leaf;
        for level in 0..self.depth {
            let left = self.levels[level][position & !1];
            let right = self.levels[level][position | 1];
            position >>= 1;
            self.levels[level + 1][position] = Sha256::hashv(&[&left, &right]).unwrap();
        }
    }

    /// Siblings of `index` from the leaf level up.
    pub fn proof(&self, index: u32) -> Vec<Node> {
        let mut position = index as usize;
        (0..self.depth)
            .map(|level| {
                let sibling = self.levels[level][position ^ 1];
                position >>= 1;
                sibling
            })
            .collect()
    }

    pub fn node(&self, level: usize, position: usize) -> Node {
        self.levels[level][position]
    }

    /// Node at heap index `index` (root = 1).
    pub fn heap_node(&self, index: u32) -> Node {
        let height = 31 - index.leading_zeros() as usize;
        let position = index as usize - (1 << height);
        self.levels[self.depth - height][position]
    }
}

// ============================================================================
// Account harness
// ============================================================================

/// An initialized tree account and the reference tree it should match.
pub struct TestTree {
    pub config: TreeConfig,
    pub data: Vec<u8>,
    pub reference: ReferenceTree,
    pub sink: RecordingSink,
    /// Next append index
    pub next: u32,
}

impl TestTree {
    pub fn new(depth: u32, buffer: u32, canopy: u32) -> Self {
        let config = TreeConfig::new(depth, buffer, canopy);
        let mut data = vec![0u8; account_size(depth, buffer, canopy)];
        let mut sink = RecordingSink::default();
        process_initialize::<Sha256>(Context::new(&mut data, &TREE_ID, &AUTHORITY, &mut sink), config, 1)
            .unwrap();
        Self {
            config,
            data,
            reference: ReferenceTree::new(depth as usize),
            sink,
            next: 0,
        }
    }

    pub fn ctx(&mut self) -> Context<'_> {
        Context::new(&mut self.data, &TREE_ID, &AUTHORITY, &mut self.sink)
    }

    /// Proof of `index` with the canopy levels cut off.
    pub fn truncated_proof(&self, index: u32) -> Vec<Node> {
        let mut proof = self.reference.proof(index);
        proof.truncate((self.config.max_depth - self.config.canopy_depth) as usize);
        proof
    }

    pub fn append(&mut self, leaf: Node) -> Result<(), AccountCompressionError> {
        process_append::<Sha256>(self.ctx(), leaf)?;
        self.reference.set(self.next, leaf);
        self.next += 1;
        Ok(())
    }

    /// Replace leaf `index` using `proof` built against `root`.
    pub fn replace(
        &mut self,
        root: Node,
        index: u32,
        new_leaf: Node,
        proof: &[Node],
    ) -> Result<(), AccountCompressionError> {
        let previous_leaf = self.reference.leaf(index);
        process_replace_leaf::<Sha256>(
            self.ctx(),
            ReplaceLeafData {
                root,
                previous_leaf,
                new_leaf,
                index,
                proof,
            },
        )?;
        self.reference.set(index, new_leaf);
        if index == self.next {
            self.next += 1;
        }
        Ok(())
    }

    /// Replace leaf `index` using a fresh truncated proof.
    pub fn replace_fresh(&mut self, index: u32, new_leaf: Node) -> Result<(), AccountCompressionError> {
        let root = self.reference.root();
        let proof = self.truncated_proof(index);
        self.replace(root, index, new_leaf, &proof)
    }

    /// Fill leaf `index` if empty, otherwise append. Returns the index written.
    pub fn insert_or_append(&mut self, index: u32, leaf: Node) -> Result<u32, AccountCompressionError> {
        let root = self.reference.root();
        let proof = self.truncated_proof(index);
        process_insert_or_append::<Sha256>(
            self.ctx(),
            InsertOrAppendData {
                root,
                leaf,
                index,
                proof: &proof,
            },
        )?;
        let written = if index < self.next && self.reference.leaf(index) == EMPTY {
            index
        } else {
            self.next
        };
        self.reference.set(written, leaf);
        if written == self.next {
            self.next += 1;
        }
        Ok(written)
    }
}

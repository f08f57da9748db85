//! Shared test helpers for the concurrent merkle tree tests.
//!
//! - [`ReferenceTree`]: a plain, fully materialized Merkle tree used as the
//!   source of truth for roots and proofs
//! - [`make_leaf`]: deterministic 32-byte leaves

#![allow(dead_code)]

use concurrent_merkle_tree::{EMPTY, Node};
use light_hasher::{Hasher, Sha256};
use sha2::Digest;

/// Deterministic leaf derived from `seed`.
pub fn make_leaf(seed: u64) -> Node {
    sha2::Sha256::digest(seed.to_le_bytes()).into()
}

/// Fully materialized Merkle tree. Every node of every level is stored, so
/// roots and proofs come straight from the stored levels.
pub struct ReferenceTree {
    depth: usize,
    /// `levels[0]` are the leaves, `levels[depth]` holds the root
    levels: Vec<Vec<Node>>,
}

impl ReferenceTree {
    /// Tree of `2^depth` empty leaves.
    pub fn new(depth: usize) -> Self {
        let mut levels = vec![vec![EMPTY; 1 << depth]];
        for level in 0..depth {
            let below = &levels[level];
            let above: Vec<Node> = below
                .chunks(2)
                .map(|pair| Sha256::hashv(&[&pair[0], &pair[1]]).unwrap())
                .collect();
            levels.push(above);
        }
        Self { depth, levels }
    }

    /// Tree with `leaves` at indices `0..leaves.len()`.
    pub fn with_leaves(depth: usize, leaves: &[Node]) -> Self {
        let mut tree = Self::new(depth);
        for (i, leaf) in leaves.iter().enumerate() {
            tree.set(i as u32, *leaf);
        }
        tree
    }

    pub fn root(&self) -> Node {
        self.levels[self.depth][0]
    }

    pub fn leaf(&self, index: u32) -> Node {
        self.levels[0][index as usize]
    }

    /// Write `leaf` at `index` and rehash its route.
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
        let mut proof = Vec::with_capacity(self.depth);
        for level in 0..self.depth {
            proof.push(self.levels[level][position ^ 1]);
            position >>= 1;
        }
        proof
    }

    /// Node at `level` and `position`.
    pub fn node(&self, level: usize, position: usize) -> Node {
        self.levels[level][position]
    }
}

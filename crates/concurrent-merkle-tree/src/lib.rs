//! Concurrent Merkle Tree
//!
//! A fixed-depth Merkle tree that keeps a ring buffer of its most recent
//! mutations so that proofs built against a slightly stale root can still be
//! applied.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    ConcurrentMerkleTree<H>                    │
//! │  • append (proof-free, via the rightmost path)                │
//! │  • set_leaf / fill_empty_or_append (proof fast-forwarding)    │
//! │  • prove_leaf / prove_tree_is_empty (read-only)               │
//! └──────────────────────────────────────────────────────────────┘
//!          │                         │                   │
//!          ▼                         ▼                   ▼
//! ┌──────────────────┐   ┌──────────────────────┐  ┌──────────────┐
//! │    ChangeLog     │   │        Path          │  │  EmptyNodes  │
//! │  route + root of │   │  proof of rightmost  │  │  empty root  │
//! │  one mutation    │   │  leaf                │  │  per level   │
//! └──────────────────┘   └──────────────────────┘  └──────────────┘
//! ```
//!
//! # Fast-forwarding
//!
//! A caller submits `(claimed_root, previous_leaf, proof)`. If `claimed_root`
//! is current the proof is checked directly. Otherwise every changelog entry
//! written after `claimed_root` is replayed, oldest first, and each one
//! refreshes the single proof node its route shares with the caller's leaf.
//! The patched proof must then hash to the current root.
//!
//! # Modules
//!
//! - [`node`]: Node type and empty-subtree table
//! - [`hash`]: Parent hashing, root recomputation and pure proof checks
//! - [`changelog`]: Recorded mutations and proof patching
//! - [`path`]: Rightmost path
//! - [`tree`]: The tree itself
//! - [`error`]: Error codes

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod changelog;
pub mod error;
pub mod hash;
pub mod node;
pub mod path;
pub mod tree;

pub use changelog::ChangeLog;
pub use error::ConcurrentMerkleTreeError;
pub use hash::{recompute_root, verify_leaf};
pub use node::{EMPTY, EmptyNodes, MAX_SUPPORTED_DEPTH, Node};
pub use path::Path;
pub use tree::{ConcurrentMerkleTree, check_bounds};

//! # veritrie
//!
//! The verifiable state-storage core of an Ethereum-family client: a
//! content-addressed trie mapping account and contract-storage keys to
//! values, summarized by a single deterministic root hash.
//!
//! ## Architecture
//!
//! Two interchangeable trie flavors live behind one polymorphic contract:
//!
//! 1. **Classic** - the hexary Merkle-Patricia Trie with branch,
//!    extension and leaf nodes (Yellow-Paper encoding).
//! 2. **Uni** - a binary, path-compressed trie with embedded children and
//!    out-of-band "long" values.
//!
//! ## Modules
//!
//! - `codec` - Keccak-256 and canonical big-endian integer conversion
//! - `encoding` - RLP encoding and decoding
//! - `store` - key-value backend and lazy data-loader contracts
//! - `trie` - node models and the put/get/remove/commit engines
//! - `state` - account records, key mapping, world state and Merkle proofs

pub mod codec;
pub mod encoding;
pub mod state;
pub mod store;
pub mod trie;

//! Keccak-256 hashing.

use tiny_keccak::{Hasher, Keccak};

/// Hash size (Keccak-256).
pub const HASH_SIZE: usize = 32;

/// A 256-bit content hash.
pub type Hash32 = [u8; HASH_SIZE];

/// Computes the Keccak-256 hash of data.
pub fn keccak256(data: &[u8]) -> Hash32 {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; HASH_SIZE];
    hasher.finalize(&mut hash);
    hash
}

//! Hashing and canonical byte conversions.

mod bytes;
mod hash;

pub use bytes::{u256_from_be, u256_to_be32, u256_to_min_be, u64_from_be, u64_to_min_be};
pub use hash::{keccak256, Hash32, HASH_SIZE};

//! Account records, key mapping, world state and Merkle proofs.

mod account;
mod keymap;
mod proof;
mod world;

pub use account::{AccountRecord, EMPTY_CODE_HASH};
pub use keymap::KeyMapper;
pub use proof::{verify_proof, AccountProof, ProofProvider, StorageProofEntry};
pub use world::WorldState;

/// A 20-byte account address.
pub type Address = [u8; 20];

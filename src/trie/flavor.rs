//! The two trie flavors and their empty-trie constants.

use crate::codec::Hash32;

/// Keccak-256 of the RLP empty string `[0x80]`, the root of an empty
/// classic trie.
pub const CLASSIC_EMPTY_ROOT: Hash32 = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8,
    0x6e, 0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63,
    0xb4, 0x21,
];

/// Keccak-256 of the null node encoding `[0x00]`, the root of an empty
/// uni trie.
pub const UNI_EMPTY_ROOT: Hash32 = [
    0xbc, 0x36, 0x78, 0x9e, 0x7a, 0x1e, 0x28, 0x14, 0x36, 0x46, 0x42, 0x29, 0x82, 0x8f, 0x81,
    0x7d, 0x66, 0x12, 0xf7, 0xb4, 0x77, 0xd6, 0x65, 0x91, 0xff, 0x96, 0xa9, 0xe0, 0x64, 0xbc,
    0xc9, 0x8a,
];

/// Which trie structure backs a state tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrieFlavor {
    /// Hexary Merkle-Patricia Trie with RLP node encoding.
    Classic,
    /// Binary path-compressed trie with flags-byte node encoding.
    Uni,
}

impl TrieFlavor {
    /// The encoding of the empty trie node for this flavor.
    pub fn empty_trie_node_encoding(&self) -> &'static [u8] {
        match self {
            TrieFlavor::Classic => &[0x80],
            TrieFlavor::Uni => &[0x00],
        }
    }

    /// The root hash of an empty trie of this flavor.
    pub fn empty_trie_node_hash(&self) -> Hash32 {
        match self {
            TrieFlavor::Classic => CLASSIC_EMPTY_ROOT,
            TrieFlavor::Uni => UNI_EMPTY_ROOT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::keccak256;

    #[test]
    fn test_empty_root_constants_match_hash_of_encoding() {
        for flavor in [TrieFlavor::Classic, TrieFlavor::Uni] {
            assert_eq!(
                keccak256(flavor.empty_trie_node_encoding()),
                flavor.empty_trie_node_hash(),
            );
        }
    }

    #[test]
    fn test_flavors_have_distinct_empty_roots() {
        assert_ne!(CLASSIC_EMPTY_ROOT, UNI_EMPTY_ROOT);
    }
}

//! Golden-vector compatibility tests: pinned constants and canonical
//! encodings that must never drift.

use hex_literal::hex;
use primitive_types::U256;

use veritrie::codec::keccak256;
use veritrie::encoding::{RlpDecoder, RlpEncoder};
use veritrie::state::{AccountRecord, EMPTY_CODE_HASH};
use veritrie::store::{InMemoryKeyValueStore, KeyValueDataSource};
use veritrie::trie::{StateTrie, TrieFlavor};

#[test]
fn test_classic_empty_root_constant() {
    let expected = hex!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");
    assert_eq!(TrieFlavor::Classic.empty_trie_node_hash(), expected);
    assert_eq!(keccak256(&[0x80]), expected);
    assert_eq!(TrieFlavor::Classic.empty_trie_node_encoding(), [0x80]);
}

#[test]
fn test_uni_empty_root_constant() {
    let expected = hex!("bc36789e7a1e281436464229828f817d6612f7b477d66591ff96a9e064bcc98a");
    assert_eq!(TrieFlavor::Uni.empty_trie_node_hash(), expected);
    assert_eq!(keccak256(&[0x00]), expected);
    assert_eq!(TrieFlavor::Uni.empty_trie_node_encoding(), [0x00]);
}

#[test]
fn test_empty_code_hash_constant() {
    let expected = hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");
    assert_eq!(EMPTY_CODE_HASH, expected);
    assert_eq!(keccak256(&[]), expected);
}

#[test]
fn test_rlp_golden_vectors() {
    // Canonical examples from the RLP definition.
    let mut enc = RlpEncoder::new();
    enc.encode_bytes(b"dog");
    assert_eq!(enc.as_bytes(), hex!("83646f67"));

    let mut enc = RlpEncoder::new();
    enc.encode_list(|e| {
        e.encode_bytes(b"cat");
        e.encode_bytes(b"dog");
    });
    assert_eq!(enc.as_bytes(), hex!("c88363617483646f67"));

    let mut enc = RlpEncoder::new();
    enc.encode_empty();
    assert_eq!(enc.as_bytes(), hex!("80"));

    let mut enc = RlpEncoder::new();
    enc.encode_list(|_| {});
    assert_eq!(enc.as_bytes(), hex!("c0"));

    let mut enc = RlpEncoder::new();
    enc.encode_u64(0);
    assert_eq!(enc.as_bytes(), hex!("80"));

    let mut enc = RlpEncoder::new();
    enc.encode_u64(15);
    assert_eq!(enc.as_bytes(), hex!("0f"));

    let mut enc = RlpEncoder::new();
    enc.encode_u64(1024);
    assert_eq!(enc.as_bytes(), hex!("820400"));
}

#[test]
fn test_hex_prefix_golden_vectors() {
    // Yellow-Paper hex-prefix examples, wrapped in their RLP string
    // headers.
    let cases: &[(&[u8], bool, &[u8])] = &[
        (&[1, 2, 3, 4, 5], false, &hex!("83112345")),
        (&[0, 1, 2, 3, 4, 5], false, &hex!("8400012345")),
        (&[0xf, 1, 0xc, 0xb, 8], true, &hex!("833f1cb8")),
        (&[0, 0xf, 1, 0xc, 0xb, 8], true, &hex!("84200f1cb8")),
    ];
    for &(nibbles, is_leaf, expected) in cases {
        let mut enc = RlpEncoder::new();
        enc.encode_nibbles(nibbles, is_leaf);
        assert_eq!(enc.as_bytes(), expected, "nibbles {nibbles:?}");
    }
}

#[test]
fn test_account_record_encoding_shape() {
    let record = AccountRecord {
        nonce: 5,
        balance: U256::from(0x0102u32),
        storage_root: [0xaa; 32],
        code_hash: [0xbb; 32],
        code_version: 0,
    };
    let bytes = record.encode();

    let mut dec = RlpDecoder::new(&bytes);
    let mut list = dec.enter_list().unwrap();
    assert_eq!(list.next_u64().unwrap(), 5);
    assert_eq!(list.next_u256().unwrap(), U256::from(0x0102u32));
    assert_eq!(list.next_hash32().unwrap(), [0xaa; 32]);
    assert_eq!(list.next_hash32().unwrap(), [0xbb; 32]);
    assert_eq!(list.next_u64().unwrap(), 0);
    assert!(list.finish().is_ok());
}

#[test]
fn test_root_is_content_address_of_root_node() {
    // The committed root node must be loadable by the root hash and
    // hash back to it.
    for flavor in [TrieFlavor::Classic, TrieFlavor::Uni] {
        let store = InMemoryKeyValueStore::new();
        let mut trie = flavor.build(&store);
        trie.put(b"dog", b"puppy".to_vec()).unwrap();
        trie.put(b"horse", b"stallion".to_vec()).unwrap();

        let root = trie
            .commit(
                &mut |hash, bytes| {
                    store.put(hash, bytes).unwrap();
                },
                &mut |hash, bytes| {
                    store.put(hash, bytes).unwrap();
                },
            )
            .unwrap();

        let root_bytes = store.get(&root).unwrap().unwrap();
        assert_eq!(keccak256(&root_bytes), root);
    }
}

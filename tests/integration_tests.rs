//! Integration tests for veritrie.

use primitive_types::U256;

use veritrie::codec::keccak256;
use veritrie::state::{
    verify_proof, AccountRecord, Address, KeyMapper, ProofProvider, WorldState,
};
use veritrie::store::{InMemoryKeyValueStore, KeyValueDataSource};
use veritrie::trie::{StateTrie, TrieFlavor};

const FLAVORS: [TrieFlavor; 2] = [TrieFlavor::Classic, TrieFlavor::Uni];

fn persist_all(store: &InMemoryKeyValueStore) -> impl FnMut(&[u8; 32], &[u8]) + '_ {
    move |hash, bytes| {
        store.put(hash, bytes).unwrap();
    }
}

#[test]
fn test_full_workflow() {
    for flavor in FLAVORS {
        let store = InMemoryKeyValueStore::new();
        let mut world = WorldState::new(flavor, &store);

        let alice: Address = [0xa1; 20];
        let bob: Address = [0xb0; 20];

        world
            .set_account(
                &alice,
                &AccountRecord {
                    nonce: 1,
                    balance: U256::from(1000),
                    ..AccountRecord::empty(flavor)
                },
            )
            .unwrap();
        world
            .set_account(
                &bob,
                &AccountRecord {
                    nonce: 0,
                    balance: U256::from(2000),
                    ..AccountRecord::empty(flavor)
                },
            )
            .unwrap();
        world.set_storage(&alice, U256::from(1), U256::from(42)).unwrap();

        let root = world
            .commit(&mut persist_all(&store), &mut persist_all(&store))
            .unwrap();

        // Reopen at the committed root and read everything back.
        let reopened = WorldState::at_root(flavor, &store, root);
        let alice_record = reopened.get_account(&alice).unwrap().unwrap();
        assert_eq!(alice_record.balance, U256::from(1000));
        assert_ne!(alice_record.storage_root, flavor.empty_trie_node_hash());
        assert_eq!(
            reopened.get_account(&bob).unwrap().unwrap().balance,
            U256::from(2000)
        );
        assert_eq!(
            reopened.get_storage(&alice, U256::from(1)).unwrap(),
            U256::from(42)
        );
        assert_eq!(
            reopened.get_storage(&bob, U256::from(1)).unwrap(),
            U256::zero()
        );
    }
}

#[test]
fn test_commit_reload_round_trip_plain_trie() {
    for flavor in FLAVORS {
        let store = InMemoryKeyValueStore::new();
        let mut trie = flavor.build(&store);

        let pairs: Vec<(Vec<u8>, Vec<u8>)> = (0u8..50)
            .map(|i| (vec![i, i.wrapping_mul(3)], vec![i; (i as usize % 40) + 1]))
            .collect();
        for (key, value) in &pairs {
            trie.put(key, value.clone()).unwrap();
        }
        let root = trie
            .commit(&mut persist_all(&store), &mut persist_all(&store))
            .unwrap();

        let reloaded = flavor.build_at(&store, root);
        for (key, value) in &pairs {
            assert_eq!(reloaded.get(key).unwrap(), Some(value.clone()));
        }
        assert_eq!(reloaded.root_hash(), root);
    }
}

#[test]
fn test_worked_example_scenario() {
    // One account with three populated slots; proofs requested for a
    // populated, another populated, and an absent slot.
    let address: Address = [
        0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0x78,
        0x90, 0x12, 0x34, 0x56, 0x78, 0x90,
    ];

    for flavor in FLAVORS {
        let store = InMemoryKeyValueStore::new();
        let mut world = WorldState::new(flavor, &store);

        world
            .set_account(
                &address,
                &AccountRecord {
                    nonce: 1,
                    balance: U256::from(2),
                    code_hash: keccak256(&[0x11, 0x22]),
                    ..AccountRecord::empty(flavor)
                },
            )
            .unwrap();
        for (slot, value) in [(1u64, 2u64), (2, 4), (3, 6)] {
            world
                .set_storage(&address, U256::from(slot), U256::from(value))
                .unwrap();
        }
        let root = world
            .commit(&mut persist_all(&store), &mut persist_all(&store))
            .unwrap();

        let provider = ProofProvider::new(flavor, &store);
        let slots = [U256::from(1), U256::from(3), U256::from(6)];
        let proof = provider.account_proof(root, &address, &slots).unwrap().unwrap();

        assert_eq!(proof.account.nonce, 1);
        assert_eq!(proof.account.balance, U256::from(2));
        assert_eq!(proof.account.code_hash, keccak256(&[0x11, 0x22]));
        assert!(verify_proof(flavor, &root, &proof.account_proof));

        let expected = [U256::from(2), U256::from(6), U256::zero()];
        for (entry, expected_value) in proof.storage_proofs.iter().zip(expected) {
            assert_eq!(entry.value, expected_value);
            assert!(!entry.proof.is_empty());
            assert!(verify_proof(flavor, &root, &entry.proof));
        }
    }
}

#[test]
fn test_equal_content_equal_root_across_histories() {
    for flavor in FLAVORS {
        let store_a = InMemoryKeyValueStore::new();
        let store_b = InMemoryKeyValueStore::new();
        let mut direct = WorldState::new(flavor, &store_a);
        let mut detoured = WorldState::new(flavor, &store_b);

        let addr: Address = [0x55; 20];
        let record = AccountRecord {
            nonce: 9,
            balance: U256::from(77),
            ..AccountRecord::empty(flavor)
        };

        direct.set_account(&addr, &record).unwrap();
        direct.set_storage(&addr, U256::from(1), U256::from(5)).unwrap();

        // Same final content through a different history.
        detoured.set_storage(&addr, U256::from(1), U256::from(999)).unwrap();
        detoured.set_storage(&addr, U256::from(2), U256::from(3)).unwrap();
        detoured.set_account(&addr, &record).unwrap();
        detoured.set_storage(&addr, U256::from(2), U256::zero()).unwrap();
        detoured.set_storage(&addr, U256::from(1), U256::from(5)).unwrap();

        assert_eq!(
            direct.root_hash().unwrap(),
            detoured.root_hash().unwrap()
        );
    }
}

#[test]
fn test_flavors_produce_different_roots() {
    let mut roots = Vec::new();
    for flavor in FLAVORS {
        let store = InMemoryKeyValueStore::new();
        let mut world = WorldState::new(flavor, &store);
        world
            .set_account(&[0x01; 20], &AccountRecord::empty(flavor))
            .unwrap();
        roots.push(world.root_hash().unwrap());
    }
    assert_ne!(roots[0], roots[1]);
}

#[test]
fn test_proof_survives_store_round_trip() {
    // A verifier holding only the root and the proof nodes can check
    // inclusion with no access to the store.
    for flavor in FLAVORS {
        let store = InMemoryKeyValueStore::new();
        let mut trie = flavor.build(&store);
        trie.put(&KeyMapper::account_key(&[0x42; 20]), b"payload".to_vec())
            .unwrap();
        trie.put(&KeyMapper::account_key(&[0x43; 20]), b"other".to_vec())
            .unwrap();
        let root = trie
            .commit(&mut persist_all(&store), &mut persist_all(&store))
            .unwrap();

        let reloaded = flavor.build_at(&store, root);
        let (value, proof) = reloaded
            .get_with_path(&KeyMapper::account_key(&[0x42; 20]))
            .unwrap();
        assert_eq!(value, Some(b"payload".to_vec()));
        assert!(verify_proof(flavor, &root, &proof));
    }
}

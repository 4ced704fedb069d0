//! Property tests: round trips and determinism across random inputs.

use proptest::prelude::*;

use veil_store::codec::{decode, encode};
use veil_store::layout::all_identifiers;
use veil_store::layout::IdLayout;
use veil_store::mapping::{candidate_ids, preferred_role, select_for_threshold};
use veil_store::{CryptoStore, Document, KdfParams, Partition, StoreConfig, StoreError};

fn document() -> impl Strategy<Value = Document> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 0..200).prop_map(Document::Binary),
        ".{0,120}".prop_map(Document::Text),
        (any::<i64>(), "[a-z]{0,16}").prop_map(|(n, s)| {
            Document::Json(serde_json::json!({ "n": n, "s": s, "list": [n, s] }))
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn codec_round_trips(doc in document()) {
        let chunks = encode(&doc).unwrap();
        prop_assert_eq!(decode(&chunks).unwrap(), doc);
    }

    #[test]
    fn store_round_trips(
        doc_a in document(),
        doc_b in document(),
        key_a in proptest::collection::vec(any::<u8>(), 1..24),
        password_a in proptest::collection::vec(any::<u8>(), 0..24),
        password_b in proptest::collection::vec(any::<u8>(), 0..24),
        threshold in 2u32..6,
    ) {
        let mut key_b = key_a.clone();
        key_b.push(0xFF);

        let engine = CryptoStore::new(StoreConfig {
            threshold,
            id_space_size: 120,
            kdf: KdfParams::insecure_fast(),
            ..StoreConfig::default()
        })
        .unwrap();
        let store = engine
            .create(&[
                Partition::new(key_a.clone(), password_a.clone(), doc_a.clone()),
                Partition::new(key_b.clone(), password_b.clone(), doc_b.clone()),
            ])
            .unwrap();

        prop_assert_eq!(engine.decrypt(&store, &key_a, &password_a).unwrap(), doc_a);
        prop_assert_eq!(engine.decrypt(&store, &key_b, &password_b).unwrap(), doc_b);
    }

    #[test]
    fn stage1_is_deterministic(key in proptest::collection::vec(any::<u8>(), 0..32), n in 1u32..2000) {
        let a = candidate_ids(&key, all_identifiers(n), 0.5).unwrap();
        let b = candidate_ids(&key, all_identifiers(n), 0.5).unwrap();
        prop_assert_eq!(a.len(), (n / 2) as usize);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn stage2_is_deterministic(password in proptest::collection::vec(any::<u8>(), 0..32), t in 1u32..10) {
        let candidates: Vec<u32> = (1..=40).collect();
        let salt = [1u8; 32];
        let kdf = KdfParams::insecure_fast();
        let a = select_for_threshold(&password, &candidates, &salt, t, &kdf).unwrap();
        let b = select_for_threshold(&password, &candidates, &salt, t, &kdf).unwrap();
        prop_assert_eq!(a.len(), t as usize);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn password_without_key_selects_other_ids(
        key in proptest::collection::vec(any::<u8>(), 1..24),
        other in proptest::collection::vec(any::<u8>(), 1..24),
        password in proptest::collection::vec(any::<u8>(), 0..24),
        ratio in prop_oneof![Just(0.5), Just(1.0)],
    ) {
        prop_assume!(key != other);
        let layout = IdLayout::new(1000, &[0.35, 0.35]).unwrap();
        let pool = layout.pool(0).unwrap();
        let salt = [3u8; 32];
        let kdf = KdfParams::insecure_fast();

        let owned = candidate_ids(&key, pool.clone(), ratio).unwrap();
        let guessed = candidate_ids(&other, pool, ratio).unwrap();
        let mut a = select_for_threshold(&password, &owned, &salt, 3, &kdf).unwrap();
        let mut b = select_for_threshold(&password, &guessed, &salt, 3, &kdf).unwrap();
        a.sort_unstable();
        b.sort_unstable();
        prop_assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_with_right_password_never_decrypts(
        doc in document(),
        suffix in 0u32..10_000,
    ) {
        // An empty document has no chunks, so every key "opens" it.
        prop_assume!(!doc.is_empty_binary());
        let engine = CryptoStore::new(StoreConfig {
            threshold: 3,
            id_space_size: 300,
            kdf: KdfParams::insecure_fast(),
            ..StoreConfig::default()
        })
        .unwrap();
        let store = engine
            .create(&[Partition::new("owner", "pw", doc.clone())])
            .unwrap();
        let roles = store.metadata.layout().unwrap().role_count();
        let owner_role = preferred_role(b"owner", roles);
        let intruder = (suffix..)
            .map(|i| format!("intruder-{i}"))
            .find(|k| preferred_role(k.as_bytes(), roles) == owner_role)
            .unwrap();

        match engine.decrypt(&store, intruder.as_bytes(), b"pw") {
            Ok(found) => prop_assert_ne!(found, doc),
            Err(e) => prop_assert!(matches!(e, StoreError::MalformedDocument)),
        }
    }
}

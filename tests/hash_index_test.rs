//! Integration tests for the extendible hash index.

use std::collections::HashMap;

use gracedb::common::{IndexConfig, PagerConfig};
use gracedb::index::hash::{hash_key, meta_path};
use gracedb::{Entry, Error, HashEntry, HashIndex};
use proptest::prelude::*;
use tempfile::tempdir;

fn open(dir: &tempfile::TempDir, config: IndexConfig) -> HashIndex {
    HashIndex::open(dir.path().join("index.db"), config).unwrap()
}

/// Keys {1, 5, 9, 13} with room for two entries per bucket: the third insert
/// doubles the directory.
#[test]
fn test_third_insert_doubles_directory() {
    let dir = tempdir().unwrap();
    let mut index = open(&dir, IndexConfig::with_bucket_capacity(2));

    // 1 and 5 share a low bit; 9 and 13 have the other one.
    assert_eq!(hash_key(1) & 1, hash_key(5) & 1);
    assert_ne!(hash_key(1) & 1, hash_key(9) & 1);
    assert_eq!(hash_key(9) & 1, hash_key(13) & 1);

    index.insert(1, 1).unwrap();
    index.insert(5, 5).unwrap();
    assert_eq!(index.table().global_depth(), 0);
    assert_eq!(index.table().buckets().len(), 1);

    index.insert(9, 9).unwrap();
    assert_eq!(index.table().global_depth(), 1);
    assert_eq!(index.table().buckets().len(), 2);

    index.insert(13, 13).unwrap();
    assert_eq!(index.table().global_depth(), 1);
    index.table().validate().unwrap();

    for k in [1, 5, 9, 13] {
        assert_eq!(index.find(k).unwrap(), Some(HashEntry::new(k, k)));
    }
    assert_eq!(index.find(2).unwrap(), None);
    index.close().unwrap();
}

#[test]
fn test_reopen_preserves_directory() {
    let dir = tempdir().unwrap();
    let config = IndexConfig::with_bucket_capacity(4);

    let (depth, buckets) = {
        let mut index = open(&dir, config);
        for k in 0..500 {
            index.insert(k, k + 1).unwrap();
        }
        let state = (
            index.table().global_depth(),
            index.table().buckets().to_vec(),
        );
        index.close().unwrap();
        state
    };

    let index = open(&dir, config);
    assert_eq!(index.table().global_depth(), depth);
    assert_eq!(index.table().buckets(), &buckets[..]);
    for k in 0..500 {
        assert_eq!(index.find(k).unwrap().map(|e| e.value()), Some(k + 1));
    }
    index.close().unwrap();
}

#[test]
fn test_corrupt_sidecar_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");
    {
        let mut index = HashIndex::open(&path, IndexConfig::default()).unwrap();
        index.insert(1, 2).unwrap();
        index.close().unwrap();
    }

    let mut bytes = std::fs::read(meta_path(&path)).unwrap();
    bytes[5] ^= 0xFF;
    std::fs::write(meta_path(&path), bytes).unwrap();

    assert!(matches!(
        HashIndex::open(&path, IndexConfig::default()),
        Err(Error::CorruptedMetadata(_))
    ));
}

/// Many copies of one key overflow a bucket without splitting it forever.
#[test]
fn test_duplicates_overflow_into_chain() {
    let dir = tempdir().unwrap();
    let config = IndexConfig {
        pager: PagerConfig::new(256, 8),
        bucket_capacity: Some(4),
        ..IndexConfig::default()
    };
    let mut index = open(&dir, config);

    for v in 0..100 {
        index.insert(42, v).unwrap();
    }
    index.insert(7, 7).unwrap();

    let all = index.table().find_all(42).unwrap();
    assert_eq!(all.len(), 100);
    assert_eq!(
        all.iter().map(|e| e.value()).collect::<Vec<_>>(),
        (0..100).collect::<Vec<_>>()
    );
    assert_eq!(index.find(7).unwrap(), Some(HashEntry::new(7, 7)));
    index.table().validate().unwrap();
    assert_eq!(index.table().pager().pinned_count(), 0);
    index.close().unwrap();
}

#[test]
fn test_select_returns_everything_once() {
    let dir = tempdir().unwrap();
    let mut index = open(&dir, IndexConfig::with_bucket_capacity(3));
    for k in -50..50 {
        index.insert(k, k * k).unwrap();
    }
    let mut all = index.select().unwrap();
    all.sort();
    let expected: Vec<_> = (-50..50).map(|k| HashEntry::new(k, k * k)).collect();
    assert_eq!(all, expected);
    index.close().unwrap();
}

#[test]
fn test_small_pool_survives_eviction() {
    let dir = tempdir().unwrap();
    let config = IndexConfig {
        pager: PagerConfig::new(128, 4),
        bucket_capacity: Some(2),
        ..IndexConfig::default()
    };
    let mut index = open(&dir, config);
    for k in 0..300 {
        index.insert(k, -k).unwrap();
    }
    assert!(index.table().pager().stats().snapshot().evictions > 0);
    for k in 0..300 {
        assert_eq!(index.find(k).unwrap().map(|e| e.value()), Some(-k));
    }
    index.table().validate().unwrap();
    index.close().unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every inserted entry is found, and the directory obeys the
    /// extendible-hashing invariants after any insert sequence.
    #[test]
    fn prop_inserted_entries_found(
        entries in prop::collection::vec((-1000i64..1000, any::<i64>()), 0..400),
        capacity in 1usize..8,
    ) {
        let dir = tempdir().unwrap();
        let config = IndexConfig {
            pager: PagerConfig::new(256, 8),
            bucket_capacity: Some(capacity),
            max_global_depth: 12,
        };
        let mut index = open(&dir, config);
        let mut expected: HashMap<i64, Vec<i64>> = HashMap::new();
        for &(k, v) in &entries {
            index.insert(k, v).unwrap();
            expected.entry(k).or_default().push(v);
        }

        prop_assert_eq!(index.table().buckets().len(), 1usize << index.table().global_depth());
        prop_assert!(index.table().validate().is_ok());
        for (k, values) in &expected {
            let mut found: Vec<i64> = index.table().find_all(*k).unwrap().iter().map(|e| e.value()).collect();
            let mut values = values.clone();
            found.sort_unstable();
            values.sort_unstable();
            prop_assert_eq!(found, values);
        }
        prop_assert_eq!(index.select().unwrap().len(), entries.len());
        prop_assert!(index.close().is_ok());
    }
}

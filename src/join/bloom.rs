//! A fixed-size Bloom filter over `i64` keys.

/// Hash functions per key.
const NUM_HASHES: u64 = 3;

/// Seed for the second base hash.
const SEED: u32 = 0x9E37_79B9;

/// Probabilistic set membership: `contains` never returns `false` for an
/// inserted key, but may return `true` for one that was not.
///
/// Bit positions come from double hashing two CRC32 digests of the key.
/// Bits are only ever set.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    size: u64,
    bits: Vec<u64>,
}

impl BloomFilter {
    /// A filter of `size` bits (at least one).
    pub fn new(size: u64) -> Self {
        let size = size.max(1);
        Self {
            size,
            bits: vec![0; size.div_ceil(64) as usize],
        }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn insert(&mut self, key: i64) {
        for bit in self.positions(key) {
            self.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
    }

    pub fn contains(&self, key: i64) -> bool {
        self.positions(key)
            .all(|bit| self.bits[(bit / 64) as usize] & (1 << (bit % 64)) != 0)
    }

    fn positions(&self, key: i64) -> impl Iterator<Item = u64> {
        let bytes = key.to_le_bytes();
        let h1 = u64::from(crc32fast::hash(&bytes));
        let mut seeded = crc32fast::Hasher::new_with_initial(SEED);
        seeded.update(&bytes);
        // Odd so the stride never collapses to zero.
        let h2 = u64::from(seeded.finalize()) | 1;
        let size = self.size;
        (0..NUM_HASHES).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_contains_nothing() {
        let filter = BloomFilter::new(1024);
        assert!((0..100).all(|k| !filter.contains(k)));
    }

    #[test]
    fn test_inserted_keys_found() {
        let mut filter = BloomFilter::new(1024);
        for k in [1, -1, 0, i64::MAX, i64::MIN] {
            filter.insert(k);
        }
        for k in [1, -1, 0, i64::MAX, i64::MIN] {
            assert!(filter.contains(k));
        }
    }

    #[test]
    fn test_zero_size_is_usable() {
        let mut filter = BloomFilter::new(0);
        assert_eq!(filter.size(), 1);
        filter.insert(5);
        assert!(filter.contains(5));
    }

    #[test]
    fn test_false_positive_rate_is_reasonable() {
        let mut filter = BloomFilter::new(1024);
        for k in 0..50 {
            filter.insert(k);
        }
        let false_positives = (10_000..20_000).filter(|&k| filter.contains(k)).count();
        // About 0.2% expected for 50 keys in 1024 bits with 3 hashes.
        assert!(false_positives < 500, "{} false positives", false_positives);
    }

    proptest! {
        #[test]
        fn prop_no_false_negatives(keys in prop::collection::vec(any::<i64>(), 0..300), size in 1u64..4096) {
            let mut filter = BloomFilter::new(size);
            for &k in &keys {
                filter.insert(k);
            }
            for &k in &keys {
                prop_assert!(filter.contains(k));
            }
        }
    }
}

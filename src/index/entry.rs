//! The record unit stored in hash buckets.

/// Capability set of a serialized record.
///
/// The hash index stores, and the join emits, values implementing this trait.
pub trait Entry {
    fn key(&self) -> i64;
    fn value(&self) -> i64;
    fn set_key(&mut self, key: i64);
    fn set_value(&mut self, value: i64);
    /// On-disk byte form of the entry.
    fn marshal(&self) -> Vec<u8>;
}

/// A `(key, value)` pair of 64-bit integers.
///
/// # Layout (16 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       8     key   (i64, little-endian)
/// 8       8     value (i64, little-endian)
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashEntry {
    key: i64,
    value: i64,
}

impl HashEntry {
    /// Serialized size in bytes.
    pub const SIZE: usize = 16;

    pub fn new(key: i64, value: i64) -> Self {
        Self { key, value }
    }

    /// The same entry with key and value exchanged.
    pub fn swapped(self) -> Self {
        Self {
            key: self.value,
            value: self.key,
        }
    }

    /// Decode an entry from the first [`HashEntry::SIZE`] bytes of `data`.
    ///
    /// # Panics
    /// Panics if `data.len() < HashEntry::SIZE`.
    pub fn unmarshal(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for HashEntry");
        let mut key = [0u8; 8];
        let mut value = [0u8; 8];
        key.copy_from_slice(&data[0..8]);
        value.copy_from_slice(&data[8..16]);
        Self {
            key: i64::from_le_bytes(key),
            value: i64::from_le_bytes(value),
        }
    }

    /// Encode this entry into the first [`HashEntry::SIZE`] bytes of `data`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for HashEntry");
        data[0..8].copy_from_slice(&self.key.to_le_bytes());
        data[8..16].copy_from_slice(&self.value.to_le_bytes());
    }
}

impl Entry for HashEntry {
    #[inline]
    fn key(&self) -> i64 {
        self.key
    }

    #[inline]
    fn value(&self) -> i64 {
        self.value
    }

    fn set_key(&mut self, key: i64) {
        self.key = key;
    }

    fn set_value(&mut self, value: i64) {
        self.value = value;
    }

    fn marshal(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        self.write_to(&mut buf);
        buf
    }
}

impl From<(i64, i64)> for HashEntry {
    fn from((key, value): (i64, i64)) -> Self {
        Self::new(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marshal_layout() {
        let entry = HashEntry::new(1, -2);
        let bytes = entry.marshal();
        assert_eq!(bytes.len(), HashEntry::SIZE);
        assert_eq!(&bytes[0..8], &1i64.to_le_bytes());
        assert_eq!(&bytes[8..16], &(-2i64).to_le_bytes());
        assert_eq!(HashEntry::unmarshal(&bytes), entry);
    }

    #[test]
    fn test_setters_and_swap() {
        let mut entry = HashEntry::new(1, 2);
        entry.set_key(10);
        entry.set_value(20);
        assert_eq!((entry.key(), entry.value()), (10, 20));
        assert_eq!(entry.swapped(), HashEntry::new(20, 10));
    }

    #[test]
    #[should_panic(expected = "buffer too small")]
    fn test_unmarshal_short_buffer() {
        HashEntry::unmarshal(&[0u8; 8]);
    }
}

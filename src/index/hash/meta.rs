//! The `.meta` sidecar that persists a hash table's directory.
//!
//! # Format
//! ```text
//! Offset      Size  Field
//! ------      ----  -----
//! 0           4     magic "GHIX"
//! 4           4     global_depth     (u32, little-endian)
//! 8           8     bucket_capacity  (u64)
//! 16          8     directory length (u64, = 2^global_depth)
//! 24          8·n   bucket page numbers (u64 each)
//! 24 + 8·n    4     CRC32 of everything before it
//! ```

use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::common::{Error, PageId, Result};

const MAGIC: &[u8; 4] = b"GHIX";
const HEADER_SIZE: usize = 24;
const CRC_SIZE: usize = 4;

/// Persisted directory of a [`HashTable`](super::HashTable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    pub global_depth: u32,
    pub bucket_capacity: u64,
    pub buckets: Vec<PageId>,
}

impl TableMeta {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.buckets.len() * 8 + CRC_SIZE);
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&self.global_depth.to_le_bytes());
        buf.extend_from_slice(&self.bucket_capacity.to_le_bytes());
        buf.extend_from_slice(&(self.buckets.len() as u64).to_le_bytes());
        for pn in &self.buckets {
            buf.extend_from_slice(&pn.0.to_le_bytes());
        }
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let corrupt = |msg: &str| Error::CorruptedMetadata(msg.to_string());

        if data.len() < HEADER_SIZE + CRC_SIZE {
            return Err(corrupt("meta file is truncated"));
        }
        let (body, crc) = data.split_at(data.len() - CRC_SIZE);
        if crc32fast::hash(body).to_le_bytes() != crc {
            return Err(corrupt("meta checksum mismatch"));
        }
        if &body[0..4] != MAGIC {
            return Err(corrupt("bad meta magic"));
        }

        let global_depth = read_u32(body, 4);
        let bucket_capacity = read_u64(body, 8);
        let len = read_u64(body, 16);
        if global_depth >= u64::BITS || len != 1u64 << global_depth {
            return Err(corrupt("directory length does not match global depth"));
        }
        if len.checked_mul(8) != Some((body.len() - HEADER_SIZE) as u64) {
            return Err(corrupt("directory length does not match file size"));
        }

        let buckets = body[HEADER_SIZE..]
            .chunks_exact(8)
            .map(|c| PageId::new(read_u64(c, 0)))
            .collect();
        Ok(Self {
            global_depth,
            bucket_capacity,
            buckets,
        })
    }

    /// Read the sidecar at `path`. `Ok(None)` if there is none.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        match std::fs::read(path) {
            Ok(data) => Self::decode(&data).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the sidecar at `path` and sync it.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(&self.encode())?;
        file.sync_all()?;
        Ok(())
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> TableMeta {
        TableMeta {
            global_depth: 2,
            bucket_capacity: 4,
            buckets: vec![PageId::new(0), PageId::new(1), PageId::new(0), PageId::new(2)],
        }
    }

    #[test]
    fn test_encode_decode() {
        let meta = sample();
        let bytes = meta.encode();
        assert_eq!(&bytes[0..4], b"GHIX");
        assert_eq!(bytes.len(), 24 + 4 * 8 + 4);
        assert_eq!(TableMeta::decode(&bytes).unwrap(), meta);
    }

    #[test]
    fn test_decode_detects_bit_flip() {
        let mut bytes = sample().encode();
        bytes[30] ^= 0x01;
        assert!(matches!(
            TableMeta::decode(&bytes),
            Err(Error::CorruptedMetadata(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let bytes = sample().encode();
        assert!(TableMeta::decode(&bytes[..10]).is_err());
    }

    #[test]
    fn test_read_missing_is_none() {
        let dir = tempdir().unwrap();
        assert_eq!(TableMeta::read(&dir.path().join("nope.meta")).unwrap(), None);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db.meta");
        sample().write(&path).unwrap();
        assert_eq!(TableMeta::read(&path).unwrap(), Some(sample()));
    }
}

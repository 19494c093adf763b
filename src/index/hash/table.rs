//! Extendible hash table over bucket pages.

use std::collections::HashSet;

use tracing::debug;

use crate::buffer::{PageHandle, Pager};
use crate::common::{Error, IndexConfig, PageId, Result};
use crate::index::hash::bucket::{fill_page, page_capacity, push_entry, BucketHeader, HashBucket};
use crate::index::hash::meta::TableMeta;
use crate::index::{Entry, HashEntry};

/// Hash a key to 32 bits. The directory slot is the low `global_depth` bits.
#[inline]
pub fn hash_key(key: i64) -> u32 {
    crc32fast::hash(&key.to_le_bytes())
}

/// Low `depth` bits of `hash`.
#[inline]
fn prefix(hash: u32, depth: u32) -> u64 {
    u64::from(hash) & ((1u64 << depth) - 1)
}

/// An extendible hash table whose buckets live in pages of one [`Pager`].
///
/// # Structure
/// ```text
///   global_depth = 2
///   directory            bucket pages
///   ┌────┬──────┐
///   │ 00 │ P0 ──┼──────▶ [ld=1 | k:4 k:10 ...]
///   │ 01 │ P1 ──┼──────▶ [ld=2 | k:1 ...] ──▶ overflow
///   │ 10 │ P0 ──┘
///   │ 11 │ P2 ─────────▶ [ld=2 | k:3 ...]
///   └────┴──────┘
/// ```
///
/// A bucket with local depth `d` is referenced by exactly
/// `2^(global_depth - d)` slots, all sharing the same low `d` bits.
pub struct HashTable {
    pager: Pager,
    global_depth: u32,
    buckets: Vec<PageId>,
    /// Entries a bucket holds before it splits.
    bucket_capacity: usize,
    /// Entries that physically fit in one page.
    page_capacity: usize,
    max_global_depth: u32,
}

impl HashTable {
    /// Build an empty table in an empty pager: one bucket at page 0, depth 0.
    pub fn create(pager: Pager, config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        if pager.num_pages() != 0 {
            return Err(Error::CorruptedMetadata(format!(
                "{:?} already holds {} pages",
                pager.path(),
                pager.num_pages()
            )));
        }

        let page = pager.get_new_page()?;
        debug_assert_eq!(page.page_id(), PageId::new(0));
        BucketHeader::empty(0).write(&page);
        let first = page.page_id();
        pager.put_page(page)?;

        let page_capacity = page_capacity(pager.page_size());
        Ok(Self {
            bucket_capacity: effective_capacity(config, page_capacity),
            page_capacity,
            max_global_depth: config.max_global_depth,
            global_depth: 0,
            buckets: vec![first],
            pager,
        })
    }

    /// Rebuild a table from its persisted directory.
    pub fn load(pager: Pager, meta: TableMeta, config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        let num_pages = pager.num_pages();
        if let Some(pn) = meta.buckets.iter().find(|pn| pn.0 >= num_pages) {
            return Err(Error::CorruptedMetadata(format!(
                "directory references {} but the file has {} pages",
                pn, num_pages
            )));
        }
        if meta.global_depth > config.max_global_depth {
            return Err(Error::CorruptedMetadata(format!(
                "global depth {} exceeds configured maximum {}",
                meta.global_depth, config.max_global_depth
            )));
        }

        let page_capacity = page_capacity(pager.page_size());
        let bucket_capacity = meta.bucket_capacity as usize;
        if bucket_capacity == 0 || bucket_capacity > page_capacity {
            return Err(Error::CorruptedMetadata(format!(
                "bucket capacity {} out of range",
                bucket_capacity
            )));
        }

        debug!(path = ?pager.path(), global_depth = meta.global_depth, "hash table loaded");
        Ok(Self {
            pager,
            global_depth: meta.global_depth,
            buckets: meta.buckets,
            bucket_capacity,
            page_capacity,
            max_global_depth: config.max_global_depth,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn global_depth(&self) -> u32 {
        self.global_depth
    }

    /// The directory: bucket page number per slot.
    #[inline]
    pub fn buckets(&self) -> &[PageId] {
        &self.buckets
    }

    #[inline]
    pub fn bucket_capacity(&self) -> usize {
        self.bucket_capacity
    }

    #[inline]
    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// Snapshot of the directory for the `.meta` sidecar.
    pub fn meta(&self) -> TableMeta {
        TableMeta {
            global_depth: self.global_depth,
            bucket_capacity: self.bucket_capacity as u64,
            buckets: self.buckets.clone(),
        }
    }

    #[inline]
    fn slot(&self, hash: u32) -> usize {
        prefix(hash, self.global_depth) as usize
    }

    /// Page number of the bucket `key` hashes to.
    pub fn bucket_for(&self, key: i64) -> PageId {
        self.buckets[self.slot(hash_key(key))]
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Pin the bucket whose head is page `pn`. The caller releases it.
    pub fn get_bucket_by_pn(&self, pn: PageId) -> Result<HashBucket> {
        Ok(HashBucket::new(self.pager.get_page(pn)?))
    }

    /// First entry stored under `key`.
    pub fn find(&self, key: i64) -> Result<Option<HashEntry>> {
        Ok(self.find_all(key)?.into_iter().next())
    }

    /// Every entry stored under `key`, in insertion order within the bucket.
    pub fn find_all(&self, key: i64) -> Result<Vec<HashEntry>> {
        let bucket = self.get_bucket_by_pn(self.bucket_for(key))?;
        let entries = bucket.entries()?;
        bucket.release()?;
        Ok(entries.into_iter().filter(|e| e.key() == key).collect())
    }

    /// Every entry in the table, bucket by bucket.
    pub fn select(&self) -> Result<Vec<HashEntry>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &pn in &self.buckets {
            if !seen.insert(pn) {
                continue;
            }
            let bucket = self.get_bucket_by_pn(pn)?;
            out.extend(bucket.entries()?);
            bucket.release()?;
        }
        Ok(out)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert `(key, value)`. Duplicate keys are kept.
    ///
    /// A bucket that grows past the capacity splits, doubling the directory
    /// first when its local depth equals the global depth. Entries whose hashes
    /// cannot be told apart below `max_global_depth` go to overflow pages.
    pub fn insert(&mut self, key: i64, value: i64) -> Result<()> {
        let pn = self.bucket_for(key);
        let total = self.append(pn, HashEntry::new(key, value))?;
        if total > self.bucket_capacity {
            self.split_overflowing(pn)?;
        }
        Ok(())
    }

    /// Double the directory. Each new slot points where its twin does; no
    /// entry moves.
    pub fn extend_table(&mut self) -> Result<()> {
        if self.global_depth >= self.max_global_depth {
            return Err(Error::DirectoryTooDeep(self.global_depth));
        }
        self.buckets.extend_from_within(..);
        self.global_depth += 1;
        debug!(global_depth = self.global_depth, slots = self.buckets.len(), "directory doubled");
        Ok(())
    }

    /// Add `entry` to the first page in the bucket's chain with room.
    /// Returns the bucket's new entry count.
    fn append(&self, head_pn: PageId, entry: HashEntry) -> Result<usize> {
        let head = self.pager.get_page(head_pn)?;
        let mut header = BucketHeader::read(&head);
        header.total_entries += 1;
        let total = header.total_entries as usize;

        if (header.num_entries as usize) < self.page_capacity {
            push_entry(&head, &mut header, entry);
        } else if let Some(mut next) = header.next {
            header.write(&head);
            loop {
                let page = self.pager.get_page(next)?;
                let mut chained = BucketHeader::read(&page);
                if (chained.num_entries as usize) < self.page_capacity {
                    push_entry(&page, &mut chained, entry);
                } else if let Some(pn) = chained.next {
                    next = pn;
                    self.pager.put_page(page)?;
                    continue;
                } else {
                    chained.next = Some(self.overflow_page(header.local_depth, &[entry])?);
                    chained.write(&page);
                }
                self.pager.put_page(page)?;
                break;
            }
        } else {
            header.next = Some(self.overflow_page(header.local_depth, &[entry])?);
            header.write(&head);
        }

        self.pager.put_page(head)?;
        Ok(total)
    }

    /// Allocate a chain page holding `entries`.
    fn overflow_page(&self, local_depth: u32, entries: &[HashEntry]) -> Result<PageId> {
        let page = self.pager.get_new_page()?;
        let pn = page.page_id();
        fill_page(&page, &mut BucketHeader::empty(local_depth), entries);
        self.pager.put_page(page)?;
        Ok(pn)
    }

    /// Split the bucket at `start`, and whatever it splits into, until every
    /// bucket is within capacity or cannot be separated further.
    fn split_overflowing(&mut self, start: PageId) -> Result<()> {
        let mut pending = vec![start];
        while let Some(pn) = pending.pop() {
            let bucket = self.get_bucket_by_pn(pn)?;
            if bucket.len() <= self.bucket_capacity {
                bucket.release()?;
                continue;
            }

            let local_depth = bucket.local_depth();
            let entries = bucket.entries()?;
            if !self.separable(&entries, local_depth) {
                debug!(bucket = %pn, entries = entries.len(), "bucket cannot split; chaining");
                bucket.release()?;
                continue;
            }

            if local_depth == self.global_depth {
                self.extend_table()?;
            }
            let new_pn = self.split_bucket(bucket.page(), local_depth, entries)?;
            bucket.release()?;
            pending.push(pn);
            pending.push(new_pn);
        }
        Ok(())
    }

    /// Would splitting eventually send two of `entries` to different buckets?
    fn separable(&self, entries: &[HashEntry], local_depth: u32) -> bool {
        if local_depth >= self.max_global_depth {
            return false;
        }
        let bits = |e: &HashEntry| prefix(hash_key(e.key()), self.max_global_depth) >> local_depth;
        match entries.split_first() {
            Some((first, rest)) => {
                let first = bits(first);
                rest.iter().any(|e| bits(e) != first)
            }
            None => false,
        }
    }

    /// Move the entries whose bit `local_depth` is set to a new bucket, and
    /// repoint the slots that select it. Both buckets end at `local_depth + 1`.
    fn split_bucket(
        &mut self,
        head: &PageHandle,
        local_depth: u32,
        entries: Vec<HashEntry>,
    ) -> Result<PageId> {
        let old_pn = head.page_id();
        let (stay, moved): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| (hash_key(e.key()) >> local_depth) & 1 == 0);

        let new_page = self.pager.get_new_page()?;
        let new_pn = new_page.page_id();
        self.rewrite(&new_page, local_depth + 1, &moved)?;
        self.pager.put_page(new_page)?;
        self.rewrite(head, local_depth + 1, &stay)?;

        for (i, slot) in self.buckets.iter_mut().enumerate() {
            if *slot == old_pn && (i >> local_depth) & 1 == 1 {
                *slot = new_pn;
            }
        }

        debug!(
            bucket = %old_pn,
            new_bucket = %new_pn,
            local_depth = local_depth + 1,
            kept = stay.len(),
            moved = moved.len(),
            "bucket split"
        );
        Ok(new_pn)
    }

    /// Replace a bucket's contents with `entries`, reusing its chain pages and
    /// linking new ones as needed. Surplus chain pages are left empty.
    fn rewrite(&self, head: &PageHandle, local_depth: u32, entries: &[HashEntry]) -> Result<()> {
        let mut chunks = entries.chunks(self.page_capacity).peekable();

        let mut header = BucketHeader::read(head);
        header.local_depth = local_depth;
        header.total_entries = entries.len() as u64;
        let first = chunks.next().unwrap_or(&[]);
        if chunks.peek().is_some() && header.next.is_none() {
            header.next = Some(self.overflow_page(local_depth, &[])?);
        }
        fill_page(head, &mut header, first);

        let mut next = header.next;
        while let Some(pn) = next {
            let page = self.pager.get_page(pn)?;
            let mut chained = BucketHeader::read(&page);
            chained.local_depth = local_depth;
            chained.total_entries = 0;
            let chunk = chunks.next().unwrap_or(&[]);
            if chunks.peek().is_some() && chained.next.is_none() {
                chained.next = Some(self.overflow_page(local_depth, &[])?);
            }
            fill_page(&page, &mut chained, chunk);
            next = chained.next;
            self.pager.put_page(page)?;
        }
        Ok(())
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Check the directory and every bucket against the extendible-hashing
    /// invariants.
    ///
    /// - the directory has `2^global_depth` slots
    /// - every bucket has `local_depth <= global_depth` and is referenced by
    ///   exactly `2^(global_depth - local_depth)` slots
    /// - every key in a bucket matches the bucket's hash prefix
    pub fn validate(&self) -> Result<()> {
        let corrupt = |msg: String| Err(Error::CorruptedMetadata(msg));

        if self.buckets.len() != 1usize << self.global_depth {
            return corrupt(format!(
                "directory has {} slots at global depth {}",
                self.buckets.len(),
                self.global_depth
            ));
        }

        let mut seen = HashSet::new();
        for (slot, &pn) in self.buckets.iter().enumerate() {
            if !seen.insert(pn) {
                continue;
            }
            let bucket = self.get_bucket_by_pn(pn)?;
            let local_depth = bucket.local_depth();
            let claimed = bucket.len();
            let entries = bucket.entries()?;
            bucket.release()?;

            if local_depth > self.global_depth {
                return corrupt(format!(
                    "bucket {} has local depth {} > global depth {}",
                    pn, local_depth, self.global_depth
                ));
            }
            let refs = self.buckets.iter().filter(|&&p| p == pn).count();
            if refs != 1usize << (self.global_depth - local_depth) {
                return corrupt(format!(
                    "bucket {} at local depth {} is referenced by {} slots",
                    pn, local_depth, refs
                ));
            }
            if claimed != entries.len() {
                return corrupt(format!(
                    "bucket {} claims {} entries but holds {}",
                    pn,
                    claimed,
                    entries.len()
                ));
            }
            let expected = prefix(slot as u32, local_depth);
            if let Some(e) = entries
                .iter()
                .find(|e| prefix(hash_key(e.key()), local_depth) != expected)
            {
                return corrupt(format!("key {} is misplaced in bucket {}", e.key(), pn));
            }
        }
        Ok(())
    }
}

fn effective_capacity(config: &IndexConfig, page_capacity: usize) -> usize {
    config
        .bucket_capacity
        .map_or(page_capacity, |c| c.min(page_capacity))
}

impl std::fmt::Debug for HashTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashTable")
            .field("path", &self.pager.path())
            .field("global_depth", &self.global_depth)
            .field("buckets", &self.buckets.len())
            .field("bucket_capacity", &self.bucket_capacity)
            .finish()
    }
}

//! Bucket page layout and the pinned [`HashBucket`] view.
//!
//! A bucket is a head page, optionally followed by a chain of overflow pages
//! for entries that cannot be separated by splitting. Every page in the chain
//! starts with a [`BucketHeader`] followed by packed [`HashEntry`] slots.

use crate::buffer::PageHandle;
use crate::common::{Error, PageId, Result};
use crate::index::HashEntry;

/// Metadata at the start of every bucket page.
///
/// # Layout (24 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     local_depth   (u32, little-endian)
/// 4       4     num_entries   (u32, entries stored in this page)
/// 8       8     next          (u64, next chain page, 0 = end of chain)
/// 16      8     total_entries (u64, entries in the whole chain; head only)
/// ```
///
/// Page 0 always holds a table's first bucket head, so it can never be an
/// overflow page and 0 is free to mean "no next page". A freshly zeroed page
/// therefore reads as an empty bucket of depth 0.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BucketHeader {
    pub local_depth: u32,
    pub num_entries: u32,
    pub next: Option<PageId>,
    pub total_entries: u64,
}

impl BucketHeader {
    pub const SIZE: usize = 24;

    const OFFSET_LOCAL_DEPTH: usize = 0;
    const OFFSET_NUM_ENTRIES: usize = 4;
    const OFFSET_NEXT: usize = 8;
    const OFFSET_TOTAL: usize = 16;

    pub fn empty(local_depth: u32) -> Self {
        Self {
            local_depth,
            ..Self::default()
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for BucketHeader");
        let next = read_u64(data, Self::OFFSET_NEXT);
        Self {
            local_depth: read_u32(data, Self::OFFSET_LOCAL_DEPTH),
            num_entries: read_u32(data, Self::OFFSET_NUM_ENTRIES),
            next: (next != 0).then_some(PageId::new(next)),
            total_entries: read_u64(data, Self::OFFSET_TOTAL),
        }
    }

    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for BucketHeader");
        data[Self::OFFSET_LOCAL_DEPTH..Self::OFFSET_LOCAL_DEPTH + 4]
            .copy_from_slice(&self.local_depth.to_le_bytes());
        data[Self::OFFSET_NUM_ENTRIES..Self::OFFSET_NUM_ENTRIES + 4]
            .copy_from_slice(&self.num_entries.to_le_bytes());
        let next = self.next.map_or(0, |p| p.0);
        data[Self::OFFSET_NEXT..Self::OFFSET_NEXT + 8].copy_from_slice(&next.to_le_bytes());
        data[Self::OFFSET_TOTAL..Self::OFFSET_TOTAL + 8]
            .copy_from_slice(&self.total_entries.to_le_bytes());
    }

    #[inline]
    pub fn read(page: &PageHandle) -> Self {
        Self::from_bytes(&page.data())
    }

    #[inline]
    pub fn write(&self, page: &PageHandle) {
        self.write_to(&mut page.data_mut());
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

/// How many entries physically fit in one page of `page_size` bytes.
pub(crate) fn page_capacity(page_size: usize) -> usize {
    (page_size - BucketHeader::SIZE) / HashEntry::SIZE
}

#[inline]
fn slot_offset(i: usize) -> usize {
    BucketHeader::SIZE + i * HashEntry::SIZE
}

/// Decode the entries stored in one bucket page.
fn page_entries(page_id: PageId, data: &[u8]) -> Result<Vec<HashEntry>> {
    let header = BucketHeader::from_bytes(data);
    let n = header.num_entries as usize;
    if n > page_capacity(data.len()) {
        return Err(Error::CorruptedMetadata(format!(
            "bucket {} claims {} entries",
            page_id, n
        )));
    }
    Ok((0..n)
        .map(|i| HashEntry::unmarshal(&data[slot_offset(i)..]))
        .collect())
}

/// Overwrite a page with `header` and exactly `entries`.
pub(crate) fn fill_page(page: &PageHandle, header: &mut BucketHeader, entries: &[HashEntry]) {
    header.num_entries = entries.len() as u32;
    let mut data = page.data_mut();
    header.write_to(&mut data);
    for (i, entry) in entries.iter().enumerate() {
        entry.write_to(&mut data[slot_offset(i)..]);
    }
}

/// Append one entry after the ones already in the page.
///
/// The caller checks there is room.
pub(crate) fn push_entry(page: &PageHandle, header: &mut BucketHeader, entry: HashEntry) {
    let slot = header.num_entries as usize;
    header.num_entries += 1;
    let mut data = page.data_mut();
    entry.write_to(&mut data[slot_offset(slot)..]);
    header.write_to(&mut data);
}

/// A pinned bucket head page.
///
/// Returned by [`HashTable::get_bucket_by_pn`](super::HashTable::get_bucket_by_pn).
/// The caller owns the pin: release it with [`HashBucket::release`], or let
/// the bucket drop.
#[derive(Debug)]
pub struct HashBucket {
    page: PageHandle,
}

impl HashBucket {
    pub(crate) fn new(page: PageHandle) -> Self {
        Self { page }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page.page_id()
    }

    #[inline]
    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    pub fn local_depth(&self) -> u32 {
        BucketHeader::read(&self.page).local_depth
    }

    /// Entries in the whole bucket, overflow pages included.
    pub fn len(&self) -> usize {
        BucketHeader::read(&self.page).total_entries as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read every entry of the bucket, following its overflow chain.
    ///
    /// Chain pages are pinned one at a time and released before returning.
    pub fn entries(&self) -> Result<Vec<HashEntry>> {
        let pager = self.page.pager();
        let (mut entries, mut next) = {
            let data = self.page.data();
            let header = BucketHeader::from_bytes(&data);
            (page_entries(self.page_id(), &data)?, header.next)
        };

        while let Some(page_id) = next {
            let page = pager.get_page(page_id)?;
            next = {
                let data = page.data();
                entries.extend(page_entries(page_id, &data)?);
                BucketHeader::from_bytes(&data).next
            };
            pager.put_page(page)?;
        }
        Ok(entries)
    }

    /// Unpin the bucket's head page.
    pub fn release(self) -> Result<()> {
        self.page.release()
    }
}

//! Page - one frame of the buffer pool.
//!
//! A [`Page`] holds the raw bytes of one on-disk block plus the metadata the
//! pager needs:
//! - Which page number is loaded (or the `NoPage` sentinel)
//! - Pin count for reference counting
//! - Dirty flag for write-back tracking

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{Error, PageId, Result};

/// A frame in the buffer pool.
///
/// The pager allocates all of its pages once, at open, and recycles them for
/// its whole lifetime. Pin count and page number only change while the pager
/// holds its state lock; the atomics let page handles read them without
/// taking that lock.
///
/// # Thread Safety
/// - `data`: `RwLock` for in-place reads and writes by page holders
/// - `page_id`, `pin_count`, `dirty`: atomics
pub struct Page {
    data: RwLock<Box<[u8]>>,
    page_id: AtomicU64,
    pin_count: AtomicU32,
    dirty: AtomicBool,
}

impl Page {
    /// Create an unassigned, zeroed frame of `page_size` bytes.
    pub fn new(page_size: usize) -> Self {
        Self {
            data: RwLock::new(vec![0u8; page_size].into_boxed_slice()),
            page_id: AtomicU64::new(PageId::INVALID.0),
            pin_count: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    /// Shared view of the page bytes.
    #[inline]
    pub fn data(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.data.read()
    }

    /// Exclusive view of the page bytes. Does not mark the page dirty.
    #[inline]
    pub fn data_mut(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.data.write()
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        PageId(self.page_id.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.0, Ordering::Release);
    }

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Errors
    /// `Error::PinCountUnderflow` if the page is not pinned. The count is
    /// left at zero.
    pub fn unpin(&self) -> Result<u32> {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1))
            .map(|old| old - 1)
            .map_err(|_| Error::PinCountUnderflow(self.page_id()))
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Bind this frame to `page_id` with clean, unpinned metadata.
    pub(crate) fn assign(&self, page_id: PageId) {
        self.set_page_id(page_id);
        self.pin_count.store(0, Ordering::Release);
        self.clear_dirty();
    }

    /// Return the frame to the unassigned state.
    pub(crate) fn unassign(&self) {
        self.assign(PageId::INVALID);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_new() {
        let page = Page::new(128);
        assert!(!page.page_id().is_valid());
        assert!(!page.is_pinned());
        assert!(!page.is_dirty());
        assert_eq!(page.data().len(), 128);
    }

    #[test]
    fn test_pin_unpin() {
        let page = Page::new(64);

        assert_eq!(page.pin(), 1);
        assert_eq!(page.pin(), 2);
        assert_eq!(page.unpin().unwrap(), 1);
        assert!(page.is_pinned());
        assert_eq!(page.unpin().unwrap(), 0);
        assert!(!page.is_pinned());
    }

    #[test]
    fn test_unpin_underflow_is_an_error() {
        let page = Page::new(64);
        page.assign(PageId::new(3));

        match page.unpin() {
            Err(Error::PinCountUnderflow(pid)) => assert_eq!(pid, PageId::new(3)),
            other => panic!("expected underflow, got {:?}", other),
        }
        assert_eq!(page.pin_count(), 0);
    }

    #[test]
    fn test_dirty_flag() {
        let page = Page::new(64);
        page.mark_dirty();
        assert!(page.is_dirty());
        page.clear_dirty();
        assert!(!page.is_dirty());
    }

    #[test]
    fn test_assign_resets_metadata() {
        let page = Page::new(64);
        page.assign(PageId::new(9));
        page.pin();
        page.mark_dirty();

        page.unassign();
        assert_eq!(page.page_id(), PageId::INVALID);
        assert_eq!(page.pin_count(), 0);
        assert!(!page.is_dirty());
    }

    #[test]
    fn test_data_in_place() {
        let page = Page::new(64);
        page.data_mut()[10] = 0xAB;
        assert_eq!(page.data()[10], 0xAB);
    }
}

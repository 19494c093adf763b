//! Pinned page references.
//!
//! A [`PageHandle`] is the caller's proof that a page is pinned. It is
//! released explicitly with [`Pager::put_page`] (which reports errors), or
//! implicitly when dropped, so a page fetched on a path that later fails is
//! still unpinned.

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use crate::buffer::{Page, Pager};
use crate::common::{FrameId, PageId, Result};

/// A pinned page.
///
/// Holding a handle keeps the page resident. The byte views take the page's
/// own `RwLock`; drop them before calling back into the pager.
///
/// # Example
/// ```no_run
/// # use gracedb::buffer::Pager;
/// # use gracedb::common::PagerConfig;
/// # fn main() -> gracedb::Result<()> {
/// let pager = Pager::open("data/example.db", PagerConfig::default())?;
/// let page = pager.get_new_page()?;
/// page.data_mut()[0] = 0xAB;
/// pager.put_page(page)?;
/// pager.close()?;
/// # Ok(())
/// # }
/// ```
pub struct PageHandle {
    pager: Pager,
    frame_id: FrameId,
    page_id: PageId,
    released: bool,
}

impl PageHandle {
    pub(crate) fn new(pager: Pager, frame_id: FrameId, page_id: PageId) -> Self {
        Self {
            pager,
            frame_id,
            page_id,
            released: false,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// The pager this page belongs to.
    #[inline]
    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    #[inline]
    fn page(&self) -> &Page {
        self.pager.frame(self.frame_id)
    }

    /// Read the page bytes in place.
    #[inline]
    pub fn data(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.page().data()
    }

    /// Write the page bytes in place. Marks the page dirty.
    ///
    /// The flag is set under the write lock, so a concurrent flush either
    /// writes these bytes or sees the page dirty again afterwards.
    #[inline]
    pub fn data_mut(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        let page = self.page();
        let data = page.data_mut();
        page.mark_dirty();
        data
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.page().mark_dirty();
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.page().is_dirty()
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.page().pin_count()
    }

    /// Release this reference. Same as `pager.put_page(handle)`.
    pub fn release(self) -> Result<()> {
        let pager = self.pager.clone();
        pager.put_page(self)
    }

    /// Give up the pin through `Pager::release`, consuming the drop obligation.
    pub(crate) fn take_release(&mut self) -> Result<()> {
        self.released = true;
        self.pager.release(self.frame_id, self.page_id)
    }
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.take_release() {
            warn!(page = %self.page_id, error = %e, "failed to unpin dropped page handle");
        }
    }
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame_id)
            .field("released", &self.released)
            .finish()
    }
}

//! Pager - the buffer pool in front of one page file.
//!
//! The [`Pager`] provides:
//! - Page caching between disk and a fixed arena of frames
//! - Pin-based reference counting through [`PageHandle`]
//! - FIFO eviction of unpinned pages, with dirty write-back
//! - Explicit flush and close

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::buffer::frame_list::{FrameQueues, QueueKind};
use crate::buffer::{BufferPoolStats, Page, PageHandle};
use crate::common::{Error, FrameId, PageId, PagerConfig, Result};
use crate::storage::DiskManager;

/// Manages a fixed pool of page frames for one backing file.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                           Pager                              │
/// │  ┌──────────────────────── Mutex ──────────────────────────┐ │
/// │  │ page_table: PageId → FrameId                            │ │
/// │  │ queues:  free ─▶ [F3] [F4]                              │ │
/// │  │          unpinned ─▶ [F1] (head = next victim)          │ │
/// │  │          pinned ─▶ [F0] [F2]                            │ │
/// │  │ disk: DiskManager, num_pages                            │ │
/// │  └─────────────────────────────────────────────────────────┘ │
/// │  frames: Vec<Page>  [F0] [F1] [F2] [F3] [F4]  (fixed)        │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// `Pager` is a cheap clonable handle. The page table, the three queues, the
/// page count and the file all sit behind one mutex, held for the whole of a
/// lookup, eviction, disk read and queue update. Frames are fixed after open
/// and carry their own byte locks.
///
/// # Usage
/// ```no_run
/// # use gracedb::buffer::Pager;
/// # use gracedb::common::{PagerConfig, PageId};
/// # fn main() -> gracedb::Result<()> {
/// let pager = Pager::open("data/test.db", PagerConfig::default())?;
///
/// let page = pager.get_new_page()?;
/// page.data_mut()[0] = 0xAB;
/// pager.put_page(page)?;
///
/// let page = pager.get_page(PageId::new(0))?;
/// assert_eq!(page.data()[0], 0xAB);
/// pager.put_page(page)?;
///
/// pager.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Pager {
    shared: Arc<Shared>,
}

struct Shared {
    config: PagerConfig,
    path: PathBuf,
    /// Fixed pool of frames allocated at open.
    frames: Vec<Page>,
    state: Mutex<PoolState>,
    stats: BufferPoolStats,
}

struct PoolState {
    /// `None` once the pager is closed.
    disk: Option<DiskManager>,
    /// Pages in the file, including allocated pages not yet written.
    num_pages: u64,
    page_table: HashMap<PageId, FrameId>,
    queues: FrameQueues,
}

impl Pager {
    /// Open (or create) the page file at `path`.
    ///
    /// No page is loaded into memory.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if `config` fails validation
    /// - `Error::Corrupted` if the file length is not a multiple of the page size
    /// - I/O errors from opening the file
    pub fn open<P: AsRef<Path>>(path: P, config: PagerConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();
        let disk = DiskManager::open(path, config.page_size)?;
        let num_pages = disk.page_count()?;

        let frames: Vec<Page> = (0..config.frame_count)
            .map(|_| Page::new(config.page_size))
            .collect();

        debug!(path = ?path, num_pages, frames = config.frame_count, "pager opened");

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                path: path.to_path_buf(),
                frames,
                state: Mutex::new(PoolState {
                    disk: Some(disk),
                    num_pages,
                    page_table: HashMap::new(),
                    queues: FrameQueues::new(config.frame_count),
                }),
                stats: BufferPoolStats::new(),
            }),
        })
    }

    // ========================================================================
    // Public API: acquire and release pages
    // ========================================================================

    /// Allocate the next page number and return it pinned and zeroed.
    ///
    /// The new page is dirty, so it reaches the file on eviction or flush.
    ///
    /// # Errors
    /// - `Error::RanOutOfPages` if every frame is pinned
    /// - `Error::PagerClosed` after `close`
    pub fn get_new_page(&self) -> Result<PageHandle> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if state.disk.is_none() {
            return Err(Error::PagerClosed);
        }

        let page_id = PageId::new(state.num_pages);
        let frame_id = self.new_frame(state, page_id)?;
        state.num_pages += 1;

        let page = self.frame(frame_id);
        page.data_mut().fill(0);
        page.mark_dirty();
        page.pin();
        state.page_table.insert(page_id, frame_id);
        state.queues.push_tail(QueueKind::Pinned, frame_id);

        trace!(page = %page_id, frame = %frame_id, "allocated page");
        Ok(PageHandle::new(self.clone(), frame_id, page_id))
    }

    /// Pin page `page_id`, reading it from disk if it is not resident.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if `page_id >= num_pages()`
    /// - `Error::RanOutOfPages` if the page is not resident and every frame is pinned
    /// - I/O errors from the read or from flushing the eviction victim
    pub fn get_page(&self, page_id: PageId) -> Result<PageHandle> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if state.disk.is_none() {
            return Err(Error::PagerClosed);
        }

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            if self.frame(frame_id).pin() == 1 {
                state.queues.move_to_tail(QueueKind::Pinned, frame_id);
            }
            self.shared.stats.record_hit();
            trace!(page = %page_id, frame = %frame_id, "page hit");
            return Ok(PageHandle::new(self.clone(), frame_id, page_id));
        }

        if page_id.0 >= state.num_pages {
            return Err(Error::PageNotFound(page_id));
        }

        let frame_id = self.new_frame(state, page_id)?;
        let page = self.frame(frame_id);
        let read = match state.disk.as_mut() {
            Some(disk) => disk.read_page(page_id, &mut page.data_mut()),
            None => Err(Error::PagerClosed),
        };
        if let Err(e) = read {
            page.unassign();
            state.queues.push_tail(QueueKind::Free, frame_id);
            return Err(e);
        }

        page.pin();
        state.page_table.insert(page_id, frame_id);
        state.queues.push_tail(QueueKind::Pinned, frame_id);
        self.shared.stats.record_miss();

        trace!(page = %page_id, frame = %frame_id, "page miss");
        Ok(PageHandle::new(self.clone(), frame_id, page_id))
    }

    /// Release a reference to a page.
    ///
    /// When the pin count reaches zero the page moves to the tail of the
    /// unpinned queue and becomes an eviction candidate.
    ///
    /// # Errors
    /// `Error::PinCountUnderflow` if the page was not pinned.
    pub fn put_page(&self, mut page: PageHandle) -> Result<()> {
        debug_assert!(
            Arc::ptr_eq(&self.shared, &page.pager().shared),
            "page handle released through a different pager"
        );
        page.take_release()
    }

    // ========================================================================
    // Public API: flush and close
    // ========================================================================

    /// Write `page` to disk if it is dirty, then clear its dirty flag.
    pub fn flush_page(&self, page: &PageHandle) -> Result<()> {
        let mut guard = self.shared.state.lock();
        let disk = guard.disk.as_mut().ok_or(Error::PagerClosed)?;
        write_back(disk, self.frame(page.frame_id()), &self.shared.stats)
    }

    /// Write every dirty resident page, pinned or not, to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut guard = self.shared.state.lock();
        self.flush_all_locked(&mut guard)
    }

    /// Flush all dirty pages and close the backing file.
    ///
    /// # Errors
    /// `Error::PagesStillPinned` if any page is pinned. The pager is left
    /// open and unchanged, so the caller can release its pages and retry.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if state.disk.is_none() {
            return Err(Error::PagerClosed);
        }

        let pinned = state.queues.len(QueueKind::Pinned);
        if pinned > 0 {
            return Err(Error::PagesStillPinned(pinned));
        }

        self.flush_all_locked(state)?;
        let disk = state.disk.take();

        for page in &self.shared.frames {
            page.unassign();
        }
        state.page_table.clear();
        state.queues = FrameQueues::new(self.shared.frames.len());

        debug!(path = ?self.shared.path, num_pages = state.num_pages, "pager closed");
        match disk {
            Some(disk) => disk.sync(),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Public API: introspection
    // ========================================================================

    #[inline]
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    #[inline]
    pub fn config(&self) -> PagerConfig {
        self.shared.config
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.shared.config.page_size
    }

    /// Number of pages in the file, including allocated but unwritten ones.
    pub fn num_pages(&self) -> u64 {
        self.shared.state.lock().num_pages
    }

    /// The page number the next `get_new_page` will hand out.
    pub fn free_page_number(&self) -> PageId {
        PageId::new(self.num_pages())
    }

    /// Pin count of `page_id` if it is resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.shared.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|fid| self.frame(*fid).pin_count())
    }

    /// Is `page_id` currently held in a frame?
    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.shared.state.lock().page_table.contains_key(&page_id)
    }

    pub fn resident_count(&self) -> usize {
        self.shared.state.lock().page_table.len()
    }

    pub fn free_frame_count(&self) -> usize {
        self.shared.state.lock().queues.len(QueueKind::Free)
    }

    pub fn pinned_count(&self) -> usize {
        self.shared.state.lock().queues.len(QueueKind::Pinned)
    }

    pub fn unpinned_count(&self) -> usize {
        self.shared.state.lock().queues.len(QueueKind::Unpinned)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().disk.is_none()
    }

    pub fn stats(&self) -> &BufferPoolStats {
        &self.shared.stats
    }

    // ========================================================================
    // Internal
    // ========================================================================

    #[inline]
    pub(crate) fn frame(&self, frame_id: FrameId) -> &Page {
        &self.shared.frames[frame_id.0]
    }

    /// Drop one pin on `frame_id`. Called through `PageHandle`.
    pub(crate) fn release(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let mut state = self.shared.state.lock();
        let page = self.frame(frame_id);
        debug_assert_eq!(page.page_id(), page_id);

        if page.unpin()? == 0 {
            state.queues.move_to_tail(QueueKind::Unpinned, frame_id);
            trace!(page = %page_id, frame = %frame_id, "page unpinned");
        }
        Ok(())
    }

    /// Find a frame for `page_id`: a free one, else the head of the unpinned
    /// queue. The returned frame is assigned to `page_id`, unpinned, clean,
    /// and on no queue.
    fn new_frame(&self, state: &mut PoolState, page_id: PageId) -> Result<FrameId> {
        if let Some(frame_id) = state.queues.pop_head(QueueKind::Free) {
            self.frame(frame_id).assign(page_id);
            return Ok(frame_id);
        }

        let disk = state.disk.as_mut().ok_or(Error::PagerClosed)?;
        let victim = state
            .queues
            .pop_head(QueueKind::Unpinned)
            .ok_or(Error::RanOutOfPages)?;
        let page = self.frame(victim);
        let old_page_id = page.page_id();

        if let Err(e) = write_back(disk, page, &self.shared.stats) {
            // The victim stays resident and first in line.
            state.queues.push_head(QueueKind::Unpinned, victim);
            return Err(e);
        }

        state.page_table.remove(&old_page_id);
        page.assign(page_id);
        self.shared.stats.record_eviction();

        debug!(victim = %old_page_id, frame = %victim, replacement = %page_id, "evicted page");
        Ok(victim)
    }

    fn flush_all_locked(&self, state: &mut PoolState) -> Result<()> {
        let disk = state.disk.as_mut().ok_or(Error::PagerClosed)?;
        for &frame_id in state.page_table.values() {
            write_back(disk, self.frame(frame_id), &self.shared.stats)?;
        }
        Ok(())
    }
}

/// Write `page` at its offset iff dirty, then clear the dirty flag.
///
/// The read lock is held until the flag is cleared: a writer marks the page
/// dirty only once it holds the write lock, so it cannot be cleared over.
fn write_back(disk: &mut DiskManager, page: &Page, stats: &BufferPoolStats) -> Result<()> {
    if page.is_dirty() {
        let data = page.data();
        disk.write_page(page.page_id(), &data)?;
        page.clear_dirty();
        drop(data);
        stats.record_write();
    }
    Ok(())
}

impl std::fmt::Debug for Pager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("path", &self.shared.path)
            .field("config", &self.shared.config)
            .finish()
    }
}

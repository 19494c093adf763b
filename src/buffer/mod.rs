//! Buffer pool management.
//!
//! The pager is the in-memory cache between the hash index and disk. It
//! manages a fixed pool of frames, each holding one page.
//!
//! # Components
//! - [`Pager`] - The page cache for one file
//! - [`Page`] - A frame: page bytes plus page number, pin count and dirty flag
//! - [`PageHandle`] - A pinned reference, released explicitly or on drop
//! - [`BufferPoolStats`] - Hit/miss/eviction counters
//! - `frame_list` - The free/unpinned/pinned queues

mod frame_list;
mod page;
mod page_handle;
mod pager;
mod stats;

pub use page::Page;
pub use page_handle::PageHandle;
pub use pager::Pager;
pub use stats::{BufferPoolStats, StatsSnapshot};

//! gracedb - a paged storage core with an extendible hash index and a
//! concurrent Grace hash join.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            gracedb                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Join Layer (join/)                       │   │
//! │  │   partition → equalize depths → probe tasks → channel    │   │
//! │  │          TaskGroup + CancellationToken + Cleanup         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Index Layer (index/)                      │   │
//! │  │     HashIndex → HashTable (directory) → bucket pages     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │               Buffer Pool (buffer/)                      │   │
//! │  │   Pager: free / unpinned / pinned queues, FIFO eviction  │   │
//! │  │          PageHandle (pins) + Statistics                  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │             Storage Layer (storage/)                     │   │
//! │  │                DiskManager: aligned page I/O             │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`buffer`] - The pager and its page handles
//! - [`storage`] - Disk I/O
//! - [`index`] - Extendible hash index
//! - [`join`] - Grace hash join
//! - [`failpoint`] - Named failpoints for tests
//!
//! # Quick Start
//! ```no_run
//! use gracedb::common::IndexConfig;
//! use gracedb::index::HashIndex;
//!
//! # async fn demo() -> gracedb::Result<()> {
//! let mut users = HashIndex::open("data/users.db", IndexConfig::default())?;
//! let mut orders = HashIndex::open("data/orders.db", IndexConfig::default())?;
//! users.insert(1, 10)?;
//! orders.insert(1, 99)?;
//!
//! let pairs = gracedb::join(&users, &orders, true, true)?.collect().await?;
//! assert_eq!(pairs.len(), 1);
//!
//! users.close()?;
//! orders.close()?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod common;
pub mod failpoint;
pub mod index;
pub mod join;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, IndexConfig, JoinConfig, PageId, PagerConfig, Result};

pub use buffer::{BufferPoolStats, PageHandle, Pager, StatsSnapshot};
pub use index::{Entry, HashEntry, HashIndex, Index};
pub use join::{join, join_with_config, EntryPair, JoinOutput};
pub use storage::DiskManager;

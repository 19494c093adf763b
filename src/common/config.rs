//! Configuration constants and tunables for gracedb.
//!
//! Nothing here is read from global state or the environment. Every component
//! that needs a tunable receives it as an explicit config value at
//! construction.

use crate::common::{Error, Result};

/// Default size of a page in bytes (4KB).
///
/// Matches the block size of most filesystems, so one page is one aligned
/// I/O block. Page `N` lives at file offset `N × page_size`.
pub const PAGE_SIZE: usize = 4096;

/// Smallest page size accepted by [`PagerConfig::validate`].
pub const MIN_PAGE_SIZE: usize = 64;

/// Default number of frames in a pager's buffer pool.
pub const DEFAULT_FRAME_COUNT: usize = 32;

/// Fewest frames a hash index can operate with.
///
/// Splitting keeps a bucket head, a freshly allocated page and one chain page
/// pinned at the same time.
pub const MIN_INDEX_FRAMES: usize = 4;

/// Default cap on a hash table's global depth (a directory of 2^20 slots).
pub const DEFAULT_MAX_GLOBAL_DEPTH: u32 = 20;

/// Hard cap on global depth. Keys hash to 32 bits.
pub const MAX_GLOBAL_DEPTH: u32 = 32;

/// Capacity of the join result channel.
pub const JOIN_CHANNEL_CAPACITY: usize = 1024;

/// Default size, in bits, of the Bloom filter built for each probed bucket pair.
pub const DEFAULT_FILTER_SIZE: u64 = 1024;

/// Tunables for a [`Pager`](crate::buffer::Pager).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerConfig {
    /// Bytes per page. Must be a power of two, at least [`MIN_PAGE_SIZE`].
    pub page_size: usize,
    /// Number of in-memory frames, allocated once when the pager opens.
    pub frame_count: usize,
}

impl PagerConfig {
    pub fn new(page_size: usize, frame_count: usize) -> Self {
        Self {
            page_size,
            frame_count,
        }
    }

    /// Default page size with the given number of frames.
    pub fn with_frames(frame_count: usize) -> Self {
        Self {
            frame_count,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two() || self.page_size < MIN_PAGE_SIZE {
            return Err(Error::InvalidConfig(format!(
                "page size {} must be a power of two >= {}",
                self.page_size, MIN_PAGE_SIZE
            )));
        }
        if self.frame_count == 0 {
            return Err(Error::InvalidConfig("frame count must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            frame_count: DEFAULT_FRAME_COUNT,
        }
    }
}

/// Tunables for an extendible [`HashIndex`](crate::index::HashIndex).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Pager settings for the index file.
    pub pager: PagerConfig,
    /// Entries a bucket may hold before it splits.
    ///
    /// `None` means "as many as fit in one page".
    pub bucket_capacity: Option<usize>,
    /// Deepest the directory may grow. Buckets that would need to split past
    /// this depth chain overflow pages instead.
    pub max_global_depth: u32,
}

impl IndexConfig {
    /// Default settings with a fixed split threshold.
    pub fn with_bucket_capacity(capacity: usize) -> Self {
        Self {
            bucket_capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.pager.validate()?;
        if self.pager.frame_count < MIN_INDEX_FRAMES {
            return Err(Error::InvalidConfig(format!(
                "a hash index needs at least {} frames, got {}",
                MIN_INDEX_FRAMES, self.pager.frame_count
            )));
        }
        if self.bucket_capacity == Some(0) {
            return Err(Error::InvalidConfig("bucket capacity must be > 0".into()));
        }
        if self.max_global_depth == 0 || self.max_global_depth > MAX_GLOBAL_DEPTH {
            return Err(Error::InvalidConfig(format!(
                "max global depth must be in 1..={}",
                MAX_GLOBAL_DEPTH
            )));
        }
        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            pager: PagerConfig::default(),
            bucket_capacity: None,
            max_global_depth: DEFAULT_MAX_GLOBAL_DEPTH,
        }
    }
}

/// Tunables for [`join_with_config`](crate::join::join_with_config).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinConfig {
    /// Settings for the two temporary partition indexes.
    pub index: IndexConfig,
    /// Results buffered before probe tasks block.
    pub channel_capacity: usize,
    /// Bits in each probe's Bloom filter.
    pub filter_size: u64,
}

impl JoinConfig {
    pub fn validate(&self) -> Result<()> {
        self.index.validate()?;
        if self.channel_capacity == 0 {
            return Err(Error::InvalidConfig("channel capacity must be > 0".into()));
        }
        if self.filter_size == 0 {
            return Err(Error::InvalidConfig("filter size must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            channel_capacity: JOIN_CHANNEL_CAPACITY,
            filter_size: DEFAULT_FILTER_SIZE,
        }
    }
}

//! Concurrent Grace hash join.

mod bloom;
mod grace;
mod task_group;

pub use bloom::BloomFilter;
pub use grace::{join, join_with_config, Cleanup, EntryPair, JoinOutput};
pub use task_group::TaskGroup;

/// Failpoint checked by each probe after it has pinned its buckets.
pub const PROBE_FAILPOINT: &str = "join::probe";

//! On-disk indexes.

mod entry;
pub mod hash;

pub use entry::{Entry, HashEntry};
pub use hash::{HashBucket, HashIndex, HashTable};

/// Anything backed by a [`HashTable`]. The join reads its inputs through this.
pub trait Index: Send + Sync {
    fn table(&self) -> &HashTable;
}

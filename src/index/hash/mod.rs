//! Extendible hashing.

mod bucket;
mod hash_index;
mod meta;
mod table;

pub use bucket::HashBucket;
pub use hash_index::{meta_path, HashIndex};
pub use meta::TableMeta;
pub use table::{hash_key, HashTable};

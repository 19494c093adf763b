//! A hash table bound to its page file and `.meta` sidecar.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::buffer::Pager;
use crate::common::{Error, IndexConfig, Result};
use crate::index::hash::meta::TableMeta;
use crate::index::hash::HashTable;
use crate::index::{HashEntry, Index};

/// Path of the sidecar that holds the directory for the index at `path`.
pub fn meta_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".meta");
    PathBuf::from(name)
}

/// An on-disk extendible hash index.
///
/// Bucket pages live in the file at `path`; the directory lives in
/// `path.meta` and is written on [`HashIndex::close`].
///
/// # Example
/// ```no_run
/// # use gracedb::index::{Entry, HashIndex};
/// # use gracedb::common::IndexConfig;
/// # fn main() -> gracedb::Result<()> {
/// let mut index = HashIndex::open("data/users.db", IndexConfig::default())?;
/// index.insert(1, 100)?;
/// assert_eq!(index.find(1)?.map(|e| e.value()), Some(100));
/// index.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HashIndex {
    path: PathBuf,
    table: HashTable,
}

impl HashIndex {
    /// Open the index at `path`, creating it if the file is empty.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if `config` fails validation
    /// - `Error::CorruptedMetadata` if the file has pages but the sidecar is
    ///   missing or fails its checksum
    /// - anything [`Pager::open`] returns
    pub fn open<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        let pager = Pager::open(&path, config.pager)?;

        let table = match TableMeta::read(&meta_path(&path))? {
            Some(meta) => HashTable::load(pager, meta, &config)?,
            None if pager.num_pages() == 0 => HashTable::create(pager, &config)?,
            None => {
                return Err(Error::CorruptedMetadata(format!(
                    "{:?} has {} pages but no directory sidecar",
                    path,
                    pager.num_pages()
                )))
            }
        };

        debug!(path = ?path, global_depth = table.global_depth(), "hash index opened");
        Ok(Self { path, table })
    }

    /// Persist the directory, then flush and close the page file.
    ///
    /// # Errors
    /// `Error::PagesStillPinned` if a bucket is still pinned. The sidecar has
    /// been written by then, so a retry after releasing is safe.
    pub fn close(&self) -> Result<()> {
        self.table.meta().write(&self.meta_path())?;
        self.table.pager().close()?;
        debug!(path = ?self.path, "hash index closed");
        Ok(())
    }

    pub fn insert(&mut self, key: i64, value: i64) -> Result<()> {
        self.table.insert(key, value)
    }

    pub fn find(&self, key: i64) -> Result<Option<HashEntry>> {
        self.table.find(key)
    }

    pub fn select(&self) -> Result<Vec<HashEntry>> {
        self.table.select()
    }

    #[inline]
    pub fn table(&self) -> &HashTable {
        &self.table
    }

    #[inline]
    pub fn table_mut(&mut self) -> &mut HashTable {
        &mut self.table
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta_path(&self) -> PathBuf {
        meta_path(&self.path)
    }
}

impl Index for HashIndex {
    fn table(&self) -> &HashTable {
        &self.table
    }
}

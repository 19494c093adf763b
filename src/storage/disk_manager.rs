//! Disk Manager - low-level file I/O for pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Opening (or creating) the backing file and validating its length
//! - Reading and writing whole pages at their offsets

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::{Error, PageId, Result};

/// Manages disk I/O for a single page file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┘
/// Offset:  0   page_size  ...   N×page_size
/// ```
///
/// A file whose length is not a multiple of the page size is rejected at
/// open as corrupted.
///
/// # Thread Safety
/// `DiskManager` is single-threaded. The [`Pager`](crate::buffer::Pager)
/// serializes access to it under its state lock.
pub struct DiskManager {
    file: File,
    page_size: usize,
}

impl DiskManager {
    /// Open the page file at `path`, creating it (and its parent directories)
    /// if it does not exist.
    ///
    /// # Errors
    /// - `Error::Corrupted` if the existing file length is misaligned
    /// - I/O errors from directory creation or opening
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        if len % page_size as u64 != 0 {
            return Err(Error::Corrupted {
                path: path.to_path_buf(),
                len,
                page_size,
            });
        }

        Ok(Self {
            file,
            page_size,
        })
    }

    /// Number of whole pages currently in the file.
    pub fn page_count(&self) -> Result<u64> {
        Ok(self.file_len()? / self.page_size as u64)
    }

    /// Current length of the file in bytes.
    pub fn file_len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Read page `page_id` into `buf`.
    ///
    /// Pages that were allocated but never written (past the current end of
    /// file) read back as zeroes.
    pub fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        self.file
            .seek(SeekFrom::Start(page_id.offset(self.page_size)))?;

        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buf[filled..].fill(0);
        Ok(())
    }

    /// Write `buf` as page `page_id`, extending the file if needed.
    ///
    /// No fsync here; [`DiskManager::sync`] runs when the pager closes.
    pub fn write_page(&mut self, page_id: PageId, buf: &[u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        self.file
            .seek(SeekFrom::Start(page_id.offset(self.page_size)))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    /// Flush file contents and metadata to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

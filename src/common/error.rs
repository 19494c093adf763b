//! Error types for gracedb.

use std::path::PathBuf;

use thiserror::Error;

use crate::common::PageId;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors surfaced by the pager, the hash index and the join.
///
/// Nothing is logged and dropped: every variant is returned to the
/// immediate caller.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the backing file, passed through unchanged.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page number is past the end of the file.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// Every frame is pinned. The caller must release a page before retrying.
    #[error("no available pages")]
    RanOutOfPages,

    /// The backing file length is not a multiple of the page size.
    #[error("DB file has been corrupted: {path:?} is {len} bytes, not a multiple of {page_size}")]
    Corrupted {
        path: PathBuf,
        len: u64,
        page_size: usize,
    },

    /// A page was released more times than it was acquired.
    #[error("pin count for {0} would drop below zero")]
    PinCountUnderflow(PageId),

    /// `close` was called while references to pages were still held.
    #[error("pages are still pinned on close ({0} pinned)")]
    PagesStillPinned(usize),

    /// The pager has already been closed.
    #[error("pager is closed")]
    PagerClosed,

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The hash directory cannot double again.
    #[error("hash directory cannot grow past global depth {0}")]
    DirectoryTooDeep(u32),

    /// A hash index sidecar file or bucket page failed validation.
    #[error("corrupted index metadata: {0}")]
    CorruptedMetadata(String),

    /// A join was cancelled before it finished.
    #[error("join cancelled")]
    Cancelled,

    /// A join task panicked or was aborted.
    #[error("join task failed: {0}")]
    TaskFailed(String),

    /// A join was started outside a Tokio runtime.
    #[error("no Tokio runtime available to run the join")]
    NoRuntime,

    /// A named failpoint fired.
    #[error("failpoint triggered: {0}")]
    Failpoint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(PageId::new(42));
        assert_eq!(format!("{}", err), "Page(42) not found");

        assert_eq!(format!("{}", Error::RanOutOfPages), "no available pages");
        assert!(format!("{}", Error::PagesStillPinned(1)).starts_with("pages are still pinned on close"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_corrupted_mentions_path() {
        let err = Error::Corrupted {
            path: PathBuf::from("/tmp/x.db"),
            len: 100,
            page_size: 4096,
        };
        let msg = err.to_string();
        assert!(msg.contains("corrupted"));
        assert!(msg.contains("x.db"));
    }
}

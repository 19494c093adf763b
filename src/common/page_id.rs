//! Page identifier type.

use std::fmt;

/// Identifies a page in a pager's backing file.
///
/// Page `N` lives at byte offset `N × page_size`.
///
/// # Example
/// ```
/// use gracedb::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(page_id.0, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

impl PageId {
    /// The `NoPage` sentinel, carried by frames sitting on the free queue.
    pub const INVALID: PageId = PageId(u64::MAX);

    #[inline]
    pub fn new(id: u64) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Byte offset of this page in a file of `page_size` pages.
    #[inline]
    pub fn offset(&self, page_size: usize) -> u64 {
        self.0 * page_size as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(NONE)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_invalid() {
        assert!(!PageId::INVALID.is_valid());
        assert!(PageId::new(0).is_valid());
    }

    #[test]
    fn test_page_id_offset() {
        assert_eq!(PageId::new(0).offset(4096), 0);
        assert_eq!(PageId::new(3).offset(4096), 3 * 4096);
        assert_eq!(PageId::new(3).offset(128), 384);
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
        assert_eq!(format!("{}", PageId::INVALID), "Page(NONE)");
    }
}

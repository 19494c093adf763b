//! Frame identifier type.

use std::fmt;

/// Identifies a frame slot in a pager's arena.
///
/// Frame ids are stable for the pager's lifetime, which makes them usable as
/// handles into the free/unpinned/pinned queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_display() {
        assert_eq!(format!("{}", FrameId::new(42)), "Frame(42)");
        assert_ne!(FrameId::new(5), FrameId::new(6));
    }
}

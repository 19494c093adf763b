//! Free / unpinned / pinned frame queues.
//!
//! Each frame is a member of exactly one queue at a time. The queues are
//! intrusive doubly-linked lists threaded through a fixed arena of links
//! indexed by [`FrameId`], so a frame id doubles as a stable handle: pushing,
//! popping and unlinking from the middle are all O(1).
//!
//! Eviction takes the head of the unpinned queue and releases append to its
//! tail, which makes victim selection FIFO in unpin order.

use crate::common::FrameId;

/// Which queue a frame currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Frames with no page assigned.
    Free,
    /// Assigned frames with pin count 0, eligible for eviction.
    Unpinned,
    /// Assigned frames with pin count > 0.
    Pinned,
}

impl QueueKind {
    #[inline]
    fn slot(self) -> usize {
        match self {
            QueueKind::Free => 0,
            QueueKind::Unpinned => 1,
            QueueKind::Pinned => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<FrameId>,
    next: Option<FrameId>,
    queue: Option<QueueKind>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Ends {
    head: Option<FrameId>,
    tail: Option<FrameId>,
    len: usize,
}

/// The three membership queues of a pager.
#[derive(Debug)]
pub struct FrameQueues {
    links: Vec<Link>,
    ends: [Ends; 3],
}

impl FrameQueues {
    /// Create queues for `frame_count` frames, all on the free queue in
    /// ascending frame order.
    pub fn new(frame_count: usize) -> Self {
        let mut queues = Self {
            links: vec![Link::default(); frame_count],
            ends: [Ends::default(); 3],
        };
        for i in 0..frame_count {
            queues.push_tail(QueueKind::Free, FrameId::new(i));
        }
        queues
    }

    /// Queue `frame_id` is on, if any.
    #[inline]
    fn queue_of(&self, frame_id: FrameId) -> Option<QueueKind> {
        self.links[frame_id.0].queue
    }

    #[inline]
    pub fn len(&self, kind: QueueKind) -> usize {
        self.ends[kind.slot()].len
    }

    #[inline]
    pub fn is_empty(&self, kind: QueueKind) -> bool {
        self.len(kind) == 0
    }

    #[cfg(test)]
    fn peek_head(&self, kind: QueueKind) -> Option<FrameId> {
        self.ends[kind.slot()].head
    }

    /// Append a detached frame to the tail of `kind`.
    pub fn push_tail(&mut self, kind: QueueKind, frame_id: FrameId) {
        debug_assert!(self.queue_of(frame_id).is_none(), "{} already queued", frame_id);
        let ends = &mut self.ends[kind.slot()];
        let old_tail = ends.tail;

        self.links[frame_id.0] = Link {
            prev: old_tail,
            next: None,
            queue: Some(kind),
        };
        match old_tail {
            Some(t) => self.links[t.0].next = Some(frame_id),
            None => ends.head = Some(frame_id),
        }
        ends.tail = Some(frame_id);
        ends.len += 1;
    }

    /// Prepend a detached frame to the head of `kind`.
    pub fn push_head(&mut self, kind: QueueKind, frame_id: FrameId) {
        debug_assert!(self.queue_of(frame_id).is_none(), "{} already queued", frame_id);
        let ends = &mut self.ends[kind.slot()];
        let old_head = ends.head;

        self.links[frame_id.0] = Link {
            prev: None,
            next: old_head,
            queue: Some(kind),
        };
        match old_head {
            Some(h) => self.links[h.0].prev = Some(frame_id),
            None => ends.tail = Some(frame_id),
        }
        ends.head = Some(frame_id);
        ends.len += 1;
    }

    /// Detach and return the head of `kind`.
    pub fn pop_head(&mut self, kind: QueueKind) -> Option<FrameId> {
        let head = self.ends[kind.slot()].head?;
        self.unlink(head);
        Some(head)
    }

    /// Detach `frame_id` from whichever queue holds it. Returns that queue.
    pub fn unlink(&mut self, frame_id: FrameId) -> Option<QueueKind> {
        let link = self.links[frame_id.0];
        let kind = link.queue?;
        let ends = &mut self.ends[kind.slot()];

        match link.prev {
            Some(p) => self.links[p.0].next = link.next,
            None => ends.head = link.next,
        }
        match link.next {
            Some(n) => self.links[n.0].prev = link.prev,
            None => ends.tail = link.prev,
        }
        ends.len -= 1;
        self.links[frame_id.0] = Link::default();
        Some(kind)
    }

    /// Move `frame_id` to the tail of `kind`, wherever it currently is.
    pub fn move_to_tail(&mut self, kind: QueueKind, frame_id: FrameId) {
        self.unlink(frame_id);
        self.push_tail(kind, frame_id);
    }

    /// Frames of `kind` from head to tail.
    #[cfg(test)]
    fn iter(&self, kind: QueueKind) -> impl Iterator<Item = FrameId> + '_ {
        std::iter::successors(self.peek_head(kind), move |f| self.links[f.0].next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(queues: &FrameQueues, kind: QueueKind) -> Vec<usize> {
        queues.iter(kind).map(|f| f.0).collect()
    }

    #[test]
    fn test_new_puts_everything_on_free() {
        let q = FrameQueues::new(3);
        assert_eq!(ids(&q, QueueKind::Free), vec![0, 1, 2]);
        assert!(q.is_empty(QueueKind::Unpinned));
        assert!(q.is_empty(QueueKind::Pinned));
    }

    #[test]
    fn test_fifo_order() {
        let mut q = FrameQueues::new(3);
        while let Some(f) = q.pop_head(QueueKind::Free) {
            q.push_tail(QueueKind::Unpinned, f);
        }

        assert_eq!(q.pop_head(QueueKind::Unpinned), Some(FrameId::new(0)));
        assert_eq!(q.pop_head(QueueKind::Unpinned), Some(FrameId::new(1)));
        assert_eq!(q.pop_head(QueueKind::Unpinned), Some(FrameId::new(2)));
        assert_eq!(q.pop_head(QueueKind::Unpinned), None);
    }

    #[test]
    fn test_unlink_from_middle() {
        let mut q = FrameQueues::new(4);
        assert_eq!(q.unlink(FrameId::new(2)), Some(QueueKind::Free));
        assert_eq!(ids(&q, QueueKind::Free), vec![0, 1, 3]);
        assert_eq!(q.queue_of(FrameId::new(2)), None);
        assert_eq!(q.unlink(FrameId::new(2)), None);

        q.unlink(FrameId::new(0));
        q.unlink(FrameId::new(3));
        assert_eq!(ids(&q, QueueKind::Free), vec![1]);
        assert_eq!(q.len(QueueKind::Free), 1);
    }

    #[test]
    fn test_move_between_queues() {
        let mut q = FrameQueues::new(3);
        q.move_to_tail(QueueKind::Pinned, FrameId::new(1));
        q.move_to_tail(QueueKind::Pinned, FrameId::new(0));

        assert_eq!(ids(&q, QueueKind::Pinned), vec![1, 0]);
        assert_eq!(ids(&q, QueueKind::Free), vec![2]);
        assert_eq!(q.queue_of(FrameId::new(0)), Some(QueueKind::Pinned));

        q.move_to_tail(QueueKind::Unpinned, FrameId::new(1));
        assert_eq!(ids(&q, QueueKind::Pinned), vec![0]);
        assert_eq!(ids(&q, QueueKind::Unpinned), vec![1]);
    }

    #[test]
    fn test_push_head() {
        let mut q = FrameQueues::new(3);
        let f = q.pop_head(QueueKind::Free).unwrap();
        q.push_head(QueueKind::Free, f);
        assert_eq!(ids(&q, QueueKind::Free), vec![0, 1, 2]);

        let last = q.unlink(FrameId::new(2)).map(|_| FrameId::new(2)).unwrap();
        q.push_head(QueueKind::Free, last);
        assert_eq!(ids(&q, QueueKind::Free), vec![2, 0, 1]);
    }
}

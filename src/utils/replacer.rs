use std::collections::HashMap;

use log::debug;

pub type FrameId = usize;

pub trait Replacer {
    fn evict(&mut self) -> Option<FrameId>;
    fn record_access(&mut self, frame_id: FrameId);
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool);
    fn remove(&mut self, frame_id: FrameId);
    fn size(&self) -> usize;
}

/// Which of the two queues a node is linked into.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Pool {
    /// Frames with fewer than k recorded accesses. All of these share an
    /// infinite backward k-distance, so they are victimized first, oldest
    /// entry at the tail.
    History,
    /// Frames with k or more accesses, most recently accessed at the front.
    Buffer,
}

/// Per-frame bookkeeping. The queues are threaded through the nodes by
/// frame id instead of by pointer; `prev`/`next` are `None` at the queue
/// ends and for unlinked nodes.
struct LruKNode {
    accesses: usize,
    evictable: bool,
    prev: Option<FrameId>,
    next: Option<FrameId>,
}

impl LruKNode {
    fn new() -> Self {
        LruKNode {
            accesses: 1,
            evictable: false,
            prev: None,
            next: None,
        }
    }
}

#[derive(Default)]
struct Queue {
    head: Option<FrameId>,
    tail: Option<FrameId>,
    len: usize,
}

/// LRU-K replacement policy.
///
/// The victim is the evictable frame with the largest backward k-distance:
/// any frame still short of k accesses beats every frame with a full
/// history, and ties within a queue resolve to its tail. Only evictable
/// frames are queue members; a pinned frame keeps its node in the store but
/// sits in neither queue.
pub struct LruKReplacer {
    nodes: HashMap<FrameId, LruKNode>,
    history: Queue,
    buffer: Queue,
    capacity: usize,
    k: usize,
}

impl LruKReplacer {
    pub fn new(capacity: usize, k: usize) -> Self {
        assert!(k > 0, "k must be positive");
        LruKReplacer {
            nodes: HashMap::new(),
            history: Queue::default(),
            buffer: Queue::default(),
            capacity,
            k,
        }
    }

    fn queue(&self, pool: Pool) -> &Queue {
        match pool {
            Pool::History => &self.history,
            Pool::Buffer => &self.buffer,
        }
    }

    fn queue_mut(&mut self, pool: Pool) -> &mut Queue {
        match pool {
            Pool::History => &mut self.history,
            Pool::Buffer => &mut self.buffer,
        }
    }

    /// Queue a listed node belongs to, judged by its access count.
    fn pool_of(&self, frame_id: FrameId) -> Pool {
        if self.nodes[&frame_id].accesses >= self.k {
            Pool::Buffer
        } else {
            Pool::History
        }
    }

    fn push_front(&mut self, pool: Pool, frame_id: FrameId) {
        let old_head = self.queue(pool).head;
        {
            let node = self.nodes.get_mut(&frame_id).unwrap();
            node.prev = None;
            node.next = old_head;
        }
        if let Some(head) = old_head {
            self.nodes.get_mut(&head).unwrap().prev = Some(frame_id);
        }
        let queue = self.queue_mut(pool);
        queue.head = Some(frame_id);
        if queue.tail.is_none() {
            queue.tail = Some(frame_id);
        }
        queue.len += 1;
    }

    fn unlink(&mut self, pool: Pool, frame_id: FrameId) {
        let (prev, next) = {
            let node = &self.nodes[&frame_id];
            (node.prev, node.next)
        };
        match prev {
            Some(prev) => self.nodes.get_mut(&prev).unwrap().next = next,
            None => self.queue_mut(pool).head = next,
        }
        match next {
            Some(next) => self.nodes.get_mut(&next).unwrap().prev = prev,
            None => self.queue_mut(pool).tail = prev,
        }
        let node = self.nodes.get_mut(&frame_id).unwrap();
        node.prev = None;
        node.next = None;
        self.queue_mut(pool).len -= 1;
    }

    fn pop_tail(&mut self, pool: Pool) -> Option<FrameId> {
        let frame_id = self.queue(pool).tail?;
        self.unlink(pool, frame_id);
        Some(frame_id)
    }
}

impl Replacer for LruKReplacer {
    /// Pops the history tail if any frame is still short of k accesses,
    /// otherwise the buffer tail. The victim's access history is cleared
    /// but its node stays in the store for later re-use of the frame.
    fn evict(&mut self) -> Option<FrameId> {
        let frame_id = self
            .pop_tail(Pool::History)
            .or_else(|| self.pop_tail(Pool::Buffer))?;
        let node = self.nodes.get_mut(&frame_id).unwrap();
        node.evictable = false;
        node.accesses = 0;
        debug!("evicting frame {}", frame_id);
        Some(frame_id)
    }

    fn record_access(&mut self, frame_id: FrameId) {
        if !self.nodes.contains_key(&frame_id) {
            self.nodes.insert(frame_id, LruKNode::new());
            return;
        }

        let node = self.nodes.get_mut(&frame_id).unwrap();
        node.accesses += 1;
        let (accesses, evictable) = (node.accesses, node.evictable);
        if evictable && accesses >= self.k {
            // Crossing the k threshold graduates the frame out of the
            // history queue; at or past it, an access promotes to
            // most-recent.
            let from = if accesses == self.k {
                Pool::History
            } else {
                Pool::Buffer
            };
            self.unlink(from, frame_id);
            self.push_front(Pool::Buffer, frame_id);
        }
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let was_evictable = match self.nodes.get(&frame_id) {
            Some(node) => node.evictable,
            None => return,
        };

        if was_evictable && !evictable {
            let pool = self.pool_of(frame_id);
            self.unlink(pool, frame_id);
            let node = self.nodes.get_mut(&frame_id).unwrap();
            node.evictable = false;
            // Pinning clears the history; the next access opens a fresh
            // infinite-distance window.
            node.accesses = 0;
        } else if !was_evictable && evictable {
            while self.size() >= self.capacity {
                if self.evict().is_none() {
                    break;
                }
            }
            self.nodes.get_mut(&frame_id).unwrap().evictable = true;
            let pool = self.pool_of(frame_id);
            self.push_front(pool, frame_id);
        }
    }

    fn remove(&mut self, frame_id: FrameId) {
        let evictable = match self.nodes.get(&frame_id) {
            Some(node) => node.evictable,
            None => return,
        };
        assert!(evictable, "remove called on a pinned frame");
        let pool = self.pool_of(frame_id);
        self.unlink(pool, frame_id);
        self.nodes.remove(&frame_id);
    }

    /// Number of evictable frames.
    fn size(&self) -> usize {
        self.history.len + self.buffer.len
    }
}

#[cfg(test)]
mod test {
    use super::{LruKReplacer, Replacer};

    #[test]
    fn evict_order_follows_k_distance() {
        let mut replacer = LruKReplacer::new(7, 2);

        for frame in 1..=6 {
            replacer.record_access(frame);
        }
        for frame in 1..=6 {
            replacer.set_evictable(frame, true);
        }
        assert_eq!(6, replacer.size());

        // Frames 1..=4 reach two accesses, then 5 and 6, then 1 twice more.
        for frame in [1, 2, 3, 4, 5, 6, 1, 1] {
            replacer.record_access(frame);
        }

        // Everything has a full history now; the least recently accessed
        // full-history frame goes first.
        assert_eq!(Some(2), replacer.evict());
        assert_eq!(Some(3), replacer.evict());
        assert_eq!(Some(4), replacer.evict());
        assert_eq!(Some(5), replacer.evict());
        assert_eq!(Some(6), replacer.evict());
        assert_eq!(Some(1), replacer.evict());
        assert_eq!(None, replacer.evict());
        assert_eq!(0, replacer.size());
    }

    #[test]
    fn history_frames_go_first() {
        let mut replacer = LruKReplacer::new(8, 2);

        replacer.record_access(1);
        replacer.record_access(2);
        replacer.record_access(3);
        replacer.record_access(4);
        replacer.record_access(5);
        replacer.record_access(6);
        for frame in 1..=5 {
            replacer.set_evictable(frame, true);
        }
        assert_eq!(5, replacer.size());

        // Frame 1 graduates to the buffer queue.
        replacer.record_access(1);

        // The remaining single-access frames are all infinite-distance and
        // leave in the order they became evictable.
        assert_eq!(Some(2), replacer.evict());
        assert_eq!(Some(3), replacer.evict());
        assert_eq!(Some(4), replacer.evict());
        assert_eq!(2, replacer.size());

        replacer.record_access(3);
        replacer.record_access(4);
        replacer.record_access(5);
        replacer.record_access(4);
        replacer.set_evictable(3, true);
        replacer.set_evictable(4, true);
        assert_eq!(4, replacer.size());

        // 3 has a single access since its eviction, so it beats the
        // full-history frames.
        assert_eq!(Some(3), replacer.evict());
        assert_eq!(3, replacer.size());

        replacer.set_evictable(6, true);
        assert_eq!(4, replacer.size());
        assert_eq!(Some(6), replacer.evict());
        assert_eq!(3, replacer.size());

        // Pinning clears frame 1's history.
        replacer.set_evictable(1, false);
        assert_eq!(2, replacer.size());
        assert_eq!(Some(5), replacer.evict());
        assert_eq!(1, replacer.size());

        replacer.record_access(1);
        replacer.record_access(1);
        replacer.set_evictable(1, true);
        assert_eq!(2, replacer.size());

        assert_eq!(Some(4), replacer.evict());
        assert_eq!(Some(1), replacer.evict());
        assert_eq!(0, replacer.size());

        replacer.record_access(1);
        replacer.set_evictable(1, false);
        assert_eq!(0, replacer.size());
        assert_eq!(None, replacer.evict());

        replacer.set_evictable(1, true);
        assert_eq!(1, replacer.size());
        assert_eq!(Some(1), replacer.evict());
        assert_eq!(None, replacer.evict());
        assert_eq!(0, replacer.size());
    }

    #[test]
    fn only_evictable_frames_are_victims() {
        let mut replacer = LruKReplacer::new(4, 2);
        assert_eq!(None, replacer.evict());

        replacer.record_access(2);
        replacer.set_evictable(2, false);
        assert_eq!(None, replacer.evict());
        replacer.set_evictable(2, true);
        assert_eq!(Some(2), replacer.evict());
    }

    #[test]
    fn set_evictable_at_capacity_evicts() {
        let mut replacer = LruKReplacer::new(2, 2);

        replacer.record_access(1);
        replacer.record_access(2);
        replacer.record_access(3);
        replacer.set_evictable(1, true);
        replacer.set_evictable(2, true);
        assert_eq!(2, replacer.size());

        // Enabling a third evictable frame overflows the capacity, so the
        // oldest infinite-distance frame is evicted eagerly.
        replacer.set_evictable(3, true);
        assert_eq!(2, replacer.size());
        assert_eq!(Some(2), replacer.evict());
        assert_eq!(Some(3), replacer.evict());
    }

    #[test]
    fn remove_deletes_access_history() {
        let mut replacer = LruKReplacer::new(4, 2);

        replacer.record_access(1);
        replacer.record_access(1);
        replacer.record_access(2);
        replacer.set_evictable(1, true);
        replacer.set_evictable(2, true);
        assert_eq!(2, replacer.size());

        replacer.remove(1);
        assert_eq!(1, replacer.size());
        assert_eq!(Some(2), replacer.evict());
        assert_eq!(None, replacer.evict());

        // Removing an unknown frame is a no-op.
        replacer.remove(42);
        assert_eq!(0, replacer.size());
    }
}

use std::collections::{HashSet, VecDeque};

/// Bounded "recently seen" window guaranteeing at-most-once processing per
/// source message. Keys are `(chat_id, message_id)`; the owning task supplies
/// the task dimension of the dedup key by construction. Oldest keys are
/// evicted FIFO, so the capacity only needs to cover the transport's
/// plausible redelivery window.
pub struct DedupWindow {
    capacity: usize,
    seen: HashSet<(i64, i64)>,
    order: VecDeque<(i64, i64)>,
}

impl DedupWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Record a message key. Returns `false` if it was already seen.
    pub fn insert(&mut self, chat_id: i64, message_id: i64) -> bool {
        let key = (chat_id, message_id);
        if !self.seen.insert(key) {
            return false;
        }

        self.order.push_back(key);
        if self.order.len() > self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

//! FIFO of incoming delta events
//!
//! Decouples arrival (socket callback) from processing (the drain loop).
//! Events leave in exactly the order they arrived; there is no priority,
//! reordering or deduplication here. Stale and duplicate events are the
//! reconciler's business after dequeue.

use std::collections::VecDeque;

/// Unbounded FIFO of raw delta events.
#[derive(Debug, Clone)]
pub struct DeltaEventQueue<T> {
    events: VecDeque<T>,
}

impl<T> DeltaEventQueue<T> {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }

    /// Append an event at the tail
    pub fn enqueue(&mut self, event: T) {
        self.events.push_back(event);
    }

    /// Remove the head event, `None` when empty
    pub fn dequeue(&mut self) -> Option<T> {
        self.events.pop_front()
    }

    /// Put previously taken events back at the head, keeping their order.
    ///
    /// Only used when held events are reinstated after a resync; the first
    /// item of `events` becomes the new head.
    pub fn requeue_front(&mut self, events: impl IntoIterator<Item = T>) {
        let events: Vec<T> = events.into_iter().collect();
        for event in events.into_iter().rev() {
            self.events.push_front(event);
        }
    }

    pub fn peek(&self) -> Option<&T> {
        self.events.front()
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop everything queued
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Head to tail
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.events.iter()
    }
}

impl<T> Default for DeltaEventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = DeltaEventQueue::new();
        let max_events = 30;

        for i in 1..=max_events {
            queue.enqueue(i);
        }

        let mut output = Vec::new();
        while let Some(event) = queue.dequeue() {
            output.push(event);
        }

        assert_eq!(output, (1..=max_events).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dequeue_empty() {
        let mut queue: DeltaEventQueue<u32> = DeltaEventQueue::new();
        assert_eq!(queue.dequeue(), None);
        assert_eq!(queue.peek(), None);
    }

    #[test]
    fn test_interleaved_enqueue_dequeue() {
        let mut queue = DeltaEventQueue::new();
        queue.enqueue("a");
        queue.enqueue("b");
        assert_eq!(queue.dequeue(), Some("a"));
        queue.enqueue("c");
        assert_eq!(queue.dequeue(), Some("b"));
        assert_eq!(queue.dequeue(), Some("c"));
    }

    #[test]
    fn test_requeue_front_preserves_order() {
        let mut queue = DeltaEventQueue::new();
        queue.enqueue(3);
        queue.enqueue(4);

        queue.requeue_front(vec![1, 2]);

        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut queue = DeltaEventQueue::new();
        queue.enqueue(7);
        queue.enqueue(7);
        assert_eq!(queue.len(), 2);

        queue.clear();
        assert!(queue.is_empty());
    }
}

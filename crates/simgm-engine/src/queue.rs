//! Bounded FIFO message queue with monotonic sequence numbers.
//!
//! [`MessageQueue`] buffers messages between `send_message` and the next
//! step. Each accepted message gets an arrival sequence number from a
//! counter that persists across batches, so ordering within and across
//! ticks is fully determined by send order.
//!
//! A step takes the whole queue with [`take_batch`](MessageQueue::take_batch)
//! before dispatching anything. Messages sent while that batch is being
//! dispatched land in the emptied queue and are only seen by the next step.

use std::collections::VecDeque;

use simgm_core::Message;

/// A message together with its arrival sequence number.
#[derive(Debug)]
pub struct QueuedMessage {
    /// Arrival sequence number, unique for the lifetime of the queue.
    pub seq: u64,
    /// The queued message.
    pub message: Message,
}

/// The queue is at capacity; the message was not accepted.
#[derive(Debug)]
pub struct QueueFull(pub Message);

/// Bounded FIFO queue of outbound messages.
pub struct MessageQueue {
    queue: VecDeque<QueuedMessage>,
    capacity: usize,
    next_seq: u64,
    rejected: u64,
}

impl MessageQueue {
    /// Create a new queue with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "MessageQueue capacity must be at least 1");
        Self {
            queue: VecDeque::new(),
            capacity,
            next_seq: 0,
            rejected: 0,
        }
    }

    /// Append a message. Returns its arrival sequence number.
    ///
    /// # Errors
    ///
    /// Hands the message back in [`QueueFull`] when the queue is at
    /// capacity.
    pub fn push(&mut self, message: Message) -> Result<u64, QueueFull> {
        if self.queue.len() >= self.capacity {
            self.rejected += 1;
            return Err(QueueFull(message));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push_back(QueuedMessage { seq, message });
        Ok(seq)
    }

    /// Remove and return every queued message in arrival order.
    pub fn take_batch(&mut self) -> Vec<QueuedMessage> {
        self.queue.drain(..).collect()
    }

    /// Put undelivered messages back at the head of the queue, ahead of
    /// anything queued since they were taken. Sequence numbers are kept,
    /// and the capacity check is skipped because these were already
    /// accepted once.
    pub fn requeue_front(&mut self, messages: Vec<QueuedMessage>) {
        for m in messages.into_iter().rev() {
            self.queue.push_front(m);
        }
    }

    /// Number of messages currently buffered.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Maximum number of messages this queue can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cumulative number of messages refused because the queue was full.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Discard all pending messages.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simgm_core::builtin::{register_builtins, INFO_GAME_EVENT};
    use simgm_core::{MachineId, MachineInfo, MessageFactory};

    fn factory() -> MessageFactory {
        let mut f = MessageFactory::new(MachineInfo::new(MachineId(1), "test"));
        register_builtins(&mut f).unwrap();
        f
    }

    fn event(f: &MessageFactory, name: &str) -> Message {
        let mut m = f.create(INFO_GAME_EVENT).unwrap();
        m.set("EventName", name).unwrap();
        m
    }

    fn names(batch: &[QueuedMessage]) -> Vec<String> {
        batch
            .iter()
            .map(|q| q.message.get("EventName").unwrap().to_string())
            .collect()
    }

    // ── push tests ──────────────────────────────────────────────

    #[test]
    fn push_assigns_monotonic_seq() {
        let f = factory();
        let mut q = MessageQueue::new(10);
        assert_eq!(q.push(event(&f, "a")).unwrap(), 0);
        assert_eq!(q.push(event(&f, "b")).unwrap(), 1);
        q.take_batch();
        assert_eq!(q.push(event(&f, "c")).unwrap(), 2);
    }

    #[test]
    fn push_rejects_when_full() {
        let f = factory();
        let mut q = MessageQueue::new(2);
        q.push(event(&f, "a")).unwrap();
        q.push(event(&f, "b")).unwrap();
        let QueueFull(back) = q.push(event(&f, "c")).unwrap_err();
        assert_eq!(back.get("EventName").and_then(|v| v.as_str()), Some("c"));
        assert_eq!(q.len(), 2);
        assert_eq!(q.rejected(), 1);
    }

    // ── take_batch tests ────────────────────────────────────────

    #[test]
    fn take_batch_is_fifo_and_empties() {
        let f = factory();
        let mut q = MessageQueue::new(10);
        for n in ["a", "b", "c"] {
            q.push(event(&f, n)).unwrap();
        }
        let batch = q.take_batch();
        assert_eq!(names(&batch), ["a", "b", "c"]);
        assert!(q.is_empty());
    }

    #[test]
    fn requeue_front_preserves_order_ahead_of_new_messages() {
        let f = factory();
        let mut q = MessageQueue::new(10);
        for n in ["a", "b", "c"] {
            q.push(event(&f, n)).unwrap();
        }
        let mut batch = q.take_batch();
        let rest = batch.split_off(1);
        q.push(event(&f, "d")).unwrap();
        q.requeue_front(rest);
        assert_eq!(names(&q.take_batch()), ["b", "c", "d"]);
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn zero_capacity_panics() {
        MessageQueue::new(0);
    }

    // ── property tests ──────────────────────────────────────────

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn batches_preserve_send_order(sizes in prop::collection::vec(0usize..8, 1..6)) {
                let f = factory();
                let mut q = MessageQueue::new(1024);
                let mut expected = 0u64;
                for n in sizes {
                    for i in 0..n {
                        q.push(event(&f, &i.to_string())).unwrap();
                    }
                    let batch = q.take_batch();
                    prop_assert_eq!(batch.len(), n);
                    for queued in batch {
                        prop_assert_eq!(queued.seq, expected);
                        expected += 1;
                    }
                }
            }

            #[test]
            fn never_exceeds_capacity(cap in 1usize..16, pushes in 0usize..40) {
                let f = factory();
                let mut q = MessageQueue::new(cap);
                let mut accepted = 0usize;
                for i in 0..pushes {
                    if q.push(event(&f, &i.to_string())).is_ok() {
                        accepted += 1;
                    }
                }
                prop_assert_eq!(accepted, pushes.min(cap));
                prop_assert!(q.len() <= cap);
                prop_assert_eq!(q.rejected() as usize, pushes - accepted);
            }
        }
    }
}

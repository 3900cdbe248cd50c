//! # Queue Engine
//!
//! Doubly-linked list primitives over records held in a [`RecordPool`].
//!
//! New records enter at the list head. The list tail is the logical front
//! of the queue: dequeue takes the tail, and the pending sort keeps the most
//! urgent record nearest the tail.
//!
//! ```text
//!   head (logical back)                          tail (logical front)
//!   [pri 100] ⇄ [pri 70] ⇄ [pri 50] ⇄ [pri 50*]  ──dequeue_front──→
//!                                      * earlier arrival among equals
//! ```
//!
//! | Operation | Cost |
//! |-----------|------|
//! | `add_front`, `remove`, `insert_before`, `insert_at_tail`, `dequeue_front` | O(1) |
//! | `resort_pending`, `find` | O(n) |

use super::entities::TransactionRecord;
use super::errors::SchedulerError;
use super::pool::{RecordId, RecordPool};

/// Queue header: head, tail and entry count.
///
/// `head` and `tail` are `None` exactly when `len` is zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Queue {
    head: Option<RecordId>,
    tail: Option<RecordId>,
    len: usize,
}

fn stale(id: RecordId) -> SchedulerError {
    SchedulerError::InvalidArgument(format!("record {id:?} is not live"))
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Newest end of the list.
    pub fn head(&self) -> Option<RecordId> {
        self.head
    }

    /// Logical front: the next record to be dequeued.
    pub fn tail(&self) -> Option<RecordId> {
        self.tail
    }

    /// Inserts at the list head, the logical back of the queue.
    pub fn add_front(&mut self, pool: &mut RecordPool, id: RecordId) -> Result<(), SchedulerError> {
        let old_head = self.head;
        let node = pool.node_mut(id).ok_or_else(|| stale(id))?;
        node.prev = None;
        node.next = old_head;

        match old_head {
            Some(head) => {
                if let Some(head_node) = pool.node_mut(head) {
                    head_node.prev = Some(id);
                }
            }
            None => self.tail = Some(id),
        }

        self.head = Some(id);
        self.len += 1;
        Ok(())
    }

    /// Unlinks `id` from wherever it sits and clears its links.
    ///
    /// `id` must be a member of this queue.
    pub fn remove(&mut self, pool: &mut RecordPool, id: RecordId) -> Result<(), SchedulerError> {
        let (prev, next) = {
            let node = pool.node(id).ok_or_else(|| stale(id))?;
            (node.prev, node.next)
        };

        match (prev, next) {
            (None, None) => {
                if self.head != Some(id) {
                    return Err(SchedulerError::InvalidArgument(format!(
                        "record {id:?} is not queued here"
                    )));
                }
                self.head = None;
                self.tail = None;
            }
            (None, Some(next)) => {
                if self.head != Some(id) {
                    return Err(SchedulerError::InvalidArgument(format!(
                        "record {id:?} is not queued here"
                    )));
                }
                self.head = Some(next);
                if let Some(node) = pool.node_mut(next) {
                    node.prev = None;
                }
            }
            (Some(prev), None) => {
                if self.tail != Some(id) {
                    return Err(SchedulerError::InvalidArgument(format!(
                        "record {id:?} is not queued here"
                    )));
                }
                self.tail = Some(prev);
                if let Some(node) = pool.node_mut(prev) {
                    node.next = None;
                }
            }
            (Some(prev), Some(next)) => {
                if let Some(node) = pool.node_mut(prev) {
                    node.next = Some(next);
                }
                if let Some(node) = pool.node_mut(next) {
                    node.prev = Some(prev);
                }
            }
        }

        if let Some(node) = pool.node_mut(id) {
            node.prev = None;
            node.next = None;
        }
        self.len = self.len.saturating_sub(1);
        Ok(())
    }

    /// Splices `new` in immediately ahead of `existing`, on its head side.
    ///
    /// `existing` must be a member of this queue.
    pub fn insert_before(
        &mut self,
        pool: &mut RecordPool,
        new: RecordId,
        existing: RecordId,
    ) -> Result<(), SchedulerError> {
        let existing_prev = pool.node(existing).ok_or_else(|| stale(existing))?.prev;
        if !pool.contains(new) {
            return Err(stale(new));
        }

        if let Some(node) = pool.node_mut(new) {
            node.prev = existing_prev;
            node.next = Some(existing);
        }
        match existing_prev {
            Some(prev) => {
                if let Some(node) = pool.node_mut(prev) {
                    node.next = Some(new);
                }
            }
            None => self.head = Some(new),
        }
        if let Some(node) = pool.node_mut(existing) {
            node.prev = Some(new);
        }

        self.len += 1;
        Ok(())
    }

    /// Attaches at the list tail, the logical front of the queue.
    pub fn insert_at_tail(&mut self, pool: &mut RecordPool, id: RecordId) -> Result<(), SchedulerError> {
        let old_tail = self.tail;
        let node = pool.node_mut(id).ok_or_else(|| stale(id))?;
        node.next = None;
        node.prev = old_tail;

        match old_tail {
            Some(tail) => {
                if let Some(tail_node) = pool.node_mut(tail) {
                    tail_node.next = Some(id);
                }
            }
            None => self.head = Some(id),
        }

        self.tail = Some(id);
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the logical front (the list tail).
    pub fn dequeue_front(&mut self, pool: &mut RecordPool) -> Option<RecordId> {
        let tail = self.tail?;
        self.remove(pool, tail).ok()?;
        Some(tail)
    }

    /// Moves a record just added at the head to its priority position.
    ///
    /// Lower priority numbers end up nearer the tail. Among equal
    /// priorities the earlier arrival stays nearer the tail.
    pub fn resort_pending(&mut self, pool: &mut RecordPool, new: RecordId) -> Result<(), SchedulerError> {
        let (priority, next) = {
            let node = pool.node(new).ok_or_else(|| stale(new))?;
            (node.record.priority, node.next)
        };

        let Some(next) = next else {
            return Ok(());
        };
        let next_priority = pool.get(next).ok_or_else(|| stale(next))?.priority;
        if priority >= next_priority {
            return Ok(());
        }

        let mut step = pool.node(next).and_then(|node| node.next);
        self.remove(pool, new)?;

        while let Some(current) = step {
            let node = pool.node(current).ok_or_else(|| stale(current))?;
            if priority >= node.record.priority {
                return self.insert_before(pool, new, current);
            }
            step = node.next;
        }

        self.insert_at_tail(pool, new)
    }

    /// Walks from the logical front (tail) toward the head.
    pub fn iter_front_to_back<'a>(&self, pool: &'a RecordPool) -> QueueIter<'a> {
        QueueIter {
            pool,
            cursor: self.tail,
            toward_head: true,
        }
    }

    /// Walks from the head toward the logical front.
    pub fn iter_back_to_front<'a>(&self, pool: &'a RecordPool) -> QueueIter<'a> {
        QueueIter {
            pool,
            cursor: self.head,
            toward_head: false,
        }
    }

    /// First record, scanning from the logical front, matching `predicate`.
    pub fn find<P>(&self, pool: &RecordPool, mut predicate: P) -> Option<RecordId>
    where
        P: FnMut(&TransactionRecord) -> bool,
    {
        self.iter_front_to_back(pool)
            .find(|(_, record)| predicate(record))
            .map(|(id, _)| id)
    }
}

/// Iterator over `(id, record)` pairs of one queue.
pub struct QueueIter<'a> {
    pool: &'a RecordPool,
    cursor: Option<RecordId>,
    toward_head: bool,
}

impl<'a> Iterator for QueueIter<'a> {
    type Item = (RecordId, &'a TransactionRecord);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = self.pool.node(id)?;
        self.cursor = if self.toward_head { node.prev } else { node.next };
        Some((id, &node.record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{PlaybackRequest, Preserve, RecordSource, TransferClass};
    use crate::domain::value_objects::EntityId;
    use proptest::prelude::*;

    fn create_test_record(name: &str, priority: u8) -> TransactionRecord {
        let request = PlaybackRequest {
            channel: 0,
            class: TransferClass::Unacknowledged,
            priority,
            preserve: Preserve::Keep,
            peer_entity: "0.23".into(),
            source_file: name.into(),
            dest_file: name.into(),
        };
        TransactionRecord::outgoing(
            &request,
            EntityId::new(0, 23),
            EntityId::new(0, 24),
            RecordSource::CommandedFile,
        )
    }

    fn enqueue_sorted(queue: &mut Queue, pool: &mut RecordPool, name: &str, priority: u8) -> RecordId {
        let id = pool.allocate(create_test_record(name, priority)).unwrap();
        queue.add_front(pool, id).unwrap();
        queue.resort_pending(pool, id).unwrap();
        id
    }

    fn names_front_to_back(queue: &Queue, pool: &RecordPool) -> Vec<String> {
        queue
            .iter_front_to_back(pool)
            .map(|(_, r)| r.source_file.clone())
            .collect()
    }

    fn assert_integrity(queue: &Queue, pool: &RecordPool) {
        let forward: Vec<_> = queue.iter_back_to_front(pool).map(|(id, _)| id).collect();
        let mut backward: Vec<_> = queue.iter_front_to_back(pool).map(|(id, _)| id).collect();
        backward.reverse();

        assert_eq!(forward.len(), queue.len());
        assert_eq!(forward, backward);
        assert_eq!(queue.head().is_none(), queue.is_empty());
        assert_eq!(queue.tail().is_none(), queue.is_empty());
    }

    #[test]
    fn test_add_front_and_dequeue_order() {
        let mut pool = RecordPool::new(8);
        let mut queue = Queue::new();
        for name in ["/a", "/b", "/c"] {
            let id = pool.allocate(create_test_record(name, 0)).unwrap();
            queue.add_front(&mut pool, id).unwrap();
        }

        let first = queue.dequeue_front(&mut pool).unwrap();
        assert_eq!(pool.get(first).unwrap().source_file, "/a");
        assert_eq!(names_front_to_back(&queue, &pool), vec!["/b", "/c"]);
        assert_integrity(&queue, &pool);
    }

    #[test]
    fn test_dequeue_empty_returns_none() {
        let mut pool = RecordPool::new(1);
        let mut queue = Queue::new();
        assert!(queue.dequeue_front(&mut pool).is_none());
    }

    #[test]
    fn test_remove_all_positions() {
        let mut pool = RecordPool::new(8);
        let mut queue = Queue::new();
        let ids: Vec<_> = ["/a", "/b", "/c", "/d"]
            .iter()
            .map(|name| {
                let id = pool.allocate(create_test_record(name, 0)).unwrap();
                queue.add_front(&mut pool, id).unwrap();
                id
            })
            .collect();

        // middle, tail, head, only
        queue.remove(&mut pool, ids[1]).unwrap();
        assert_integrity(&queue, &pool);
        queue.remove(&mut pool, ids[0]).unwrap();
        assert_integrity(&queue, &pool);
        queue.remove(&mut pool, ids[3]).unwrap();
        assert_integrity(&queue, &pool);
        queue.remove(&mut pool, ids[2]).unwrap();
        assert_integrity(&queue, &pool);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_non_member_rejected() {
        let mut pool = RecordPool::new(4);
        let mut queue = Queue::new();
        let other = Queue::new();
        let member = pool.allocate(create_test_record("/a", 0)).unwrap();
        let loose = pool.allocate(create_test_record("/b", 0)).unwrap();
        queue.add_front(&mut pool, member).unwrap();

        assert!(queue.remove(&mut pool, loose).is_err());
        assert_eq!(queue.len(), 1);
        assert!(other.is_empty());
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut pool = RecordPool::new(2);
        let mut queue = Queue::new();
        let id = pool.allocate(create_test_record("/a", 0)).unwrap();
        pool.release(id).unwrap();

        assert!(matches!(
            queue.add_front(&mut pool, id),
            Err(SchedulerError::InvalidArgument(_))
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_priority_scenario_100_70_50() {
        let mut pool = RecordPool::new(8);
        let mut queue = Queue::new();
        enqueue_sorted(&mut queue, &mut pool, "/p100", 100);
        enqueue_sorted(&mut queue, &mut pool, "/p70", 70);
        enqueue_sorted(&mut queue, &mut pool, "/p50", 50);

        assert_eq!(names_front_to_back(&queue, &pool), vec!["/p50", "/p70", "/p100"]);
    }

    #[test]
    fn test_equal_priorities_keep_arrival_order() {
        let mut pool = RecordPool::new(8);
        let mut queue = Queue::new();
        enqueue_sorted(&mut queue, &mut pool, "/x1", 10);
        enqueue_sorted(&mut queue, &mut pool, "/y", 20);
        enqueue_sorted(&mut queue, &mut pool, "/x2", 10);
        enqueue_sorted(&mut queue, &mut pool, "/z", 5);

        assert_eq!(names_front_to_back(&queue, &pool), vec!["/z", "/x1", "/x2", "/y"]);
        assert_integrity(&queue, &pool);
    }

    #[test]
    fn test_round_trip_returns_same_record() {
        let mut pool = RecordPool::new(2);
        let mut queue = Queue::new();
        let id = enqueue_sorted(&mut queue, &mut pool, "/only", 9);

        let out = queue.dequeue_front(&mut pool).unwrap();
        assert_eq!(out, id);
        let record = pool.get(out).unwrap();
        assert_eq!(record.priority, 9);
        assert_eq!(record.source_file, "/only");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8),
        RemoveAt(usize),
        Dequeue,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(Op::Add),
            (0usize..16).prop_map(Op::RemoveAt),
            Just(Op::Dequeue),
        ]
    }

    proptest! {
        #[test]
        fn prop_queue_integrity(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let mut pool = RecordPool::new(64);
            let mut queue = Queue::new();

            for (n, op) in ops.into_iter().enumerate() {
                match op {
                    Op::Add(priority) => {
                        let id = pool.allocate(create_test_record(&format!("/{n}"), priority)).unwrap();
                        queue.add_front(&mut pool, id).unwrap();
                    }
                    Op::RemoveAt(pos) => {
                        let target = queue.iter_back_to_front(&pool).map(|(id, _)| id).nth(pos);
                        if let Some(id) = target {
                            queue.remove(&mut pool, id).unwrap();
                            pool.release(id).unwrap();
                        }
                    }
                    Op::Dequeue => {
                        if let Some(id) = queue.dequeue_front(&mut pool) {
                            pool.release(id).unwrap();
                        }
                    }
                }
                assert_integrity(&queue, &pool);
                prop_assert_eq!(pool.live(), queue.len());
            }
        }

        #[test]
        fn prop_pending_sorted_and_stable(priorities in proptest::collection::vec(0u8..8, 0..40)) {
            let mut pool = RecordPool::new(64);
            let mut queue = Queue::new();
            for (seq, priority) in priorities.iter().enumerate() {
                enqueue_sorted(&mut queue, &mut pool, &format!("/{seq}"), *priority);
            }

            let order: Vec<(u8, usize)> = queue
                .iter_front_to_back(&pool)
                .map(|(_, r)| (r.priority, r.source_file[1..].parse::<usize>().unwrap()))
                .collect();

            prop_assert_eq!(order.len(), priorities.len());
            for pair in order.windows(2) {
                prop_assert!(pair[0].0 <= pair[1].0);
                if pair[0].0 == pair[1].0 {
                    prop_assert!(pair[0].1 < pair[1].1);
                }
            }
        }
    }
}

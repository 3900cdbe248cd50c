//! # Record Pool
//!
//! Fixed-capacity arena that hands out and reclaims transaction records.
//!
//! ## Data Structures
//!
//! - `slots`: backing arena, one slot per record block ever handed out
//! - `free`: indices of released slots, reused before the arena grows
//! - `RecordId`: index plus generation, so a released handle cannot reach
//!   the block's next occupant
//!
//! Link pointers for the queue engine live in the slot, next to the record.

use super::entities::{TransactionRecord, RECORD_BYTES};
use super::errors::SchedulerError;
use serde::Serialize;

/// Handle to a record owned by the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordId {
    index: u32,
    generation: u32,
}

/// Allocation telemetry. Reported only, never used for control decisions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub mem_in_use: usize,
    pub peak_mem_in_use: usize,
    pub nodes_allocated: u64,
    pub nodes_deallocated: u64,
}

#[derive(Debug)]
pub(super) struct Node {
    pub(super) record: TransactionRecord,
    pub(super) prev: Option<RecordId>,
    pub(super) next: Option<RecordId>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug)]
pub struct RecordPool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    capacity: usize,
    live: usize,
    stats: PoolStats,
}

impl RecordPool {
    /// Creates an empty pool holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            capacity,
            live: 0,
            stats: PoolStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records currently allocated.
    pub fn live(&self) -> usize {
        self.live
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Moves `record` into a free block.
    ///
    /// # Errors
    /// - `PoolExhausted` if every block is in use
    pub fn allocate(&mut self, record: TransactionRecord) -> Result<RecordId, SchedulerError> {
        if self.live >= self.capacity {
            return Err(SchedulerError::PoolExhausted {
                capacity: self.capacity,
            });
        }

        let node = Node {
            record,
            prev: None,
            next: None,
        };

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                RecordId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len()).map_err(|_| {
                    SchedulerError::PoolExhausted {
                        capacity: self.capacity,
                    }
                })?;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                RecordId {
                    index,
                    generation: 0,
                }
            }
        };

        self.live += 1;
        self.stats.nodes_allocated += 1;
        self.stats.mem_in_use += RECORD_BYTES;
        self.stats.peak_mem_in_use = self.stats.peak_mem_in_use.max(self.stats.mem_in_use);

        Ok(id)
    }

    /// Returns a block to the pool and hands back its record.
    ///
    /// The record must already be unlinked from its queue.
    ///
    /// # Errors
    /// - `InvalidArgument` if `id` is stale or was never issued by this pool
    pub fn release(&mut self, id: RecordId) -> Result<TransactionRecord, SchedulerError> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.node.is_some())
            .ok_or_else(|| SchedulerError::InvalidArgument(format!("release of {id:?}")))?;

        let node = slot
            .node
            .take()
            .ok_or_else(|| SchedulerError::InvalidArgument(format!("release of {id:?}")))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        self.live -= 1;
        self.stats.nodes_deallocated += 1;
        self.stats.mem_in_use = self.stats.mem_in_use.saturating_sub(RECORD_BYTES);

        Ok(node.record)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.node(id).is_some()
    }

    pub fn get(&self, id: RecordId) -> Option<&TransactionRecord> {
        self.node(id).map(|node| &node.record)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut TransactionRecord> {
        self.node_mut(id).map(|node| &mut node.record)
    }

    pub(super) fn node(&self, id: RecordId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub(super) fn node_mut(&mut self, id: RecordId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }
}

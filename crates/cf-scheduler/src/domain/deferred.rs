//! Deferred suspends for the auto-suspend policy.
//!
//! Indication handling must not call back into the engine, so suspends
//! requested while an indication is processed wait here until the engine
//! call that produced them has returned.

/// Fixed-capacity buffer of transaction numbers awaiting suspension.
#[derive(Debug, Clone)]
pub struct DeferredSuspends {
    capacity: usize,
    pending: Vec<u32>,
    low_free_mark: usize,
}

impl DeferredSuspends {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pending: Vec::with_capacity(capacity),
            low_free_mark: capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Fewest free slots ever observed.
    pub fn low_free_mark(&self) -> usize {
        self.low_free_mark
    }

    /// Queues `trans_num`. Returns it back when the buffer is full.
    pub fn push(&mut self, trans_num: u32) -> Result<(), u32> {
        if self.pending.len() >= self.capacity {
            return Err(trans_num);
        }
        self.pending.push(trans_num);
        self.low_free_mark = self.low_free_mark.min(self.capacity - self.pending.len());
        Ok(())
    }

    /// Takes every queued transaction number in arrival order.
    pub fn drain(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.pending)
    }
}

//! Semaphore-backed handshake token.
//!
//! The scheduler polls with `try_take` before each PDU. The downstream
//! consumer returns a permit each time it drains one PDU.

use crate::ports::outbound::HandshakeToken;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct SemaphoreToken {
    semaphore: Arc<Semaphore>,
}

impl SemaphoreToken {
    pub fn new(permits: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Shared handle for the consumer side.
    pub fn semaphore(&self) -> Arc<Semaphore> {
        Arc::clone(&self.semaphore)
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl HandshakeToken for SemaphoreToken {
    fn try_take(&self) -> bool {
        match self.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    fn give(&self) {
        self.semaphore.add_permits(1);
    }
}

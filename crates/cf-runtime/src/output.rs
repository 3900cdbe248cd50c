//! PDU sink and output flushing.

use crate::loopback::LoopbackEngine;
use cf_scheduler::{FileScheduler, FileStore, HandshakeToken, PduSink, SemaphoreToken, SinkError};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Sink that logs each PDU and drains it immediately.
///
/// A channel registered with [`TracingSink::with_token`] gets its permit
/// back as soon as the PDU is accepted, the way a downstream consumer
/// would after draining it.
#[derive(Debug, Default)]
pub struct TracingSink {
    tokens: HashMap<u8, SemaphoreToken>,
    pub pdus: u64,
    pub bytes: u64,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, channel: u8, token: SemaphoreToken) -> Self {
        self.tokens.insert(channel, token);
        self
    }
}

impl PduSink for TracingSink {
    fn send(&mut self, channel: u8, pdu: &[u8]) -> Result<(), SinkError> {
        if pdu.is_empty() {
            return Err(SinkError::Failed("empty PDU".into()));
        }
        self.pdus += 1;
        self.bytes += pdu.len() as u64;
        debug!(channel, kind = pdu[0], len = pdu.len(), "PDU out");

        if let Some(token) = self.tokens.get(&channel) {
            token.give();
        }
        Ok(())
    }
}

/// Drains the loopback outbox through the scheduler's output gate.
///
/// Stops at the first gated PDU, which stays at the head of the outbox.
/// Returns the number of PDUs sent.
pub fn flush_output<F, S>(scheduler: &mut FileScheduler<LoopbackEngine, F, S>) -> usize
where
    F: FileStore,
    S: PduSink,
{
    let mut sent = 0;
    while let Some(pdu) = scheduler.engine_mut().next_pdu() {
        if !scheduler.pdu_output_ready(&pdu.id) {
            trace!(trans = %pdu.id, "Output gated, holding PDU");
            scheduler.engine_mut().requeue_pdu(pdu);
            break;
        }
        // Failures are logged and counted by the scheduler; the PDU is dropped.
        if scheduler
            .pdu_output_send(&pdu.id, pdu.direction, &pdu.bytes)
            .is_ok()
        {
            sent += 1;
        }
    }
    sent
}

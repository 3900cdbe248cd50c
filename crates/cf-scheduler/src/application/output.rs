//! PDU output gating.
//!
//! Each channel may share a counting token with its downstream consumer.
//! The engine asks [`FileScheduler::pdu_output_ready`] before building a
//! PDU; a granted token is consumed and given back only if the send fails.
//! Channels without a token are never gated.

use super::scheduler::FileScheduler;
use crate::domain::{PduDirection, PlaybackQueue, SchedulerError, TransactionId, UplinkQueue};
use crate::ports::outbound::{FileStore, PduSink, TransferEngine};
use tracing::{error, trace};

impl<E, F, S> FileScheduler<E, F, S>
where
    E: TransferEngine,
    F: FileStore,
    S: PduSink,
{
    /// Output channel carrying PDUs for a playback transaction.
    fn playback_channel_of(&self, trans_num: u32) -> Option<u8> {
        self.find_playback_by_trans(PlaybackQueue::Active, trans_num)
            .or_else(|| self.find_playback_by_trans(PlaybackQueue::History, trans_num))
            .map(|(channel, _)| channel)
    }

    /// Output channel carrying response PDUs for an uplink transaction.
    fn uplink_channel_of(&self, id: &TransactionId) -> Option<u8> {
        self.find_uplink(UplinkQueue::Active, id)
            .or_else(|| self.find_uplink(UplinkQueue::History, id))
            .and_then(|rid| self.pool.get(rid))
            .map(|record| record.channel)
    }

    /// Whether the engine may emit a PDU for `id` now.
    ///
    /// Transactions the scheduler does not track are never gated.
    pub fn pdu_output_ready(&mut self, id: &TransactionId) -> bool {
        let channel = if id.source == self.flight {
            self.playback_channel_of(id.number)
        } else {
            self.uplink_channel_of(id)
        };
        let Some(ch) = channel.and_then(|c| self.channels.get_mut(usize::from(c))) else {
            return true;
        };

        let granted = ch.handshake.as_ref().map_or(true, |token| token.try_take());
        if granted {
            ch.counters.green_light += 1;
        } else {
            ch.counters.red_light += 1;
            trace!(channel = ch.index, trans = %id, "Output gated");
        }
        granted
    }

    /// Hands one encoded PDU to the downstream consumer.
    ///
    /// On failure the channel's token is given back.
    pub fn pdu_output_send(
        &mut self,
        id: &TransactionId,
        direction: PduDirection,
        pdu: &[u8],
    ) -> Result<(), SchedulerError> {
        let channel = match direction {
            PduDirection::TowardReceiver => self.playback_channel_of(id.number),
            PduDirection::TowardSender => self.uplink_channel_of(id),
        };
        let Some(channel) = channel else {
            error!(trans = %id, ?direction, "No output channel for PDU, dropped");
            return Err(SchedulerError::NotFound(id.to_string()));
        };

        match self.sink.send(channel, pdu) {
            Ok(()) => {
                if let Some(ch) = self.channels.get_mut(usize::from(channel)) {
                    ch.counters.pdus_sent += 1;
                }
                Ok(())
            }
            Err(e) => {
                if let Some(token) = self
                    .channels
                    .get(usize::from(channel))
                    .and_then(|ch| ch.handshake.as_ref())
                {
                    token.give();
                }
                error!(channel, trans = %id, error = %e, "PDU send failed");
                Err(e.into())
            }
        }
    }
}

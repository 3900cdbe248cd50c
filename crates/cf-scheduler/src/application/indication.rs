//! Engine indication handling.
//!
//! | Indication | Effect |
//! |------------|--------|
//! | MachineAllocated (sender) | pending → active, channel starts blasting |
//! | MachineAllocated (receiver) | new uplink active record |
//! | MetadataReceived | uplink record learns its file names |
//! | EofSent | blast ends, next file may start, optional auto-suspend |
//! | MachineDeallocated | active → history, counters, optional source delete |
//! | Abandoned | abandon counter |
//!
//! Everything else is logged only.

use super::scheduler::FileScheduler;
use crate::domain::{
    FinalStatus, Indication, IndicationKind, PlaybackQueue, Preserve, QueueRef, TransactionStatus,
};
use crate::ports::outbound::{FileStore, PduSink, TransferEngine};
use tracing::{debug, error, info, warn};

impl<E, F, S> FileScheduler<E, F, S>
where
    E: TransferEngine,
    F: FileStore,
    S: PduSink,
{
    pub(crate) fn handle_indication(&mut self, indication: Indication) {
        match indication.kind {
            IndicationKind::MachineAllocated => {
                if indication.role.is_receiver() {
                    self.track_incoming(&indication);
                } else {
                    self.activate_outgoing(&indication);
                }
            }
            IndicationKind::MetadataReceived => self.record_metadata(&indication),
            IndicationKind::EofSent => self.end_blast(&indication),
            IndicationKind::MachineDeallocated => self.finish_transaction(&indication),
            IndicationKind::Abandoned => {
                self.app.total_abandoned += 1;
                info!(trans = %indication.id, "Transaction abandoned");
            }
            IndicationKind::AckTimerExpired
            | IndicationKind::NakTimerExpired
            | IndicationKind::InactivityTimerExpired => {
                info!(trans = %indication.id, kind = ?indication.kind, "Transaction timer expired");
            }
            IndicationKind::Suspended => info!(trans = %indication.id, "Transaction suspended"),
            IndicationKind::Resumed => info!(trans = %indication.id, "Transaction resumed"),
            IndicationKind::Fault => warn!(
                trans = %indication.id,
                condition = indication.condition.as_str(),
                "Transaction fault"
            ),
            _ => debug!(trans = %indication.id, kind = ?indication.kind, "Indication"),
        }
    }

    /// The engine accepted our offer: the issued pending record goes active.
    fn activate_outgoing(&mut self, indication: &Indication) {
        let found = self.channels.iter().filter(|c| c.in_use).find_map(|ch| {
            ch.pending
                .find(&self.pool, |r| {
                    r.status == TransactionStatus::PutRequestIssued
                        && r.source_file == indication.source_file
                })
                .map(|id| (ch.index, id))
        });

        let Some((channel, id)) = found else {
            error!(
                trans = %indication.id,
                file = %indication.source_file,
                "No issued pending record for allocated transaction"
            );
            return;
        };

        if let Some(record) = self.pool.get_mut(id) {
            record.trans_num = indication.id.number;
            record.status = TransactionStatus::Active;
        }
        let moved = self.move_record(
            id,
            QueueRef::playback(channel, PlaybackQueue::Pending),
            QueueRef::playback(channel, PlaybackQueue::Active),
        );
        if let Err(e) = moved {
            error!(trans = %indication.id, error = %e, "Failed to activate record");
            return;
        }

        self.channels[usize::from(channel)].blasting = Some(indication.id.number);
        info!(
            channel,
            trans = %indication.id,
            file = %indication.source_file,
            "Outgoing transaction started"
        );
    }

    fn end_blast(&mut self, indication: &Indication) {
        let Some((channel, _)) =
            self.find_playback_by_trans(PlaybackQueue::Active, indication.id.number)
        else {
            error!(trans = %indication.id, "EOF sent for unknown transaction");
            return;
        };

        if self.auto_suspend {
            if let Err(trans_num) = self.deferred.push(indication.id.number) {
                error!(trans = trans_num, "Auto-suspend buffer full, suspend dropped");
            }
        }

        let ch = &mut self.channels[usize::from(channel)];
        ch.blasting = None;
        debug!(channel, trans = %indication.id, "File data sent");

        if ch.dequeue_enabled {
            if let Err(e) = self.start_next_file(channel) {
                error!(channel, error = %e, "Failed to start next file");
            }
        }
    }

    fn finish_transaction(&mut self, indication: &Indication) {
        let success = indication.final_status == FinalStatus::Successful;
        if !success {
            self.app.last_failed_trans = indication.id.to_string();
            if !self.faults.record(indication.condition) {
                error!(
                    trans = %indication.id,
                    condition = indication.condition.code(),
                    "Unexpected condition code"
                );
            }
        }

        if indication.role.is_receiver() {
            self.finish_incoming(indication, success);
        } else {
            self.finish_outgoing(indication, success);
        }
    }

    fn finish_outgoing(&mut self, indication: &Indication, success: bool) {
        let Some((channel, id)) =
            self.find_playback_by_trans(PlaybackQueue::Active, indication.id.number)
        else {
            error!(trans = %indication.id, "Deallocated transaction not on any active queue");
            return;
        };

        let Some(record) = self.pool.get_mut(id) else {
            return;
        };
        if success {
            record.status = TransactionStatus::Success;
        } else {
            record.status = indication.final_status.into();
            record.condition = indication.condition;
        }
        let preserve = record.preserve;
        let source_file = record.source_file.clone();

        if let Err(e) = self.retire(id, QueueRef::playback(channel, PlaybackQueue::Active)) {
            error!(trans = %indication.id, error = %e, "Failed to move record to history");
        }

        let ch = &mut self.channels[usize::from(channel)];
        ch.counters.files_sent += 1;

        if success {
            ch.counters.success += 1;
            info!(channel, trans = %indication.id, file = %source_file, "File sent");

            if preserve == Preserve::Delete {
                match self.files.remove_file(&source_file) {
                    Ok(()) => info!(file = %source_file, "Source file deleted"),
                    Err(e) => error!(file = %source_file, error = %e, "Source file delete failed"),
                }
            }
            return;
        }

        ch.counters.failed += 1;
        warn!(
            channel,
            trans = %indication.id,
            file = %source_file,
            status = ?indication.final_status,
            condition = indication.condition.as_str(),
            "File send failed"
        );

        if ch.blasting == Some(indication.id.number) {
            ch.blasting = None;
            if ch.dequeue_enabled {
                if let Err(e) = self.start_next_file(channel) {
                    error!(channel, error = %e, "Failed to start next file");
                }
            }
        }
    }
}

//! Uplink (incoming transfer) tracking.

use super::scheduler::FileScheduler;
use crate::domain::{
    Indication, QueueRef, TransactionRecord, TransactionStatus, TransferClass, UplinkQueue,
};
use crate::ports::outbound::{FileStore, PduSink, TransferEngine};
use tracing::{error, info, warn};

impl<E, F, S> FileScheduler<E, F, S>
where
    E: TransferEngine,
    F: FileStore,
    S: PduSink,
{
    /// A peer started sending to us.
    pub(crate) fn track_incoming(&mut self, indication: &Indication) {
        let class = indication
            .role
            .class()
            .unwrap_or(TransferClass::Unacknowledged);
        let record = TransactionRecord::incoming(
            indication.id,
            class,
            self.config.class2_response_channel,
            self.flight,
        );

        let id = match self.pool.allocate(record) {
            Ok(id) => id,
            Err(e) => {
                error!(trans = %indication.id, error = %e, "Uplink record allocation failed");
                return;
            }
        };
        if let Err(e) = self.uplink.active.add_front(&mut self.pool, id) {
            error!(trans = %indication.id, error = %e, "Failed to track uplink transaction");
            return;
        }

        info!(trans = %indication.id, class = class.number(), "Incoming transaction started");
    }

    pub(crate) fn record_metadata(&mut self, indication: &Indication) {
        self.uplink.counters.metadata_received += 1;

        let Some(id) = self.find_uplink(UplinkQueue::Active, &indication.id) else {
            error!(trans = %indication.id, "Metadata for unknown uplink transaction");
            return;
        };
        if let Some(record) = self.pool.get_mut(id) {
            record.source_file = indication.source_file.clone();
            record.dest_file = indication.dest_file.clone();
        }
        info!(
            trans = %indication.id,
            source = %indication.source_file,
            dest = %indication.dest_file,
            "Incoming file metadata received"
        );
    }

    pub(crate) fn finish_incoming(&mut self, indication: &Indication, success: bool) {
        let Some(id) = self.find_uplink(UplinkQueue::Active, &indication.id) else {
            error!(trans = %indication.id, "Deallocated uplink transaction not tracked");
            return;
        };

        let Some(record) = self.pool.get_mut(id) else {
            return;
        };
        if success {
            record.status = TransactionStatus::Success;
            if !indication.dest_file.is_empty() {
                record.dest_file = indication.dest_file.clone();
            }
            self.uplink.counters.success += 1;
            self.uplink.counters.last_file_uplinked = record.dest_file.clone();
            info!(trans = %indication.id, file = %record.dest_file, "File received");
        } else {
            record.status = indication.final_status.into();
            record.condition = indication.condition;
            self.uplink.counters.failed += 1;
            warn!(
                trans = %indication.id,
                status = ?indication.final_status,
                condition = indication.condition.as_str(),
                "File receive failed"
            );
        }

        if let Err(e) = self.retire(id, QueueRef::Uplink(UplinkQueue::Active)) {
            error!(trans = %indication.id, error = %e, "Failed to move uplink record to history");
        }
    }
}

//! Administrative command surface.

use super::scheduler::FileScheduler;
use crate::domain::{
    validate_file_path, write_snapshot, DirectiveVerb, DirectoryRequest, EngineDirective,
    Housekeeping, PlaybackQueue, PlaybackRequest, QueueRef, RecordId, RecordKey, RecordSource,
    SchedulerError, SnapshotEntry, SnapshotKind, TransactionId, TransactionRecord,
    TransactionTarget, UplinkQueue, DEFAULT_ACTIVE_FILE, DEFAULT_QUEUE_FILE,
};
use crate::ports::inbound::{
    ActiveFilter, HandshakeOp, PollSelector, QuickStatus, RecordLocation, SchedulerApi,
};
use crate::ports::outbound::{FileStore, PduSink, TransferEngine};
use tracing::{error, info, warn};

const PLAYBACK_SEARCH: [PlaybackQueue; 3] = [
    PlaybackQueue::Active,
    PlaybackQueue::Pending,
    PlaybackQueue::History,
];

impl<E, F, S> FileScheduler<E, F, S>
where
    E: TransferEngine,
    F: FileStore,
    S: PduSink,
{
    /// Bumps the command or error counter for `result`.
    fn tally<T>(
        &mut self,
        command: &'static str,
        result: Result<T, SchedulerError>,
    ) -> Result<T, SchedulerError> {
        match &result {
            Ok(_) | Err(SchedulerError::ConfirmationRequired(_)) => self.command_counter += 1,
            Err(e) => {
                self.error_counter += 1;
                warn!(command, error = %e, "Command rejected");
            }
        }
        result
    }

    fn locate(&self, key: &RecordKey) -> Option<RecordLocation> {
        match key {
            RecordKey::Name(name) => self.find_by_name(name),
            RecordKey::Id(id) => self.find_by_transaction_id(id),
        }
    }

    /// Transaction id of an in-progress transfer of `file`.
    fn active_transaction_for(&self, file: &str) -> Option<TransactionId> {
        let matches = |r: &TransactionRecord| r.source_file == file;
        let uplink = self
            .uplink
            .active
            .find(&self.pool, matches)
            .and_then(|id| self.pool.get(id));
        let playback = || {
            self.channels
                .iter()
                .filter(|c| c.in_use)
                .find_map(|ch| ch.active.find(&self.pool, matches))
                .and_then(|id| self.pool.get(id))
        };
        uplink.or_else(playback).map(TransactionRecord::transaction_id)
    }

    fn remove_record(&mut self, key: &str) -> Result<(), SchedulerError> {
        let key = RecordKey::parse(key)?;
        let location = self
            .locate(&key)
            .ok_or_else(|| SchedulerError::NotFound(format!("{key:?}")))?;

        if location.queue.is_active() {
            let record = self
                .pool
                .get_mut(location.id)
                .ok_or_else(|| SchedulerError::NotFound(format!("{key:?}")))?;
            if !record.warning_issued {
                record.warning_issued = true;
                let trans = record.transaction_id().to_string();
                error!(
                    trans = %trans,
                    file = %record.source_file,
                    "Removing an active transaction corrupts its state, repeat to confirm"
                );
                return Err(SchedulerError::ConfirmationRequired(trans));
            }
        }

        let (queue, pool) = self.split(location.queue)?;
        queue.remove(pool, location.id)?;
        let record = pool.release(location.id)?;
        info!(
            queue = %location.queue,
            file = %record.source_file,
            trans = %record.transaction_id(),
            "Record removed"
        );
        Ok(())
    }

    fn purge(&mut self, target: QueueRef) -> Result<usize, SchedulerError> {
        if target.is_active() {
            return Err(SchedulerError::InvalidArgument(format!(
                "{target} cannot be purged"
            )));
        }

        let (queue, pool) = self.split(target)?;
        let mut released = 0;
        while let Some(id) = queue.dequeue_front(pool) {
            pool.release(id)?;
            released += 1;
        }
        info!(queue = %target, released, "Queue purged");
        Ok(released)
    }

    fn toggle_poll(
        &mut self,
        channel: u8,
        slot: PollSelector,
        enabled: bool,
    ) -> Result<(), SchedulerError> {
        let ch = self.channel_in_use_mut(channel)?;
        match slot {
            PollSelector::All => {
                for dir in ch.poll_dirs.iter_mut().filter(|d| d.in_use) {
                    dir.enabled = enabled;
                }
            }
            PollSelector::Slot(n) => {
                let dir = ch
                    .poll_dirs
                    .get_mut(n)
                    .filter(|d| d.in_use)
                    .ok_or_else(|| {
                        SchedulerError::InvalidArgument(format!("poll slot {n} on channel {channel}"))
                    })?;
                dir.enabled = enabled;
            }
        }
        info!(channel, ?slot, enabled, "Poll directory state changed");
        Ok(())
    }

    fn status_of(&self, key: &str) -> Result<QuickStatus, SchedulerError> {
        let key = RecordKey::parse(key)?;
        let record = self
            .locate(&key)
            .and_then(|loc| self.pool.get(loc.id))
            .ok_or_else(|| SchedulerError::NotFound(format!("{key:?}")))?;

        let trans = record.transaction_id();
        let mut status = record.status.as_str().to_string();
        if record.trans_num != 0 && self.engine.is_suspended(&trans) {
            status.push_str("/SUSPENDED");
        }

        Ok(QuickStatus {
            trans,
            source_file: record.source_file.clone(),
            status,
            condition: record.condition.as_str(),
        })
    }

    fn use_handshake(&mut self, channel: u8, op: HandshakeOp) -> Result<(), SchedulerError> {
        let ch = self.channel(channel)?;
        let token = ch.handshake.as_ref().ok_or_else(|| {
            SchedulerError::InvalidArgument(format!("channel {channel} has no handshake token"))
        })?;
        match op {
            HandshakeOp::Give => token.give(),
            HandshakeOp::Take => {
                if !token.try_take() {
                    return Err(SchedulerError::InvalidArgument(format!(
                        "channel {channel} handshake token unavailable"
                    )));
                }
            }
        }
        info!(channel, ?op, "Handshake token operation");
        Ok(())
    }

    fn forward_directive(&mut self, verb: DirectiveVerb, target: &str) -> Result<(), SchedulerError> {
        let target = if target.eq_ignore_ascii_case("all") {
            TransactionTarget::All
        } else if target.starts_with('/') {
            let id = self
                .active_transaction_for(target)
                .ok_or_else(|| SchedulerError::NotFound(target.to_string()))?;
            TransactionTarget::Id(id)
        } else {
            TransactionTarget::Id(TransactionId::parse(target)?)
        };

        let directive = EngineDirective { verb, target };
        self.engine.give_request(&directive)?;
        info!(directive = %directive, "Directive forwarded to engine");
        self.process_indications();
        Ok(())
    }

    fn dump(
        &self,
        kind: SnapshotKind,
        entries: &[SnapshotEntry],
        path: &str,
    ) -> Result<usize, SchedulerError> {
        validate_file_path(path, self.config.max_path_length)?;
        let mut writer = self.files.create(path)?;
        let bytes = write_snapshot(&mut writer, kind, entries)?;
        info!(file = %path, entries = entries.len(), bytes, "Snapshot written");
        Ok(entries.len())
    }

    fn entries_of(&self, queue: QueueRef) -> Result<Vec<SnapshotEntry>, SchedulerError> {
        Ok(self
            .queue(queue)?
            .iter_front_to_back(&self.pool)
            .map(|(_, record)| SnapshotEntry::from(record))
            .collect())
    }
}

impl<E, F, S> SchedulerApi for FileScheduler<E, F, S>
where
    E: TransferEngine,
    F: FileStore,
    S: PduSink,
{
    fn enqueue_playback(&mut self, request: PlaybackRequest) -> Result<RecordId, SchedulerError> {
        let result = self.queue_playback_file(&request, RecordSource::CommandedFile);
        if result.is_ok() {
            info!(
                channel = request.channel,
                file = %request.source_file,
                class = request.class.number(),
                priority = request.priority,
                "Playback file command accepted"
            );
        }
        self.tally("playback_file", result)
    }

    fn enqueue_from_directory(&mut self, request: DirectoryRequest) -> Result<usize, SchedulerError> {
        let result = self.queue_commanded_directory(&request);
        self.tally("playback_dir", result)
    }

    fn find_by_name(&self, name: &str) -> Option<RecordLocation> {
        let matches = |r: &TransactionRecord| r.source_file == name;

        for queue in [UplinkQueue::Active, UplinkQueue::History] {
            let target = match queue {
                UplinkQueue::Active => &self.uplink.active,
                UplinkQueue::History => &self.uplink.history,
            };
            if let Some(id) = target.find(&self.pool, matches) {
                return Some(RecordLocation {
                    id,
                    queue: QueueRef::Uplink(queue),
                });
            }
        }

        self.channels.iter().filter(|c| c.in_use).find_map(|ch| {
            PLAYBACK_SEARCH.iter().find_map(|&queue| {
                ch.queue(queue)
                    .find(&self.pool, matches)
                    .map(|id| RecordLocation {
                        id,
                        queue: QueueRef::playback(ch.index, queue),
                    })
            })
        })
    }

    fn find_by_transaction_id(&self, id: &TransactionId) -> Option<RecordLocation> {
        if id.source == self.flight {
            return PLAYBACK_SEARCH.iter().find_map(|&queue| {
                self.find_playback_by_trans(queue, id.number)
                    .map(|(channel, rid)| RecordLocation {
                        id: rid,
                        queue: QueueRef::playback(channel, queue),
                    })
            });
        }

        [UplinkQueue::Active, UplinkQueue::History]
            .into_iter()
            .find_map(|queue| {
                self.find_uplink(queue, id).map(|rid| RecordLocation {
                    id: rid,
                    queue: QueueRef::Uplink(queue),
                })
            })
    }

    fn remove_one(&mut self, key: &str) -> Result<(), SchedulerError> {
        let result = self.remove_record(key);
        self.tally("dequeue_node", result)
    }

    fn purge_queue(&mut self, queue: QueueRef) -> Result<usize, SchedulerError> {
        let result = self.purge(queue);
        self.tally("purge_queue", result)
    }

    fn set_dequeue(&mut self, channel: u8, enabled: bool) -> Result<(), SchedulerError> {
        let result = self.channel_in_use_mut(channel).map(|ch| {
            ch.dequeue_enabled = enabled;
        });
        if result.is_ok() {
            info!(channel, enabled, "Dequeue state changed");
        }
        self.tally("set_dequeue", result)
    }

    fn set_poll(&mut self, channel: u8, slot: PollSelector, enabled: bool) -> Result<(), SchedulerError> {
        let result = self.toggle_poll(channel, slot, enabled);
        self.tally("set_poll", result)
    }

    fn kickstart(&mut self, channel: u8) -> Result<(), SchedulerError> {
        let result = self.channel_in_use_mut(channel).map(|ch| {
            ch.blasting = None;
        });
        if result.is_ok() {
            info!(channel, "Channel kickstarted");
        }
        self.tally("kickstart", result)
    }

    fn quick_status(&mut self, key: &str) -> Result<QuickStatus, SchedulerError> {
        let result = self.status_of(key);
        if let Ok(status) = &result {
            info!(
                trans = %status.trans,
                file = %status.source_file,
                status = %status.status,
                condition = status.condition,
                "Quick status"
            );
        }
        self.tally("quick_status", result)
    }

    fn handshake(&mut self, channel: u8, op: HandshakeOp) -> Result<(), SchedulerError> {
        let result = self.use_handshake(channel, op);
        self.tally("handshake", result)
    }

    fn set_auto_suspend(&mut self, enabled: bool) {
        self.auto_suspend = enabled;
        self.command_counter += 1;
        info!(enabled, "Auto-suspend state changed");
    }

    fn request_directive(&mut self, verb: DirectiveVerb, target: &str) -> Result<(), SchedulerError> {
        let result = self.forward_directive(verb, target);
        self.tally("directive", result)
    }

    fn write_queue_info(&mut self, queue: QueueRef, path: Option<&str>) -> Result<usize, SchedulerError> {
        let result = self
            .entries_of(queue)
            .and_then(|entries| {
                self.dump(SnapshotKind::Queue, &entries, path.unwrap_or(DEFAULT_QUEUE_FILE))
            });
        self.tally("write_queue_info", result)
    }

    fn write_active_info(
        &mut self,
        which: ActiveFilter,
        path: Option<&str>,
    ) -> Result<usize, SchedulerError> {
        let mut entries = Vec::new();
        if matches!(which, ActiveFilter::All | ActiveFilter::Uplink) {
            entries.extend(
                self.uplink
                    .active
                    .iter_front_to_back(&self.pool)
                    .map(|(_, r)| SnapshotEntry::from(r)),
            );
        }
        if matches!(which, ActiveFilter::All | ActiveFilter::Playback) {
            for ch in self.channels.iter().filter(|c| c.in_use) {
                entries.extend(
                    ch.active
                        .iter_front_to_back(&self.pool)
                        .map(|(_, r)| SnapshotEntry::from(r)),
                );
            }
        }

        let result = self.dump(
            SnapshotKind::Active,
            &entries,
            path.unwrap_or(DEFAULT_ACTIVE_FILE),
        );
        self.tally("write_active_info", result)
    }

    fn housekeeping(&self) -> Housekeeping {
        self.build_housekeeping()
    }
}

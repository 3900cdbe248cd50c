//! Playback channel management: enqueue, directory scans and file starts.

use super::scheduler::FileScheduler;
use crate::domain::{
    validate_file_path, validate_source_dir, DirectoryRequest, EntityId, PlaybackQueue,
    PlaybackRequest, PutRequest, QueueRef, RecordId, RecordSource, SchedulerError,
    TransactionRecord, TransactionStatus,
};
use crate::ports::outbound::{FileStore, PduSink, TransferEngine};
use tracing::{debug, error, info, warn};

impl<E, F, S> FileScheduler<E, F, S>
where
    E: TransferEngine,
    F: FileStore,
    S: PduSink,
{
    /// Validates and queues one file on its channel's pending queue.
    pub(crate) fn queue_playback_file(
        &mut self,
        request: &PlaybackRequest,
        source: RecordSource,
    ) -> Result<RecordId, SchedulerError> {
        let max_path = self.config.max_path_length;

        // 1. Channel and paths
        let ch = self.channel(request.channel)?;
        validate_file_path(&request.source_file, max_path)?;
        validate_file_path(&request.dest_file, max_path)?;

        // 2. Capacity
        if ch.pending_full() {
            return Err(SchedulerError::QueueFull {
                len: ch.pending.len(),
                depth: ch.pending_depth,
            });
        }

        // 3. Peer and file state
        let peer = EntityId::parse(&request.peer_entity)?;
        if self.files.is_open(&request.source_file) {
            return Err(SchedulerError::FileOpen(request.source_file.clone()));
        }
        let same_file = |r: &TransactionRecord| r.source_file == request.source_file;
        if ch.pending.find(&self.pool, same_file).is_some() {
            return Err(SchedulerError::AlreadyPresent(request.source_file.clone()));
        }
        if ch.active.find(&self.pool, same_file).is_some() {
            return Err(SchedulerError::AlreadyActive(request.source_file.clone()));
        }

        // 4. Allocate and place by priority
        let record = TransactionRecord::outgoing(request, peer, self.flight, source);
        let id = self.pool.allocate(record).map_err(|e| {
            error!(
                channel = request.channel,
                file = %request.source_file,
                "Record pool exhausted, file not queued"
            );
            e
        })?;

        let ch = &mut self.channels[usize::from(request.channel)];
        ch.pending.add_front(&mut self.pool, id)?;
        ch.pending.resort_pending(&mut self.pool, id)?;

        debug!(
            channel = request.channel,
            file = %request.source_file,
            priority = request.priority,
            pending = ch.pending.len(),
            "File queued for playback"
        );
        Ok(id)
    }

    /// Queues every eligible file in `request.source_dir`.
    ///
    /// Subdirectories, open files and files already pending or active on the
    /// channel are skipped. Hitting the pending bound aborts the scan with
    /// [`SchedulerError::ScanAborted`]; files queued before that stay queued.
    pub(crate) fn queue_directory(
        &mut self,
        request: &DirectoryRequest,
        source: RecordSource,
    ) -> Result<usize, SchedulerError> {
        let max_path = self.config.max_path_length;
        let entries = self.files.list_dir(&request.source_dir).map_err(|e| {
            warn!(dir = %request.source_dir, error = %e, "Cannot open directory");
            SchedulerError::Io(e)
        })?;

        let mut queued = 0;
        for entry in entries {
            if entry.is_dir || entry.name == "." || entry.name == ".." {
                continue;
            }

            let ch = self.channel(request.channel)?;
            if ch.pending_full() {
                error!(
                    channel = request.channel,
                    dir = %request.source_dir,
                    queued,
                    "Pending queue full, directory scan aborted"
                );
                return Err(SchedulerError::ScanAborted {
                    dir: request.source_dir.clone(),
                    queued,
                });
            }

            let source_file = format!("{}{}", request.source_dir, entry.name);
            let dest_file = format!("{}{}", request.dest_dir, entry.name);
            if validate_file_path(&source_file, max_path).is_err()
                || validate_file_path(&dest_file, max_path).is_err()
            {
                error!(file = %source_file, max_path, "Path too long or malformed, skipped");
                continue;
            }

            let same_file = |r: &TransactionRecord| r.source_file == source_file;
            if ch.pending.find(&self.pool, same_file).is_some()
                || ch.active.find(&self.pool, same_file).is_some()
            {
                debug!(file = %source_file, "Already queued, skipped");
                continue;
            }
            if self.files.is_open(&source_file) {
                debug!(file = %source_file, "File is open, skipped");
                continue;
            }

            let playback = PlaybackRequest {
                channel: request.channel,
                class: request.class,
                priority: request.priority,
                preserve: request.preserve,
                peer_entity: request.peer_entity.clone(),
                source_file,
                dest_file,
            };
            let peer = EntityId::parse(&playback.peer_entity)?;
            let record = TransactionRecord::outgoing(&playback, peer, self.flight, source);
            let id = match self.pool.allocate(record) {
                Ok(id) => id,
                Err(e) => {
                    error!(
                        dir = %request.source_dir,
                        queued,
                        "Record pool exhausted, directory scan aborted"
                    );
                    return Err(e);
                }
            };

            let ch = &mut self.channels[usize::from(request.channel)];
            ch.pending.add_front(&mut self.pool, id)?;
            ch.pending.resort_pending(&mut self.pool, id)?;
            queued += 1;
        }

        Ok(queued)
    }

    /// Commanded directory playback.
    pub(crate) fn queue_commanded_directory(
        &mut self,
        request: &DirectoryRequest,
    ) -> Result<usize, SchedulerError> {
        let max_path = self.config.max_path_length;
        self.channel(request.channel)?;
        validate_source_dir(&request.source_dir, max_path)?;
        if !request.dest_dir.is_empty() {
            validate_file_path(&request.dest_dir, max_path)?;
        }
        EntityId::parse(&request.peer_entity)?;

        let queued = self.queue_directory(request, RecordSource::CommandedDirectory)?;
        info!(
            channel = request.channel,
            dir = %request.source_dir,
            queued,
            "Directory queued for playback"
        );
        Ok(queued)
    }

    /// Scans every enabled poll directory of `channel`. Returns files queued.
    pub(crate) fn check_poll_directories(&mut self, channel: u8) -> usize {
        let Some(ch) = self.channels.get(usize::from(channel)) else {
            return 0;
        };

        let requests: Vec<DirectoryRequest> = ch
            .poll_dirs
            .iter()
            .filter(|d| d.in_use && d.enabled)
            .filter_map(|d| {
                Some(DirectoryRequest {
                    channel,
                    class: d.transfer_class()?,
                    priority: d.priority,
                    preserve: d.preserve,
                    peer_entity: d.peer_entity_id.clone(),
                    source_dir: d.source_dir.clone(),
                    dest_dir: d.dest_dir.clone(),
                })
            })
            .collect();

        let mut total = 0;
        for request in &requests {
            match self.queue_directory(request, RecordSource::PollDirectory) {
                Ok(queued) => total += queued,
                Err(SchedulerError::ScanAborted { queued, .. }) => total += queued,
                Err(e) => warn!(
                    channel,
                    dir = %request.source_dir,
                    error = %e,
                    "Poll directory scan failed"
                ),
            }
        }
        total
    }

    /// Offers the front pending file of `channel` to the engine.
    ///
    /// Files already active elsewhere and files the engine refuses go
    /// straight to history and the next candidate is tried. Returns `true`
    /// once an offer is accepted, `false` when nothing was started.
    pub fn start_next_file(&mut self, channel: u8) -> Result<bool, SchedulerError> {
        let pending = QueueRef::playback(channel, PlaybackQueue::Pending);

        loop {
            let ch = self.channel(channel)?;
            if ch
                .pending
                .find(&self.pool, |r| r.status == TransactionStatus::PutRequestIssued)
                .is_some()
            {
                debug!(channel, "Offer outstanding, waiting for allocation");
                return Ok(false);
            }

            let Some(front) = ch.pending.tail() else {
                return Ok(false);
            };
            let record = self
                .pool
                .get(front)
                .cloned()
                .ok_or_else(|| SchedulerError::InvalidArgument(format!("record {front:?}")))?;

            if self.is_file_active(&record.source_file) {
                warn!(
                    channel,
                    file = %record.source_file,
                    "File already active, moved to history"
                );
                self.fail_start(channel, front, TransactionStatus::AlreadyActive)?;
                continue;
            }

            let request = PutRequest {
                class: record.class,
                priority: record.priority,
                peer: record.peer_entity,
                source_file: record.source_file.clone(),
                dest_file: record.dest_file.clone(),
            };
            let offered = request.render().and_then(|text| {
                self.engine
                    .offer_transfer(&request)
                    .map(|()| text)
                    .map_err(SchedulerError::from)
            });

            match offered {
                Ok(text) => {
                    if let Some(record) = self.pool.get_mut(front) {
                        record.status = TransactionStatus::PutRequestIssued;
                    }
                    info!(channel, request = %text, "Transfer offered to engine");
                    self.process_indications();
                    return Ok(true);
                }
                Err(e) => {
                    error!(
                        channel,
                        file = %record.source_file,
                        error = %e,
                        "Engine refused transfer, moved to history"
                    );
                    self.fail_start(channel, front, TransactionStatus::PutRequestFailed)?;
                    debug!(queue = %pending, "Trying next pending file");
                }
            }
        }
    }

    fn fail_start(
        &mut self,
        channel: u8,
        id: RecordId,
        status: TransactionStatus,
    ) -> Result<(), SchedulerError> {
        if let Some(record) = self.pool.get_mut(id) {
            record.status = status;
        }
        self.retire(id, QueueRef::playback(channel, PlaybackQueue::Pending))?;
        self.channel_in_use_mut(channel)?.counters.failed += 1;
        Ok(())
    }
}

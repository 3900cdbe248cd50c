//! Transfer Scheduler
//!
//! Owns the record pool, every queue and the collaborators. All state
//! changes happen on the caller's thread: commands, wakeups and engine
//! indications are processed one at a time.

use crate::config::{ChannelConfig, PollDirConfig, SchedulerConfig};
use crate::domain::{
    AppCounters, AutoSuspendHousekeeping, ChannelCounters, ChannelHousekeeping, DeferredSuspends,
    DirectiveVerb, EngineDirective, EntityId, FaultCounters, Housekeeping, PlaybackQueue, Queue,
    QueueRef, RecordId, RecordPool, SchedulerError, TransactionId, TransactionRecord,
    TransactionTarget, UplinkCounters, UplinkQueue,
};
use crate::ports::outbound::{FileStore, HandshakeToken, PduSink, TransferEngine};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Runtime state of one outbound channel.
pub(crate) struct PlaybackChannel {
    pub(crate) index: u8,
    pub(crate) name: String,
    pub(crate) in_use: bool,
    pub(crate) pending: Queue,
    pub(crate) active: Queue,
    pub(crate) history: Queue,
    pub(crate) pending_depth: usize,
    pub(crate) history_depth: usize,
    pub(crate) dequeue_enabled: bool,
    /// Transaction currently sending file data, if any.
    pub(crate) blasting: Option<u32>,
    pub(crate) poll_dirs: Vec<PollDirConfig>,
    pub(crate) poll_timer: u32,
    pub(crate) queue_timer: u32,
    pub(crate) handshake: Option<Arc<dyn HandshakeToken>>,
    pub(crate) counters: ChannelCounters,
}

impl PlaybackChannel {
    fn new(index: u8, config: &ChannelConfig) -> Self {
        Self {
            index,
            name: config.name.clone(),
            in_use: config.in_use,
            pending: Queue::new(),
            active: Queue::new(),
            history: Queue::new(),
            pending_depth: config.pending_depth,
            history_depth: config.history_depth,
            dequeue_enabled: config.dequeue_enabled,
            blasting: None,
            poll_dirs: config.poll_dirs.clone(),
            poll_timer: 0,
            queue_timer: 0,
            handshake: None,
            counters: ChannelCounters::default(),
        }
    }

    pub(crate) fn queue(&self, queue: PlaybackQueue) -> &Queue {
        match queue {
            PlaybackQueue::Pending => &self.pending,
            PlaybackQueue::Active => &self.active,
            PlaybackQueue::History => &self.history,
        }
    }

    pub(crate) fn queue_mut(&mut self, queue: PlaybackQueue) -> &mut Queue {
        match queue {
            PlaybackQueue::Pending => &mut self.pending,
            PlaybackQueue::Active => &mut self.active,
            PlaybackQueue::History => &mut self.history,
        }
    }

    pub(crate) fn pending_full(&self) -> bool {
        self.pending.len() >= self.pending_depth
    }
}

/// System-wide uplink queues.
pub(crate) struct UplinkQueues {
    pub(crate) active: Queue,
    pub(crate) history: Queue,
    pub(crate) history_depth: usize,
    pub(crate) counters: UplinkCounters,
}

/// CFDP transfer scheduler.
///
/// Generic over its three collaborators so hosts and tests can plug in
/// their own engine, file system and PDU consumer.
///
/// ## Lifecycle of an outbound file
///
/// ```text
/// enqueue ──→ pending ──offer──→ pending (PUT_REQ_ISSUED)
///                                   │ MachineAllocated
///                                   ▼
///                                active ──MachineDeallocated──→ history
/// ```
pub struct FileScheduler<E, F, S> {
    pub(crate) config: SchedulerConfig,
    pub(crate) flight: EntityId,
    pub(crate) pool: RecordPool,
    pub(crate) channels: Vec<PlaybackChannel>,
    pub(crate) uplink: UplinkQueues,
    pub(crate) deferred: DeferredSuspends,
    pub(crate) auto_suspend: bool,
    pub(crate) command_counter: u64,
    pub(crate) error_counter: u64,
    pub(crate) app: AppCounters,
    pub(crate) faults: FaultCounters,
    pub(crate) engine: E,
    pub(crate) files: F,
    pub(crate) sink: S,
    dispatching: bool,
}

impl<E, F, S> FileScheduler<E, F, S>
where
    E: TransferEngine,
    F: FileStore,
    S: PduSink,
{
    /// Validates `config` and builds empty queues for every channel.
    pub fn new(config: SchedulerConfig, engine: E, files: F, sink: S) -> Result<Self, SchedulerError> {
        config.validate()?;
        let flight = EntityId::parse(&config.flight_entity_id)?;

        let channels: Vec<PlaybackChannel> = config
            .channels
            .iter()
            .enumerate()
            .map(|(i, c)| PlaybackChannel::new(i as u8, c))
            .collect();

        for channel in channels.iter().filter(|c| c.in_use) {
            if let Some(token) = &config.channels[usize::from(channel.index)].handshake {
                debug!(
                    channel = channel.index,
                    token = %token,
                    "Channel expects a handshake token, output is ungated until one is attached"
                );
            }
        }

        info!(
            flight = %flight,
            channels = channels.iter().filter(|c| c.in_use).count(),
            pool_capacity = config.max_queue_records,
            "Transfer scheduler initialised"
        );

        Ok(Self {
            pool: RecordPool::new(config.max_queue_records),
            uplink: UplinkQueues {
                active: Queue::new(),
                history: Queue::new(),
                history_depth: config.uplink_history_depth,
                counters: UplinkCounters::default(),
            },
            deferred: DeferredSuspends::new(config.auto_suspend_capacity),
            auto_suspend: config.auto_suspend_enabled,
            command_counter: 0,
            error_counter: 0,
            app: AppCounters::default(),
            faults: FaultCounters::default(),
            channels,
            flight,
            config,
            engine,
            files,
            sink,
            dispatching: false,
        })
    }

    /// Gates a channel's PDU output on `token`.
    pub fn attach_handshake(
        &mut self,
        channel: u8,
        token: Arc<dyn HandshakeToken>,
    ) -> Result<(), SchedulerError> {
        let ch = self.channel_in_use_mut(channel)?;
        ch.handshake = Some(token);
        info!(channel, name = %ch.name, "Handshake token attached");
        Ok(())
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn flight_entity(&self) -> EntityId {
        self.flight
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn files(&self) -> &F {
        &self.files
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn pool(&self) -> &RecordPool {
        &self.pool
    }

    pub fn record(&self, id: RecordId) -> Option<&TransactionRecord> {
        self.pool.get(id)
    }

    pub fn queue_len(&self, queue: QueueRef) -> Result<usize, SchedulerError> {
        Ok(self.queue(queue)?.len())
    }

    /// Copies of a queue's records, logical front first.
    pub fn records_in(&self, queue: QueueRef) -> Result<Vec<TransactionRecord>, SchedulerError> {
        Ok(self
            .queue(queue)?
            .iter_front_to_back(&self.pool)
            .map(|(_, record)| record.clone())
            .collect())
    }

    pub fn blasting(&self, channel: u8) -> Option<u32> {
        self.channels
            .get(usize::from(channel))
            .and_then(|c| c.blasting)
    }

    pub fn auto_suspend_enabled(&self) -> bool {
        self.auto_suspend
    }

    pub(crate) fn channel(&self, channel: u8) -> Result<&PlaybackChannel, SchedulerError> {
        let ch = self
            .channels
            .get(usize::from(channel))
            .ok_or_else(|| SchedulerError::InvalidArgument(format!("channel {channel}")))?;
        if !ch.in_use {
            return Err(SchedulerError::ChannelNotInUse(channel));
        }
        Ok(ch)
    }

    pub(crate) fn channel_in_use_mut(
        &mut self,
        channel: u8,
    ) -> Result<&mut PlaybackChannel, SchedulerError> {
        let ch = self
            .channels
            .get_mut(usize::from(channel))
            .ok_or_else(|| SchedulerError::InvalidArgument(format!("channel {channel}")))?;
        if !ch.in_use {
            return Err(SchedulerError::ChannelNotInUse(channel));
        }
        Ok(ch)
    }

    pub(crate) fn queue(&self, queue: QueueRef) -> Result<&Queue, SchedulerError> {
        match queue {
            QueueRef::Uplink(UplinkQueue::Active) => Ok(&self.uplink.active),
            QueueRef::Uplink(UplinkQueue::History) => Ok(&self.uplink.history),
            QueueRef::Playback { channel, queue } => Ok(self.channel(channel)?.queue(queue)),
        }
    }

    /// Borrows one queue together with the pool it links through.
    pub(crate) fn split(
        &mut self,
        queue: QueueRef,
    ) -> Result<(&mut Queue, &mut RecordPool), SchedulerError> {
        let pool = &mut self.pool;
        let target = match queue {
            QueueRef::Uplink(UplinkQueue::Active) => &mut self.uplink.active,
            QueueRef::Uplink(UplinkQueue::History) => &mut self.uplink.history,
            QueueRef::Playback { channel, queue } => {
                let ch = self
                    .channels
                    .get_mut(usize::from(channel))
                    .filter(|c| c.in_use)
                    .ok_or_else(|| SchedulerError::InvalidArgument(format!("channel {channel}")))?;
                ch.queue_mut(queue)
            }
        };
        Ok((target, pool))
    }

    /// Moves `id` from `from` to the back of `to`.
    pub(crate) fn move_record(
        &mut self,
        id: RecordId,
        from: QueueRef,
        to: QueueRef,
    ) -> Result<(), SchedulerError> {
        {
            let (queue, pool) = self.split(from)?;
            queue.remove(pool, id)?;
        }
        let (queue, pool) = self.split(to)?;
        queue.add_front(pool, id)
    }

    /// Moves `id` off a pending or active queue into the matching history,
    /// evicting the oldest history entries to stay within depth.
    pub(crate) fn retire(&mut self, id: RecordId, from: QueueRef) -> Result<(), SchedulerError> {
        let (history, depth) = match from {
            QueueRef::Uplink(_) => (
                QueueRef::Uplink(UplinkQueue::History),
                self.uplink.history_depth,
            ),
            QueueRef::Playback { channel, .. } => (
                QueueRef::playback(channel, PlaybackQueue::History),
                self.channel(channel)?.history_depth,
            ),
        };

        {
            let (queue, pool) = self.split(from)?;
            queue.remove(pool, id)?;
        }

        let (queue, pool) = self.split(history)?;
        while queue.len() >= depth {
            let Some(oldest) = queue.dequeue_front(pool) else {
                break;
            };
            let evicted = pool.release(oldest)?;
            debug!(
                queue = %history,
                file = %evicted.source_file,
                trans = evicted.trans_num,
                "Evicted oldest history entry"
            );
        }
        queue.add_front(pool, id)
    }

    /// Active playback or history record for a local transaction number.
    pub(crate) fn find_playback_by_trans(
        &self,
        queue: PlaybackQueue,
        trans_num: u32,
    ) -> Option<(u8, RecordId)> {
        if trans_num == 0 {
            return None;
        }
        self.channels.iter().filter(|c| c.in_use).find_map(|ch| {
            ch.queue(queue)
                .find(&self.pool, |r| r.trans_num == trans_num)
                .map(|id| (ch.index, id))
        })
    }

    pub(crate) fn find_uplink(&self, queue: UplinkQueue, id: &TransactionId) -> Option<RecordId> {
        let target = match queue {
            UplinkQueue::Active => &self.uplink.active,
            UplinkQueue::History => &self.uplink.history,
        };
        target.find(&self.pool, |r| r.transaction_id() == *id)
    }

    /// True when `file` is being sent or received by any transaction.
    pub fn is_file_active(&self, file: &str) -> bool {
        let matches = |r: &TransactionRecord| r.source_file == file;
        self.uplink.active.find(&self.pool, matches).is_some()
            || self
                .channels
                .iter()
                .filter(|c| c.in_use)
                .any(|ch| ch.active.find(&self.pool, matches).is_some())
    }

    /// Delivers every indication the engine has queued, then issues any
    /// deferred suspends, repeating until both are empty.
    ///
    /// Calls made while already dispatching return at once. The outer loop
    /// picks up whatever they produced.
    pub fn process_indications(&mut self) {
        if self.dispatching {
            return;
        }
        self.dispatching = true;

        loop {
            let batch = self.engine.take_indications();
            if !batch.is_empty() {
                for indication in batch {
                    self.handle_indication(indication);
                }
                continue;
            }

            let suspends = self.deferred.drain();
            if suspends.is_empty() {
                break;
            }
            for trans_num in suspends {
                self.issue_suspend(trans_num);
            }
        }

        self.dispatching = false;
    }

    fn issue_suspend(&mut self, trans_num: u32) {
        let directive = EngineDirective {
            verb: DirectiveVerb::Suspend,
            target: TransactionTarget::Id(TransactionId::new(self.flight, trans_num)),
        };
        match self.engine.give_request(&directive) {
            Ok(()) => info!(directive = %directive, "Auto-suspend issued"),
            Err(e) => warn!(directive = %directive, error = %e, "Auto-suspend rejected by engine"),
        }
    }

    /// One scheduler tick.
    ///
    /// 1. Issue deferred suspends
    /// 2. Per channel: scan poll directories, start the next pending file
    /// 3. Cycle the engine the configured number of times
    pub fn wakeup(&mut self) {
        self.app.wakeups += 1;
        self.process_indications();

        let poll_period = self.config.wakeups_per_poll_check;
        let queue_period = self.config.wakeups_per_queue_check;

        for index in 0..self.channels.len() {
            let channel = index as u8;
            if !self.channels[index].in_use {
                continue;
            }

            let scan_due = {
                let ch = &mut self.channels[index];
                ch.poll_timer += 1;
                ch.poll_timer >= poll_period
            };
            if scan_due {
                let queued = self.check_poll_directories(channel);
                let ch = &mut self.channels[index];
                ch.poll_timer = 0;
                ch.counters.poll_dirs_checked += 1;
                if queued > 0 {
                    debug!(channel, queued, "Poll scan queued files");
                }
            }

            let start_due = {
                let ch = &mut self.channels[index];
                if ch.blasting.is_none() && ch.dequeue_enabled {
                    ch.queue_timer += 1;
                    ch.queue_timer >= queue_period
                } else {
                    false
                }
            };
            if start_due {
                if let Err(e) = self.start_next_file(channel) {
                    error!(channel, error = %e, "Failed to start next file");
                }
                let ch = &mut self.channels[index];
                ch.queue_timer = 0;
                ch.counters.pending_checked += 1;
            }
        }

        for _ in 0..self.config.engine_cycles_per_wakeup {
            self.engine.cycle_each_transaction();
            self.app.engine_cycles += 1;
            self.process_indications();
        }
    }

    pub(crate) fn build_housekeeping(&self) -> Housekeeping {
        let channels = self
            .channels
            .iter()
            .filter(|c| c.in_use)
            .map(|ch| ChannelHousekeeping {
                channel: ch.index,
                name: ch.name.clone(),
                counters: ch.counters.clone(),
                pending: ch.pending.len(),
                active: ch.active.len(),
                history: ch.history.len(),
                blasting: ch.blasting.is_some(),
                dequeue_enabled: ch.dequeue_enabled,
                poll_enabled: ch
                    .poll_dirs
                    .iter()
                    .map(|d| d.in_use && d.enabled)
                    .collect(),
            })
            .collect();

        let mut uplink = self.uplink.counters.clone();
        uplink.active = self.uplink.active.len();
        uplink.history = self.uplink.history.len();

        let mut app = self.app.clone();
        app.pool = self.pool.stats();

        Housekeeping {
            command_counter: self.command_counter,
            error_counter: self.error_counter,
            app,
            uplink,
            channels,
            faults: self.faults.clone(),
            auto_suspend: AutoSuspendHousekeeping {
                enabled: self.auto_suspend,
                low_free_mark: self.deferred.low_free_mark(),
            },
        }
    }
}

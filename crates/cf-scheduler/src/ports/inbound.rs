//! Inbound (Driving) port: the command surface of the scheduler.
//!
//! Every mutating command bumps the command counter on success and the
//! error counter on failure.

use crate::domain::{
    DirectiveVerb, DirectoryRequest, Housekeeping, PlaybackRequest, QueueRef, RecordId,
    SchedulerError, TransactionId,
};

/// Where a record currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordLocation {
    pub id: RecordId,
    pub queue: QueueRef,
}

/// Poll directory slot selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollSelector {
    /// Every in-use slot on the channel.
    All,
    Slot(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeOp {
    Give,
    Take,
}

/// Which active queues a snapshot covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveFilter {
    All,
    Uplink,
    Playback,
}

/// Answer to a quick status query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuickStatus {
    pub trans: TransactionId,
    pub source_file: String,
    /// Status name, with `/SUSPENDED` appended when the engine says so.
    pub status: String,
    pub condition: &'static str,
}

/// Scheduler command API.
pub trait SchedulerApi {
    /// Queues one file on a channel's pending queue.
    ///
    /// # Errors
    /// - `InvalidArgument`, `ChannelNotInUse`, `InvalidPath`, `InvalidEntityId`
    /// - `QueueFull` if the pending queue is at depth
    /// - `FileOpen` if a writer still holds the file
    /// - `AlreadyActive` if the file is active on the channel
    /// - `AlreadyPresent` if the file is already pending on the channel
    /// - `PoolExhausted`
    fn enqueue_playback(&mut self, request: PlaybackRequest) -> Result<RecordId, SchedulerError>;

    /// Queues every closed file in a directory. Returns the number queued.
    ///
    /// # Errors
    /// - `ScanAborted` if the pending queue fills partway, earlier files stay queued
    fn enqueue_from_directory(&mut self, request: DirectoryRequest) -> Result<usize, SchedulerError>;

    fn find_by_name(&self, name: &str) -> Option<RecordLocation>;

    fn find_by_transaction_id(&self, id: &TransactionId) -> Option<RecordLocation>;

    /// Removes one record named by `/path` or `a.b_n`.
    ///
    /// Active records need the command twice; the first returns
    /// `ConfirmationRequired`.
    fn remove_one(&mut self, key: &str) -> Result<(), SchedulerError>;

    /// Releases every record on a pending or history queue.
    fn purge_queue(&mut self, queue: QueueRef) -> Result<usize, SchedulerError>;

    fn set_dequeue(&mut self, channel: u8, enabled: bool) -> Result<(), SchedulerError>;

    fn set_poll(&mut self, channel: u8, slot: PollSelector, enabled: bool) -> Result<(), SchedulerError>;

    /// Clears a channel's blast state so the next tick can start a file.
    fn kickstart(&mut self, channel: u8) -> Result<(), SchedulerError>;

    fn quick_status(&mut self, key: &str) -> Result<QuickStatus, SchedulerError>;

    fn handshake(&mut self, channel: u8, op: HandshakeOp) -> Result<(), SchedulerError>;

    fn set_auto_suspend(&mut self, enabled: bool);

    /// Forwards cancel, abandon, suspend or resume for `All`, an id or a `/path`.
    fn request_directive(&mut self, verb: DirectiveVerb, target: &str) -> Result<(), SchedulerError>;

    /// Dumps one queue. Returns the number of records written.
    fn write_queue_info(&mut self, queue: QueueRef, path: Option<&str>) -> Result<usize, SchedulerError>;

    /// Dumps active transactions. Returns the number of records written.
    fn write_active_info(&mut self, which: ActiveFilter, path: Option<&str>) -> Result<usize, SchedulerError>;

    fn housekeeping(&self) -> Housekeeping;
}

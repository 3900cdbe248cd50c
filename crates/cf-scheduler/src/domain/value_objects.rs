//! Value objects for transaction identity, queue selection and engine requests.

use super::entities::TransferClass;
use super::errors::SchedulerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest request string the engine accepts.
pub const MAX_REQUEST_LEN: usize = 128;

/// Dotted-decimal entity identifier such as `0.24`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    high: u8,
    low: u8,
}

impl EntityId {
    pub const fn new(high: u8, low: u8) -> Self {
        Self { high, low }
    }

    /// Parses `a.b`, each part 1-3 decimal digits no greater than 255.
    pub fn parse(text: &str) -> Result<Self, SchedulerError> {
        let invalid = || SchedulerError::InvalidEntityId(text.to_string());

        if !(3..=7).contains(&text.len()) {
            return Err(invalid());
        }

        let (high, low) = text.split_once('.').ok_or_else(invalid)?;
        let part = |s: &str| -> Result<u8, SchedulerError> {
            if s.is_empty() || s.len() > 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            s.parse::<u16>()
                .ok()
                .and_then(|v| u8::try_from(v).ok())
                .ok_or_else(invalid)
        };

        Ok(Self::new(part(high)?, part(low)?))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.high, self.low)
    }
}

impl FromStr for EntityId {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = SchedulerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

/// A transaction is unique only within the scope of its source entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransactionId {
    pub source: EntityId,
    pub number: u32,
}

impl TransactionId {
    pub const fn new(source: EntityId, number: u32) -> Self {
        Self { source, number }
    }

    /// Parses the `a.b_n` form used in commands and telemetry.
    pub fn parse(text: &str) -> Result<Self, SchedulerError> {
        let (entity, number) = text
            .split_once('_')
            .ok_or_else(|| SchedulerError::InvalidArgument(format!("transaction id {text}")))?;

        let source = EntityId::parse(entity)?;
        let number = number
            .parse::<u32>()
            .map_err(|_| SchedulerError::InvalidArgument(format!("transaction id {text}")))?;

        Ok(Self { source, number })
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.source, self.number)
    }
}

impl FromStr for TransactionId {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Queues owned by each playback channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackQueue {
    Pending,
    Active,
    History,
}

/// System-wide uplink queues. There is no pending stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UplinkQueue {
    Active,
    History,
}

/// Selects one queue in the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueRef {
    Uplink(UplinkQueue),
    Playback { channel: u8, queue: PlaybackQueue },
}

impl QueueRef {
    pub fn playback(channel: u8, queue: PlaybackQueue) -> Self {
        Self::Playback { channel, queue }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Uplink(UplinkQueue::Active)
                | Self::Playback {
                    queue: PlaybackQueue::Active,
                    ..
                }
        )
    }
}

impl fmt::Display for QueueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uplink(UplinkQueue::Active) => write!(f, "uplink active"),
            Self::Uplink(UplinkQueue::History) => write!(f, "uplink history"),
            Self::Playback { channel, queue } => {
                let name = match queue {
                    PlaybackQueue::Pending => "pending",
                    PlaybackQueue::Active => "active",
                    PlaybackQueue::History => "history",
                };
                write!(f, "channel {channel} {name}")
            }
        }
    }
}

/// How an administrative command names a record: `/path` or `a.b_n`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordKey {
    Name(String),
    Id(TransactionId),
}

impl RecordKey {
    pub fn parse(text: &str) -> Result<Self, SchedulerError> {
        if text.starts_with('/') {
            validate_file_path(text, usize::MAX)?;
            Ok(Self::Name(text.to_string()))
        } else {
            TransactionId::parse(text).map(Self::Id)
        }
    }
}

/// Rejects empty paths, paths with spaces and paths longer than `max_len`.
pub fn validate_file_path(path: &str, max_len: usize) -> Result<(), SchedulerError> {
    if path.is_empty() || path.contains(' ') || path.contains('\0') || path.len() >= max_len {
        return Err(SchedulerError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Source directories must also end in a slash.
pub fn validate_source_dir(path: &str, max_len: usize) -> Result<(), SchedulerError> {
    validate_file_path(path, max_len)?;
    if !path.ends_with('/') {
        return Err(SchedulerError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Parameters handed to the engine to start an outbound transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutRequest {
    pub class: TransferClass,
    pub priority: u8,
    pub peer: EntityId,
    pub source_file: String,
    pub dest_file: String,
}

impl PutRequest {
    /// Renders the engine request text, `PUT [-class1 ]src peer dst`.
    pub fn render(&self) -> Result<String, SchedulerError> {
        let class_flag = match self.class {
            TransferClass::Unacknowledged => "-class1 ",
            TransferClass::Acknowledged => "",
        };
        let text = format!(
            "PUT {}{} {} {}",
            class_flag, self.source_file, self.peer, self.dest_file
        );

        if text.len() > MAX_REQUEST_LEN {
            return Err(SchedulerError::EngineRejected(format!(
                "request length {} exceeds {}",
                text.len(),
                MAX_REQUEST_LEN
            )));
        }
        Ok(text)
    }
}

/// Direction bit of an outgoing PDU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PduDirection {
    /// Produced by a local sender (playback).
    TowardReceiver,
    /// Produced by a local receiver (uplink responses).
    TowardSender,
}

/// Operator directives forwarded to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirectiveVerb {
    Cancel,
    Abandon,
    Resume,
    Suspend,
}

impl fmt::Display for DirectiveVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Cancel => "Cancel",
            Self::Abandon => "Abandon",
            Self::Resume => "Resume",
            Self::Suspend => "Suspend",
        };
        f.write_str(verb)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionTarget {
    All,
    Id(TransactionId),
}

impl fmt::Display for TransactionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Id(id) => id.fmt(f),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineDirective {
    pub verb: DirectiveVerb,
    pub target: TransactionTarget,
}

impl fmt::Display for EngineDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.target)
    }
}

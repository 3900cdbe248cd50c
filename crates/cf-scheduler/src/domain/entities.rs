//! # Transaction Records
//!
//! A `TransactionRecord` is the unit of scheduling work. Exactly one queue
//! owns a record at a time; link pointers live in the pool arena, not here.
//!
//! ```text
//! outbound:  [PENDING] ──put issued──→ [PUT_REQ_ISSUED] ──allocated──→ [ACTIVE] ──finished──→ [HISTORY]
//!                 │
//!                 └── already active / engine rejected ──→ [HISTORY]
//!
//! inbound:   allocated ──→ [ACTIVE] ──finished──→ [HISTORY]
//! ```

use super::value_objects::{EntityId, TransactionId};
use serde::{Deserialize, Serialize};

/// Placeholder filename for inbound transfers before metadata arrives.
pub const UNKNOWN_FILENAME: &str = "UNKNOWN";

/// Priority given to inbound records, which are never sorted.
pub const UPLINK_PRIORITY: u8 = 0xFF;

/// Bytes charged against pool memory telemetry per live record.
pub const RECORD_BYTES: usize = std::mem::size_of::<TransactionRecord>();

/// Protocol reliability mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferClass {
    /// Class 1.
    Unacknowledged,
    /// Class 2.
    Acknowledged,
}

impl TransferClass {
    pub fn from_number(class: u8) -> Option<Self> {
        match class {
            1 => Some(Self::Unacknowledged),
            2 => Some(Self::Acknowledged),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::Unacknowledged => 1,
            Self::Acknowledged => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Inbound (uplink) transfer.
    Incoming,
    /// Outbound (playback) transfer.
    Outgoing,
}

/// What created the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordSource {
    CommandedFile,
    CommandedDirectory,
    PollDirectory,
    /// Created from an engine indication.
    Engine,
}

/// Whether the source file survives a successful outbound transfer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preserve {
    Delete,
    #[default]
    Keep,
}

/// Lifecycle status. Codes match the values reported in telemetry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    #[default]
    Unknown,
    Success,
    Cancelled,
    Abandoned,
    NoMetadata,
    Pending,
    AlreadyActive,
    PutRequestIssued,
    PutRequestFailed,
    Active,
    /// Raw final status from the engine that has no named meaning here.
    Other(u8),
}

impl TransactionStatus {
    pub fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Success => 1,
            Self::Cancelled => 2,
            Self::Abandoned => 3,
            Self::NoMetadata => 4,
            Self::Pending => 5,
            Self::AlreadyActive => 6,
            Self::PutRequestIssued => 7,
            Self::PutRequestFailed => 8,
            Self::Active => 9,
            Self::Other(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::Success,
            2 => Self::Cancelled,
            3 => Self::Abandoned,
            4 => Self::NoMetadata,
            5 => Self::Pending,
            6 => Self::AlreadyActive,
            7 => Self::PutRequestIssued,
            8 => Self::PutRequestFailed,
            9 => Self::Active,
            other => Self::Other(other),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Success => "SUCCESSFUL",
            Self::Cancelled => "CANCELLED",
            Self::Abandoned => "ABANDONED",
            Self::NoMetadata => "NO_METADATA",
            Self::Pending => "PENDING",
            Self::AlreadyActive => "ALRDY_ACTIVE",
            Self::PutRequestIssued => "PUT_REQ_ISSUED",
            Self::PutRequestFailed => "PUT_REQ_FAILED",
            Self::Active => "ACTIVE",
            Self::Other(_) => "INV_FINAL_STAT",
        }
    }
}

/// Protocol condition code carried by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConditionCode {
    #[default]
    NoError,
    PositiveAckLimitReached,
    KeepAliveLimitReached,
    InvalidTransmissionMode,
    FilestoreRejection,
    FileChecksumFailure,
    FileSizeError,
    NakLimitReached,
    InactivityDetected,
    InvalidFileStructure,
    SuspendRequestReceived,
    CancelRequestReceived,
    Reserved(u8),
}

impl ConditionCode {
    pub fn code(self) -> u8 {
        match self {
            Self::NoError => 0,
            Self::PositiveAckLimitReached => 1,
            Self::KeepAliveLimitReached => 2,
            Self::InvalidTransmissionMode => 3,
            Self::FilestoreRejection => 4,
            Self::FileChecksumFailure => 5,
            Self::FileSizeError => 6,
            Self::NakLimitReached => 7,
            Self::InactivityDetected => 8,
            Self::InvalidFileStructure => 9,
            Self::SuspendRequestReceived => 14,
            Self::CancelRequestReceived => 15,
            Self::Reserved(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::NoError,
            1 => Self::PositiveAckLimitReached,
            2 => Self::KeepAliveLimitReached,
            3 => Self::InvalidTransmissionMode,
            4 => Self::FilestoreRejection,
            5 => Self::FileChecksumFailure,
            6 => Self::FileSizeError,
            7 => Self::NakLimitReached,
            8 => Self::InactivityDetected,
            9 => Self::InvalidFileStructure,
            14 => Self::SuspendRequestReceived,
            15 => Self::CancelRequestReceived,
            other => Self::Reserved(other),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoError => "NO_ERR",
            Self::PositiveAckLimitReached => "ACK_LIMIT",
            Self::KeepAliveLimitReached => "KEEP_ALIVE_LIMIT",
            Self::InvalidTransmissionMode => "INV_TRANS_MODE",
            Self::FilestoreRejection => "FILESTORE_ERR",
            Self::FileChecksumFailure => "CHKSUM_FAIL",
            Self::FileSizeError => "FILESIZE_ERR",
            Self::NakLimitReached => "NAK_LIMIT",
            Self::InactivityDetected => "INACTIVITY_DETECTED",
            Self::InvalidFileStructure => "INV_FILE_STRUCT",
            Self::SuspendRequestReceived => "SUSPEND_REQ_RCVD",
            Self::CancelRequestReceived => "CANCEL_REQ_RCVD",
            Self::Reserved(_) => "UNEXPECTED",
        }
    }
}

/// One in-flight or historical transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Zero until the engine allocates an outbound transaction.
    pub trans_num: u32,
    pub source_entity: EntityId,
    pub peer_entity: EntityId,
    pub class: TransferClass,
    /// Lower is more urgent.
    pub priority: u8,
    pub direction: Direction,
    pub source: RecordSource,
    pub source_file: String,
    pub dest_file: String,
    pub preserve: Preserve,
    pub channel: u8,
    pub status: TransactionStatus,
    pub condition: ConditionCode,
    /// Set by the first of a two-step removal of an active record.
    pub warning_issued: bool,
}

impl TransactionRecord {
    /// A new pending playback record.
    pub fn outgoing(
        request: &PlaybackRequest,
        peer: EntityId,
        flight: EntityId,
        source: RecordSource,
    ) -> Self {
        Self {
            trans_num: 0,
            source_entity: flight,
            peer_entity: peer,
            class: request.class,
            priority: request.priority,
            direction: Direction::Outgoing,
            source,
            source_file: request.source_file.clone(),
            dest_file: request.dest_file.clone(),
            preserve: request.preserve,
            channel: request.channel,
            status: TransactionStatus::Pending,
            condition: ConditionCode::NoError,
            warning_issued: false,
        }
    }

    /// A new uplink record, created when the engine allocates a receiver.
    pub fn incoming(id: TransactionId, class: TransferClass, channel: u8, local: EntityId) -> Self {
        Self {
            trans_num: id.number,
            source_entity: id.source,
            peer_entity: local,
            class,
            priority: UPLINK_PRIORITY,
            direction: Direction::Incoming,
            source: RecordSource::Engine,
            source_file: UNKNOWN_FILENAME.to_string(),
            dest_file: UNKNOWN_FILENAME.to_string(),
            preserve: Preserve::Keep,
            channel,
            status: TransactionStatus::Active,
            condition: ConditionCode::NoError,
            warning_issued: false,
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        TransactionId::new(self.source_entity, self.trans_num)
    }
}

/// Request to queue one file for playback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackRequest {
    pub channel: u8,
    pub class: TransferClass,
    pub priority: u8,
    pub preserve: Preserve,
    pub peer_entity: String,
    pub source_file: String,
    pub dest_file: String,
}

/// Request to queue every closed file in a directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRequest {
    pub channel: u8,
    pub class: TransferClass,
    pub priority: u8,
    pub preserve: Preserve,
    pub peer_entity: String,
    /// Must end in `/`.
    pub source_dir: String,
    pub dest_dir: String,
}

//! Lifecycle events emitted by the transfer engine.

use super::entities::{ConditionCode, TransactionStatus, TransferClass};
use super::value_objects::TransactionId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndicationKind {
    Abandoned,
    AckTimerExpired,
    EofReceived,
    EofSent,
    Fault,
    FileSegmentSent,
    FileSegmentReceived,
    InactivityTimerExpired,
    MachineAllocated,
    MachineDeallocated,
    MetadataReceived,
    MetadataSent,
    NakTimerExpired,
    Report,
    Resumed,
    Suspended,
    TransactionStarted,
    TransactionFinished,
}

/// The local entity's role in a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Undefined,
    Class1Sender,
    Class1Receiver,
    Class2Sender,
    Class2Receiver,
}

impl Role {
    pub fn is_receiver(self) -> bool {
        matches!(self, Self::Class1Receiver | Self::Class2Receiver)
    }

    pub fn is_sender(self) -> bool {
        matches!(self, Self::Class1Sender | Self::Class2Sender)
    }

    pub fn class(self) -> Option<TransferClass> {
        match self {
            Self::Class1Sender | Self::Class1Receiver => Some(TransferClass::Unacknowledged),
            Self::Class2Sender | Self::Class2Receiver => Some(TransferClass::Acknowledged),
            Self::Undefined => None,
        }
    }
}

/// Outcome of a finished transaction as the engine reports it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FinalStatus {
    #[default]
    Unknown,
    Successful,
    Cancelled,
    Abandoned,
    NoMetadata,
    Other(u8),
}

impl From<FinalStatus> for TransactionStatus {
    fn from(status: FinalStatus) -> Self {
        match status {
            FinalStatus::Unknown => TransactionStatus::Unknown,
            FinalStatus::Successful => TransactionStatus::Success,
            FinalStatus::Cancelled => TransactionStatus::Cancelled,
            FinalStatus::Abandoned => TransactionStatus::Abandoned,
            FinalStatus::NoMetadata => TransactionStatus::NoMetadata,
            FinalStatus::Other(code) => TransactionStatus::Other(code),
        }
    }
}

/// One engine event, with the transaction status snapshot it carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Indication {
    pub kind: IndicationKind,
    pub role: Role,
    pub id: TransactionId,
    pub final_status: FinalStatus,
    pub condition: ConditionCode,
    pub source_file: String,
    pub dest_file: String,
}

impl Indication {
    pub fn new(kind: IndicationKind, role: Role, id: TransactionId) -> Self {
        Self {
            kind,
            role,
            id,
            final_status: FinalStatus::Unknown,
            condition: ConditionCode::NoError,
            source_file: String::new(),
            dest_file: String::new(),
        }
    }

    pub fn with_files(mut self, source_file: impl Into<String>, dest_file: impl Into<String>) -> Self {
        self.source_file = source_file.into();
        self.dest_file = dest_file.into();
        self
    }

    pub fn with_outcome(mut self, final_status: FinalStatus, condition: ConditionCode) -> Self {
        self.final_status = final_status;
        self.condition = condition;
        self
    }
}

//! Error types for the transfer scheduler.
//!
//! Nothing here is fatal to the process. Every failure resolves to a
//! rejected call plus a telemetry counter increment.

use thiserror::Error;

/// All errors surfaced by scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Bad channel or queue selector, or a stale record handle.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No record blocks left in the pool.
    #[error("Record pool exhausted at {capacity} records")]
    PoolExhausted { capacity: usize },

    /// The file is already being transferred.
    #[error("File {0} is already active")]
    AlreadyActive(String),

    /// The file is already on this channel's pending or active queue.
    #[error("File {0} is already queued")]
    AlreadyPresent(String),

    /// A writer still holds the file open.
    #[error("File {0} is open")]
    FileOpen(String),

    /// Pending queue at its configured depth.
    #[error("Queue full: {len} of {depth} entries")]
    QueueFull { len: usize, depth: usize },

    /// The engine declined a transfer offer or directive.
    #[error("Engine rejected request: {0}")]
    EngineRejected(String),

    /// A directory listing hit the pending bound partway through.
    #[error("Scan of {dir} aborted after queueing {queued} files")]
    ScanAborted { dir: String, queued: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid entity id: {0}")]
    InvalidEntityId(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Channel {0} is not in use")]
    ChannelNotInUse(u8),

    /// First half of a two-step removal of an active transaction.
    #[error("Transaction {0} is active, repeat the command to remove it")]
    ConfirmationRequired(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("PDU output failed: {0}")]
    Sink(#[from] SinkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a transfer engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),
}

impl From<EngineError> for SchedulerError {
    fn from(err: EngineError) -> Self {
        SchedulerError::EngineRejected(err.to_string())
    }
}

/// Errors reported by the downstream PDU consumer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Output channel {0} unavailable")]
    Unavailable(u8),

    #[error("Send failed: {0}")]
    Failed(String),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Every violation is counted, the first is reported.
    #[error("{count} validation errors in configuration, first: {first}")]
    Invalid { count: usize, first: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::QueueFull { len: 8, depth: 8 };
        assert_eq!(err.to_string(), "Queue full: 8 of 8 entries");

        let err = SchedulerError::ScanAborted {
            dir: "/cf/poll/".into(),
            queued: 3,
        };
        assert!(err.to_string().contains("/cf/poll/"));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_engine_error_conversion() {
        let err: SchedulerError = EngineError::Rejected("busy".into()).into();
        assert!(matches!(err, SchedulerError::EngineRejected(msg) if msg.contains("busy")));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            count: 2,
            first: "flight_entity_id".into(),
        };
        assert!(err.to_string().starts_with("2 validation errors"));
    }
}

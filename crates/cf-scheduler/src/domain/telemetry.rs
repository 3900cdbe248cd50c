//! Housekeeping counters reported to the ground.

use super::entities::ConditionCode;
use super::pool::PoolStats;
use serde::Serialize;

/// Application-wide counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AppCounters {
    pub pool: PoolStats,
    pub total_abandoned: u64,
    /// `a.b_n` of the most recent failed transaction.
    pub last_failed_trans: String,
    pub wakeups: u64,
    pub engine_cycles: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UplinkCounters {
    pub metadata_received: u64,
    pub success: u64,
    pub failed: u64,
    pub last_file_uplinked: String,
    pub active: usize,
    pub history: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChannelCounters {
    pub success: u64,
    pub failed: u64,
    pub files_sent: u64,
    pub pdus_sent: u64,
    pub green_light: u64,
    pub red_light: u64,
    pub poll_dirs_checked: u64,
    pub pending_checked: u64,
}

/// Per-channel housekeeping: counters plus current flags.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChannelHousekeeping {
    pub channel: u8,
    pub name: String,
    pub counters: ChannelCounters,
    pub pending: usize,
    pub active: usize,
    pub history: usize,
    pub blasting: bool,
    pub dequeue_enabled: bool,
    /// One flag per poll directory slot.
    pub poll_enabled: Vec<bool>,
}

/// Fault counters, one per condition code the engine reports on failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FaultCounters {
    pub no_error: u64,
    pub ack_limit: u64,
    pub filestore_rejection: u64,
    pub checksum_failure: u64,
    pub file_size_error: u64,
    pub nak_limit: u64,
    pub inactivity: u64,
    pub suspend_requests: u64,
    pub cancel_requests: u64,
}

impl FaultCounters {
    /// Counts `condition`. Returns `false` for codes with no counter.
    pub fn record(&mut self, condition: ConditionCode) -> bool {
        let counter = match condition {
            ConditionCode::NoError => &mut self.no_error,
            ConditionCode::PositiveAckLimitReached => &mut self.ack_limit,
            ConditionCode::FilestoreRejection => &mut self.filestore_rejection,
            ConditionCode::FileChecksumFailure => &mut self.checksum_failure,
            ConditionCode::FileSizeError => &mut self.file_size_error,
            ConditionCode::NakLimitReached => &mut self.nak_limit,
            ConditionCode::InactivityDetected => &mut self.inactivity,
            ConditionCode::SuspendRequestReceived => &mut self.suspend_requests,
            ConditionCode::CancelRequestReceived => &mut self.cancel_requests,
            _ => return false,
        };
        *counter += 1;
        true
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AutoSuspendHousekeeping {
    pub enabled: bool,
    pub low_free_mark: usize,
}

/// Complete housekeeping snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Housekeeping {
    pub command_counter: u64,
    pub error_counter: u64,
    pub app: AppCounters,
    pub uplink: UplinkCounters,
    pub channels: Vec<ChannelHousekeeping>,
    pub faults: FaultCounters,
    pub auto_suspend: AutoSuspendHousekeeping,
}

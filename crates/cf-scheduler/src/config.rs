//! Configuration for the transfer scheduler
//!
//! Loaded from JSON. Every in-use channel and poll directory is validated
//! before the scheduler accepts the table.

use crate::domain::entities::{Preserve, TransferClass};
use crate::domain::errors::ConfigError;
use crate::domain::value_objects::{validate_file_path, validate_source_dir, EntityId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One polling directory slot on a playback channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollDirConfig {
    pub in_use: bool,
    pub enabled: bool,
    /// 1 (unacknowledged) or 2 (acknowledged)
    pub class: u8,
    pub priority: u8,
    pub preserve: Preserve,
    pub peer_entity_id: String,
    /// Must end in `/`
    pub source_dir: String,
    pub dest_dir: String,
}

impl PollDirConfig {
    pub fn transfer_class(&self) -> Option<TransferClass> {
        TransferClass::from_number(self.class)
    }
}

/// One outbound (playback) channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub in_use: bool,
    pub dequeue_enabled: bool,
    pub pending_depth: usize,
    pub history_depth: usize,
    pub name: String,
    /// Name of the downstream flow-control token, if one is expected
    pub handshake: Option<String>,
    #[serde(default)]
    pub poll_dirs: Vec<PollDirConfig>,
}

/// Scheduler configuration table
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Local entity id, dotted decimal
    pub flight_entity_id: String,
    pub uplink_history_depth: usize,
    pub engine_cycles_per_wakeup: u32,
    pub wakeups_per_queue_check: u32,
    pub wakeups_per_poll_check: u32,
    /// Record pool capacity
    pub max_queue_records: usize,
    pub auto_suspend_enabled: bool,
    pub auto_suspend_capacity: usize,
    pub max_path_length: usize,
    /// Output channel for inbound class 2 responses
    pub class2_response_channel: u8,
    pub channels: Vec<ChannelConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            flight_entity_id: "0.24".to_string(),
            uplink_history_depth: 100,
            engine_cycles_per_wakeup: 4,
            wakeups_per_queue_check: 2,
            wakeups_per_poll_check: 4,
            max_queue_records: 400,
            auto_suspend_enabled: false,
            auto_suspend_capacity: 4,
            max_path_length: 64,
            class2_response_channel: 0,
            channels: vec![ChannelConfig {
                in_use: true,
                dequeue_enabled: true,
                pending_depth: 100,
                history_depth: 100,
                name: "TOPBOutputChan0".to_string(),
                handshake: Some("CFTOSemId".to_string()),
                poll_dirs: vec![PollDirConfig {
                    in_use: true,
                    enabled: false,
                    class: 1,
                    priority: 5,
                    preserve: Preserve::Keep,
                    peer_entity_id: "0.23".to_string(),
                    source_dir: "/cf/ch0poll0/".to_string(),
                    dest_dir: "cftesting/".to_string(),
                }],
            }],
        }
    }
}

impl SchedulerConfig {
    /// Small two-channel table with shallow queues, for tests.
    pub fn for_testing() -> Self {
        let channel = |n: u8| ChannelConfig {
            in_use: true,
            dequeue_enabled: true,
            pending_depth: 8,
            history_depth: 3,
            name: format!("TestChan{n}"),
            handshake: None,
            poll_dirs: vec![PollDirConfig {
                in_use: true,
                enabled: false,
                class: 1,
                priority: 5,
                preserve: Preserve::Keep,
                peer_entity_id: "0.23".to_string(),
                source_dir: format!("/poll/ch{n}/"),
                dest_dir: "dst/".to_string(),
            }],
        };

        Self {
            flight_entity_id: "0.24".to_string(),
            uplink_history_depth: 3,
            engine_cycles_per_wakeup: 1,
            wakeups_per_queue_check: 1,
            wakeups_per_poll_check: 1,
            max_queue_records: 32,
            auto_suspend_enabled: false,
            auto_suspend_capacity: 2,
            max_path_length: 64,
            class2_response_channel: 0,
            channels: vec![channel(0), channel(1)],
        }
    }

    /// Parses and validates a JSON table.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks every in-use entry, counting all violations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if EntityId::parse(&self.flight_entity_id).is_err() {
            errors.push(format!(
                "flight_entity_id {} must be dotted decimal like 0.24",
                self.flight_entity_id
            ));
        }
        if self.uplink_history_depth == 0 {
            errors.push("uplink_history_depth must be non-zero".to_string());
        }
        if self.max_queue_records == 0 {
            errors.push("max_queue_records must be non-zero".to_string());
        }
        if self.channels.len() > usize::from(u8::MAX) + 1 {
            errors.push(format!("{} channels exceeds 256", self.channels.len()));
        }
        match self.channels.get(usize::from(self.class2_response_channel)) {
            Some(channel) if channel.in_use => {}
            _ => errors.push(format!(
                "class2_response_channel {} is not an in-use channel",
                self.class2_response_channel
            )),
        }

        for (i, channel) in self.channels.iter().enumerate().filter(|(_, c)| c.in_use) {
            if channel.pending_depth == 0 || channel.history_depth == 0 {
                errors.push(format!("channel {i} queue depths must be non-zero"));
            }

            for (j, dir) in channel.poll_dirs.iter().enumerate().filter(|(_, d)| d.in_use) {
                if dir.transfer_class().is_none() {
                    errors.push(format!(
                        "channel {i} poll {j} class {} must be 1 or 2",
                        dir.class
                    ));
                }
                if validate_source_dir(&dir.source_dir, self.max_path_length).is_err() {
                    errors.push(format!(
                        "channel {i} poll {j} source_dir must have no spaces and end in /"
                    ));
                }
                if !dir.dest_dir.is_empty()
                    && validate_file_path(&dir.dest_dir, self.max_path_length).is_err()
                {
                    errors.push(format!("channel {i} poll {j} dest_dir must have no spaces"));
                }
                if EntityId::parse(&dir.peer_entity_id).is_err() {
                    errors.push(format!(
                        "channel {i} poll {j} peer_entity_id {} must be dotted decimal",
                        dir.peer_entity_id
                    ));
                }
            }
        }

        match errors.first() {
            None => Ok(()),
            Some(first) => Err(ConfigError::Invalid {
                count: errors.len(),
                first: first.clone(),
            }),
        }
    }
}

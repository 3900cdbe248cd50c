//! Loopback harness rooted in a temporary directory.
//!
//! ```text
//! <tmp>/src/    files queued by command
//! <tmp>/poll/   channel 0 poll directory (disabled until enabled)
//! <tmp>/rx/     loopback receive root
//! ```

use cf_runtime::{flush_output, LoopbackEngine, TracingSink};
use cf_scheduler::{
    ChannelConfig, EntityId, FileScheduler, LocalFileStore, PlaybackQueue, PlaybackRequest,
    PollDirConfig, Preserve, QueueRef, SchedulerConfig, TransactionRecord, TransferClass,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub type LoopbackScheduler = FileScheduler<LoopbackEngine, LocalFileStore, TracingSink>;

pub const FLIGHT: EntityId = EntityId::new(0, 24);

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Single channel table with every period at one wakeup.
pub fn harness_config(root: &Path) -> SchedulerConfig {
    SchedulerConfig {
        flight_entity_id: FLIGHT.to_string(),
        uplink_history_depth: 8,
        engine_cycles_per_wakeup: 4,
        wakeups_per_queue_check: 1,
        wakeups_per_poll_check: 1,
        max_queue_records: 32,
        auto_suspend_enabled: false,
        auto_suspend_capacity: 4,
        max_path_length: 128,
        class2_response_channel: 0,
        channels: vec![ChannelConfig {
            in_use: true,
            dequeue_enabled: true,
            pending_depth: 16,
            history_depth: 16,
            name: "LoopChan0".to_string(),
            handshake: None,
            poll_dirs: vec![PollDirConfig {
                in_use: true,
                enabled: false,
                class: 2,
                priority: 3,
                preserve: Preserve::Delete,
                peer_entity_id: "0.23".to_string(),
                source_dir: format!("{}/", path_string(&root.join("poll"))),
                dest_dir: "/polled/".to_string(),
            }],
        }],
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub scheduler: LoopbackScheduler,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Builds the harness after `adjust` has edited the default table.
    pub fn with_config(adjust: impl FnOnce(&mut SchedulerConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["src", "poll", "rx"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }

        let mut config = harness_config(dir.path());
        adjust(&mut config);

        let engine = LoopbackEngine::new(FLIGHT, dir.path().join("rx"));
        let scheduler =
            FileScheduler::new(config, engine, LocalFileStore::new(), TracingSink::new()).unwrap();
        Self { dir, scheduler }
    }

    /// Writes `bytes` to `<tmp>/src/<name>` and returns the full path.
    pub fn write_source(&self, name: &str, bytes: &[u8]) -> String {
        let path = self.dir.path().join("src").join(name);
        fs::write(&path, bytes).unwrap();
        path_string(&path)
    }

    pub fn write_poll(&self, name: &str, bytes: &[u8]) -> String {
        let path = self.dir.path().join("poll").join(name);
        fs::write(&path, bytes).unwrap();
        path_string(&path)
    }

    pub fn delivered(&self, dest_file: &str) -> PathBuf {
        self.dir.path().join("rx").join(dest_file.trim_start_matches('/'))
    }

    pub fn request(&self, source_file: &str, dest_file: &str, priority: u8) -> PlaybackRequest {
        PlaybackRequest {
            channel: 0,
            class: TransferClass::Acknowledged,
            priority,
            preserve: Preserve::Keep,
            peer_entity: "0.23".to_string(),
            source_file: source_file.to_string(),
            dest_file: dest_file.to_string(),
        }
    }

    /// One runtime tick: wakeup then drain output.
    pub fn tick(&mut self) {
        self.scheduler.wakeup();
        flush_output(&mut self.scheduler);
    }

    pub fn run(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Ticks until nothing is pending, active, in flight or queued for
    /// output. Returns the ticks taken.
    pub fn run_until_idle(&mut self, max_ticks: usize) -> usize {
        for tick in 0..max_ticks {
            if self.is_idle() {
                return tick;
            }
            self.tick();
        }
        panic!("scheduler still busy after {max_ticks} ticks");
    }

    pub fn is_idle(&self) -> bool {
        let engine = self.scheduler.engine();
        self.len(PlaybackQueue::Pending) == 0
            && self.len(PlaybackQueue::Active) == 0
            && engine.in_flight() == 0
            && engine.outbox_len() == 0
    }

    pub fn len(&self, queue: PlaybackQueue) -> usize {
        self.scheduler
            .queue_len(QueueRef::playback(0, queue))
            .unwrap()
    }

    /// Records front first.
    pub fn records(&self, queue: PlaybackQueue) -> Vec<TransactionRecord> {
        self.scheduler
            .records_in(QueueRef::playback(0, queue))
            .unwrap()
    }
}

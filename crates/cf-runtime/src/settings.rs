//! Runtime settings, read from the environment.

use cf_scheduler::{ConfigError, SchedulerConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct RuntimeSettings {
    /// Scheduler table. The built-in default is used when unset.
    pub config_path: Option<PathBuf>,
    pub wakeup_interval: Duration,
    /// Directory the loopback engine delivers into.
    pub receive_root: PathBuf,
    pub handshake_permits: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            config_path: None,
            wakeup_interval: Duration::from_millis(1000),
            receive_root: PathBuf::from("cf_received"),
            handshake_permits: 8,
        }
    }
}

impl RuntimeSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Unparseable values keep the default.
    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(path) = lookup("CF_CONFIG") {
            settings.config_path = Some(PathBuf::from(path));
        }
        if let Some(ms) = lookup("CF_WAKEUP_MS") {
            match ms.parse::<u64>() {
                Ok(ms) if ms > 0 => settings.wakeup_interval = Duration::from_millis(ms),
                _ => warn!(value = %ms, "CF_WAKEUP_MS must be a positive integer"),
            }
        }
        if let Some(root) = lookup("CF_RECEIVE_ROOT") {
            settings.receive_root = PathBuf::from(root);
        }
        if let Some(permits) = lookup("CF_HANDSHAKE_PERMITS") {
            match permits.parse() {
                Ok(p) => settings.handshake_permits = p,
                Err(_) => warn!(value = %permits, "CF_HANDSHAKE_PERMITS must be an integer"),
            }
        }

        settings
    }

    pub fn scheduler_config(&self) -> Result<SchedulerConfig, ConfigError> {
        match &self.config_path {
            Some(path) => {
                info!(path = %path.display(), "Loading scheduler table");
                SchedulerConfig::load(path)
            }
            None => {
                info!("Using built-in scheduler table");
                let config = SchedulerConfig::default();
                config.validate()?;
                Ok(config)
            }
        }
    }
}

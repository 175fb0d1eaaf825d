use std::path::PathBuf;

use tokio::time::Duration;

use crate::driver::DriverIntervals;
use crate::poller::{PollerConfig, DEFAULT_JUMP_TOLERANCE_SECS};
use crate::timer::DEFAULT_GRACE_POLLS;

pub const DEFAULT_STORE_FILE: &str = "flowcue-store.json";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Runtime knobs for one companion process.
#[derive(Debug, Clone)]
pub struct CompanionConfig {
    pub store_path: PathBuf,
    /// Directory holding the `audio/` bundle.
    pub asset_root: PathBuf,
    pub poll_interval: Duration,
    pub tick_interval: Duration,
    pub grace_polls: u32,
    pub jump_tolerance_secs: u32,
    /// Forward session-sync changes to stdout.
    pub relay: bool,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            asset_root: PathBuf::from("."),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            tick_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            grace_polls: DEFAULT_GRACE_POLLS,
            jump_tolerance_secs: DEFAULT_JUMP_TOLERANCE_SECS,
            relay: true,
        }
    }
}

impl CompanionConfig {
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            grace_polls: self.grace_polls.max(1),
            jump_tolerance_secs: self.jump_tolerance_secs,
            ..PollerConfig::default()
        }
    }

    pub fn intervals(&self) -> DriverIntervals {
        // A zero period would make tokio's interval panic.
        let floor = Duration::from_millis(10);
        DriverIntervals {
            poll: self.poll_interval.max(floor),
            tick: self.tick_interval.max(floor),
        }
    }
}

#![allow(dead_code)]

use sigwatch::config::{ConfigFile, RawConfigFile};
use sigwatch::types::{BackpressurePolicy, DuplicatePolicy};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in defaults with the status reporter switched off,
/// so tests only see the components they exercise.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.status.enabled = false;
        Self { config }
    }

    pub fn with_dwell_ms(mut self, ms: u64) -> Self {
        self.config.coalesce.dwell_ms = ms;
        self
    }

    pub fn with_poll_ms(mut self, ms: u64) -> Self {
        self.config.coalesce.poll_ms = ms;
        self
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.config.coalesce.policy = policy;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue.capacity = capacity;
        self
    }

    pub fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.config.queue.backpressure = policy;
        self
    }

    pub fn with_workers(mut self, count: usize) -> Self {
        self.config.workers.count = count;
        self
    }

    pub fn with_scan_timeout_ms(mut self, ms: u64) -> Self {
        self.config.workers.scan_timeout_ms = ms;
        self
    }

    pub fn with_status(mut self, enabled: bool) -> Self {
        self.config.status.enabled = enabled;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

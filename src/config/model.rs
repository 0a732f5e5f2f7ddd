// src/config/model.rs

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{BackpressurePolicy, DuplicatePolicy, MatcherKind};

/// Default location of the signature file, relative to the executable.
pub const DEFAULT_SIGNATURES_RELATIVE: &str = "sig/malware.sig";

/// Default name of the single-instance lock file inside the temp directory.
pub const DEFAULT_LOCK_FILE_NAME: &str = "sigwatch.lock";

/// Configuration exactly as deserialized from TOML, before validation.
///
/// ```toml
/// [coalesce]
/// dwell_ms = 5000
/// policy = "containment"
///
/// [queue]
/// capacity = 4096
/// backpressure = "block"
///
/// [workers]
/// count = 3
///
/// [matcher]
/// kind = "regex"
/// signatures = "/etc/sigwatch/malware.sig"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub coalesce: CoalesceSection,
    #[serde(default)]
    pub queue: QueueSection,
    #[serde(default)]
    pub workers: WorkersSection,
    #[serde(default)]
    pub status: StatusSection,
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub matcher: MatcherSection,
    #[serde(default)]
    pub lock: LockSection,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)`, so every
/// value here has passed the checks in `validate.rs`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub coalesce: CoalesceSection,
    pub queue: QueueSection,
    pub workers: WorkersSection,
    pub status: StatusSection,
    pub source: SourceSection,
    pub matcher: MatcherSection,
    pub lock: LockSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            coalesce: raw.coalesce,
            queue: raw.queue,
            workers: raw.workers,
            status: raw.status,
            source: raw.source,
            matcher: raw.matcher,
            lock: raw.lock,
        }
    }
}

/// `[coalesce]` section: dwell time, polling cadence and duplicate policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoalesceSection {
    /// Minimum time an event stays in the window before release.
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,

    /// How long the coalescer waits for a raw event before re-running the
    /// aging sweep anyway.
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,

    /// Resolution of arrival ticks.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default)]
    pub policy: DuplicatePolicy,

    /// Capacity of the raw event channel between source and coalescer.
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

fn default_dwell_ms() -> u64 {
    5_000
}

fn default_poll_ms() -> u64 {
    100
}

fn default_tick_ms() -> u64 {
    1
}

fn default_inbox_capacity() -> usize {
    8_192
}

impl Default for CoalesceSection {
    fn default() -> Self {
        Self {
            dwell_ms: default_dwell_ms(),
            poll_ms: default_poll_ms(),
            tick_ms: default_tick_ms(),
            policy: DuplicatePolicy::default(),
            inbox_capacity: default_inbox_capacity(),
        }
    }
}

impl CoalesceSection {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// `[queue]` section: work queue bound and what happens at the bound.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueSection {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    #[serde(default)]
    pub backpressure: BackpressurePolicy,
}

fn default_queue_capacity() -> usize {
    4_096
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            backpressure: BackpressurePolicy::default(),
        }
    }
}

/// `[workers]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkersSection {
    #[serde(default = "default_worker_count")]
    pub count: usize,

    /// Upper bound on a single scan. A hung matcher only stalls its worker
    /// for this long.
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,
}

fn default_worker_count() -> usize {
    3
}

fn default_scan_timeout_ms() -> u64 {
    30_000
}

impl Default for WorkersSection {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            scan_timeout_ms: default_scan_timeout_ms(),
        }
    }
}

impl WorkersSection {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }
}

/// `[status]` section: the periodic queue gauge.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_status_interval_ms")]
    pub interval_ms: u64,

    /// Column budget for the widest bar.
    #[serde(default = "default_status_columns")]
    pub columns: usize,

    /// Depth below which the gauge scale stops shrinking.
    #[serde(default = "default_status_floor")]
    pub floor: usize,

    /// Clear the terminal before every gauge so it redraws in place.
    /// Unset means: redraw when stderr is a terminal, scroll otherwise.
    #[serde(default)]
    pub redraw: Option<bool>,
}

fn default_true() -> bool {
    true
}

fn default_status_interval_ms() -> u64 {
    200
}

fn default_status_columns() -> usize {
    80
}

fn default_status_floor() -> usize {
    6_400
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_status_interval_ms(),
            columns: default_status_columns(),
            floor: default_status_floor(),
            redraw: None,
        }
    }
}

impl StatusSection {
    /// Whether gauges overwrite each other on this run.
    pub fn redraw_in_place(&self) -> bool {
        self.redraw
            .unwrap_or_else(|| std::io::stderr().is_terminal())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// `[source]` section: what to watch and what to ignore.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    #[serde(default = "default_roots")]
    pub roots: Vec<PathBuf>,

    /// Scratch area whose churn is never forwarded. If `None`, the system
    /// temporary directory is used.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Extra glob patterns to drop at the source.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Forward removal notifications too. Off by default: a removed file
    /// can never be scanned.
    #[serde(default)]
    pub include_removals: bool,

    /// Forward read-only accesses too. Off by default: the scanners' own
    /// reads would feed back into the pipeline.
    #[serde(default)]
    pub include_reads: bool,

    /// Notifications buffered between the OS watcher and the async side.
    /// When full, further notifications are dropped and counted.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("/")]
}

fn default_channel_capacity() -> usize {
    8192
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            scratch_dir: None,
            exclude: Vec::new(),
            include_removals: false,
            include_reads: false,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl SourceSection {
    /// Effective scratch directory.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// `[matcher]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatcherSection {
    #[serde(default)]
    pub kind: MatcherKind,

    /// Signature file. If `None`, `sig/malware.sig` next to the executable.
    #[serde(default)]
    pub signatures: Option<PathBuf>,

    /// Program used by the external matcher.
    #[serde(default = "default_matcher_program")]
    pub program: PathBuf,
}

fn default_matcher_program() -> PathBuf {
    PathBuf::from("/bin/egrep")
}

impl Default for MatcherSection {
    fn default() -> Self {
        Self {
            kind: MatcherKind::default(),
            signatures: None,
            program: default_matcher_program(),
        }
    }
}

impl MatcherSection {
    /// Effective signature file path.
    pub fn signatures_path(&self) -> PathBuf {
        match self.signatures {
            Some(ref p) => p.clone(),
            None => default_signatures_path(),
        }
    }
}

/// `sig/malware.sig` in the directory holding the running executable, or
/// relative to the working directory if that can't be determined.
pub fn default_signatures_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_SIGNATURES_RELATIVE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SIGNATURES_RELATIVE))
}

/// `[lock]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockSection {
    /// Lock file path. If `None`, `sigwatch.lock` in the temp directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl LockSection {
    pub fn lock_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_LOCK_FILE_NAME))
    }
}

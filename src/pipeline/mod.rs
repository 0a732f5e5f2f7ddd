// src/pipeline/mod.rs

//! Event coalescing and dispatch pipeline.
//!
//! ```text
//! source --(inbox)--> Coalescer --(WorkQueue)--> Worker x N --> log
//!                        |                          |
//!                        +------ StatusReporter ----+
//! ```
//!
//! - [`window`] is the pure coalescing window (no Tokio, no clocks).
//! - [`clock`] turns elapsed time into arrival ticks.
//! - [`coalescer`] is the async loop that owns the window.
//! - [`work_queue`] is the bounded hand-off between coalescer and workers.
//! - [`worker`] runs the scans.
//! - [`status`] renders the backlog gauge.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ConfigFile;
use crate::fs::FileSystem;
use crate::matcher::SignatureMatcher;

pub mod clock;
pub mod coalescer;
pub mod status;
pub mod window;
pub mod work_queue;
pub mod worker;

pub use clock::{Tick, TickClock};
pub use coalescer::{Coalescer, WindowDepth};
pub use status::{StatusReporter, StatusSample};
pub use window::{Admission, CoalescingWindow, PendingEntry};
pub use work_queue::{PushOutcome, WorkQueue};
pub use worker::{ScanResult, ScanStats, Worker, WorkerPool};

/// A file-path notification. Two events are the same event iff their paths
/// are byte-for-byte equal.
///
/// The path is kept as the raw OS string: names that are not valid UTF-8
/// must still reach the scanner unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Event(OsString);

impl Event {
    pub fn new(path: impl Into<OsString>) -> Self {
        Self(path.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(path.as_os_str().to_os_string())
    }

    pub fn as_os_str(&self) -> &OsStr {
        &self.0
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Lossy UTF-8 rendering, for logs and display only.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        self.0.to_string_lossy()
    }

    /// Whether this event's path contains `other`'s path as a substring.
    pub fn contains(&self, other: &Event) -> bool {
        let haystack = self.0.as_encoded_bytes();
        let needle = other.0.as_encoded_bytes();
        needle.is_empty()
            || haystack
                .windows(needle.len())
                .any(|window| window == needle)
    }

    pub fn into_os_string(self) -> OsString {
        self.0
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

impl From<&str> for Event {
    fn from(s: &str) -> Self {
        Self(OsString::from(s))
    }
}

impl From<String> for Event {
    fn from(s: String) -> Self {
        Self(OsString::from(s))
    }
}

impl From<&Path> for Event {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}

impl From<PathBuf> for Event {
    fn from(path: PathBuf) -> Self {
        Self(path.into_os_string())
    }
}

/// A running pipeline: coalescer, worker pool and (optionally) the status
/// reporter, all stopped by one cancellation token.
pub struct Pipeline {
    queue: Arc<WorkQueue>,
    window_depth: WindowDepth,
    stats: Arc<ScanStats>,
    cancel: CancellationToken,
    coalescer: JoinHandle<()>,
    workers: WorkerPool,
    status: Option<JoinHandle<()>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("queue_depth", &self.queue.len())
            .field("window_depth", &self.window_depth.get())
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Wire up and start every pipeline component.
    ///
    /// Returns the pipeline and the sender side of its raw event inbox. The
    /// pipeline keeps no sender of its own: once every returned sender is
    /// dropped, the coalescer releases whatever is still pending and exits.
    pub fn spawn(
        cfg: &ConfigFile,
        matcher: Arc<dyn SignatureMatcher>,
        fs: Arc<dyn FileSystem>,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Sender<Event>) {
        let (inbox_tx, inbox_rx) = mpsc::channel::<Event>(cfg.coalesce.inbox_capacity);
        let queue = Arc::new(WorkQueue::new(cfg.queue.capacity, cfg.queue.backpressure));

        let coalescer = Coalescer::new(&cfg.coalesce, inbox_rx, Arc::clone(&queue));
        let window_depth = coalescer.depth_handle();
        let coalescer = {
            let cancel = cancel.clone();
            tokio::spawn(coalescer.run(cancel))
        };

        let stats = Arc::new(ScanStats::default());
        let workers = WorkerPool::spawn(
            cfg.workers.count,
            Arc::clone(&queue),
            matcher,
            fs,
            cfg.workers.scan_timeout(),
            Arc::clone(&stats),
            cancel.clone(),
        );

        let status = if cfg.status.enabled {
            let reporter = StatusReporter::new(
                cfg.status.clone(),
                Arc::clone(&queue),
                window_depth.clone(),
                Some(inbox_tx.downgrade()),
            );
            Some(tokio::spawn(reporter.run(cancel.clone())))
        } else {
            None
        };

        info!(
            workers = cfg.workers.count,
            dwell_ms = cfg.coalesce.dwell_ms,
            policy = ?cfg.coalesce.policy,
            queue_capacity = cfg.queue.capacity,
            backpressure = ?cfg.queue.backpressure,
            "pipeline started"
        );

        let pipeline = Self {
            queue,
            window_depth,
            stats,
            cancel,
            coalescer,
            workers,
            status,
        };
        (pipeline, inbox_tx)
    }

    pub fn work_queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub fn window_depth(&self) -> &WindowDepth {
        &self.window_depth
    }

    pub fn stats(&self) -> &Arc<ScanStats> {
        &self.stats
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Request shutdown and wait for every component to stop.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.join().await;
    }

    /// Wait for every component to stop (after the token is cancelled).
    pub async fn join(self) {
        let Pipeline {
            coalescer,
            workers,
            status,
            ..
        } = self;

        if let Err(e) = coalescer.await {
            debug!(error = %e, "coalescer task ended abnormally");
        }
        workers.join().await;
        if let Some(status) = status {
            if let Err(e) = status.await {
                debug!(error = %e, "status task ended abnormally");
            }
        }
        info!("pipeline stopped");
    }
}

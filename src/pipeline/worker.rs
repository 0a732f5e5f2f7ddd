// src/pipeline/worker.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::work_queue::WorkQueue;
use super::Event;
use crate::fs::FileSystem;
use crate::matcher::SignatureMatcher;

/// Outcome of scanning one event. Never queued or stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub event: Event,
    pub matched: bool,
    pub match_text: Option<String>,
}

/// Running counters across the whole pool.
#[derive(Debug, Default)]
pub struct ScanStats {
    scanned: AtomicU64,
    matched: AtomicU64,
    vanished: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

impl ScanStats {
    pub fn scanned(&self) -> u64 {
        self.scanned.load(Ordering::Relaxed)
    }

    pub fn matched(&self) -> u64 {
        self.matched.load(Ordering::Relaxed)
    }

    pub fn vanished(&self) -> u64 {
        self.vanished.load(Ordering::Relaxed)
    }

    /// Paths that exist but aren't regular files (directories, mostly).
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Events a worker has finished with, whatever the outcome.
    pub fn handled(&self) -> u64 {
        self.scanned() + self.vanished() + self.skipped() + self.failed() + self.timed_out()
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// A single scanning loop.
///
/// Every per-item problem (vanished file, matcher error, matcher panic,
/// timeout) is logged and absorbed here; nothing ends the loop except
/// cancellation.
#[derive(Debug, Clone)]
pub struct Worker {
    id: usize,
    queue: Arc<WorkQueue>,
    matcher: Arc<dyn SignatureMatcher>,
    fs: Arc<dyn FileSystem>,
    scan_timeout: Duration,
    stats: Arc<ScanStats>,
}

impl Worker {
    pub fn new(
        id: usize,
        queue: Arc<WorkQueue>,
        matcher: Arc<dyn SignatureMatcher>,
        fs: Arc<dyn FileSystem>,
        scan_timeout: Duration,
        stats: Arc<ScanStats>,
    ) -> Self {
        Self {
            id,
            queue,
            matcher,
            fs,
            scan_timeout,
            stats,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        debug!(worker = self.id, matcher = self.matcher.name(), "worker started");

        while let Some(event) = self.queue.pop(&cancel).await {
            trace!(worker = self.id, queue_depth = self.queue.len(), event = %event, "dequeued");
            self.handle_event(event).await;
        }

        debug!(worker = self.id, "worker stopped");
    }

    /// Scan one event.
    ///
    /// Returns `None` when there is nothing to report about the file: it
    /// no longer exists, isn't a regular file, or the scan failed or timed
    /// out (those are logged).
    pub async fn handle_event(&self, event: Event) -> Option<ScanResult> {
        let scan = self.spawn_scan(event.path().to_path_buf());
        let abort = scan.abort_handle();

        let outcome = match tokio::time::timeout(self.scan_timeout, scan).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => {
                info!(worker = self.id, event = %event, error = %join_err, "matcher panicked; continuing");
                ScanStats::bump(&self.stats.failed);
                return None;
            }
            Err(_elapsed) => {
                abort.abort();
                info!(
                    worker = self.id,
                    event = %event,
                    timeout = ?self.scan_timeout,
                    "scan timed out; continuing"
                );
                ScanStats::bump(&self.stats.timed_out);
                return None;
            }
        };

        match outcome {
            Ok(ScanOutcome::Vanished) => {
                debug!(worker = self.id, event = %event, "file vanished before scan; skipping");
                ScanStats::bump(&self.stats.vanished);
                None
            }
            Ok(ScanOutcome::NotAFile) => {
                trace!(worker = self.id, event = %event, "not a regular file; skipping");
                ScanStats::bump(&self.stats.skipped);
                None
            }
            Ok(ScanOutcome::Scanned(Some(text))) => {
                ScanStats::bump(&self.stats.scanned);
                ScanStats::bump(&self.stats.matched);
                warn!(worker = self.id, event = %event, "signature match\n{}", text);
                Some(ScanResult {
                    event,
                    matched: true,
                    match_text: Some(text),
                })
            }
            Ok(ScanOutcome::Scanned(None)) => {
                ScanStats::bump(&self.stats.scanned);
                trace!(worker = self.id, event = %event, "clean");
                Some(ScanResult {
                    event,
                    matched: false,
                    match_text: None,
                })
            }
            Err(err) => {
                ScanStats::bump(&self.stats.failed);
                info!(worker = self.id, event = %event, error = %err, "matcher failed; continuing");
                None
            }
        }
    }

    /// Stat and scan in a task of their own, so a matcher panic is contained
    /// and a timed-out scan can be aborted. The stat calls go through the
    /// blocking pool; the worker loop itself never touches the disk.
    fn spawn_scan(&self, path: PathBuf) -> JoinHandle<anyhow::Result<ScanOutcome>> {
        let matcher = Arc::clone(&self.matcher);
        let fs = Arc::clone(&self.fs);
        tokio::spawn(async move {
            let stat_path = path.clone();
            let is_file = tokio::task::spawn_blocking(move || {
                if !fs.exists(&stat_path) {
                    None
                } else {
                    Some(fs.is_file(&stat_path))
                }
            })
            .await?;

            match is_file {
                None => Ok(ScanOutcome::Vanished),
                Some(false) => Ok(ScanOutcome::NotAFile),
                Some(true) => matcher.scan(&path).await.map(ScanOutcome::Scanned),
            }
        })
    }
}

#[derive(Debug)]
enum ScanOutcome {
    Vanished,
    NotAFile,
    Scanned(Option<String>),
}

/// Fixed-size set of workers sharing one queue.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers (at least one).
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        count: usize,
        queue: Arc<WorkQueue>,
        matcher: Arc<dyn SignatureMatcher>,
        fs: Arc<dyn FileSystem>,
        scan_timeout: Duration,
        stats: Arc<ScanStats>,
        cancel: CancellationToken,
    ) -> Self {
        let handles = (0..count.max(1))
            .map(|id| {
                let worker = Worker::new(
                    id,
                    Arc::clone(&queue),
                    Arc::clone(&matcher),
                    Arc::clone(&fs),
                    scan_timeout,
                    Arc::clone(&stats),
                );
                tokio::spawn(worker.run(cancel.clone()))
            })
            .collect();

        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit. In-flight scans finish first.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task ended abnormally");
            }
        }
    }
}

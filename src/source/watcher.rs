// src/source/watcher.rs

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::filter::{EventKindFilter, ScratchFilter};
use crate::config::SourceSection;
use crate::errors::{Result, SigwatchError};
use crate::pipeline::Event;

pub type RawNotification = notify::Result<notify::Event>;

/// A full buffer warns on the first drop and then every this many.
const DROP_WARN_EVERY: u64 = 1000;

/// Sending half of the notification buffer, used from notify's own thread.
///
/// Never blocks: when the buffer is full the notification is dropped and
/// counted, so a slow pipeline can't make memory grow without bound.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    tx: mpsc::Sender<RawNotification>,
    dropped: Arc<AtomicU64>,
}

/// Bounded buffer between the OS watcher and [`NotifySource`].
pub fn notification_channel(
    capacity: usize,
) -> (NotificationSink, mpsc::Receiver<RawNotification>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sink = NotificationSink {
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sink, rx)
}

impl NotificationSink {
    /// Hand a notification over. Returns `false` if it was dropped.
    pub fn push(&self, notification: RawNotification) -> bool {
        match self.tx.try_send(notification) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % DROP_WARN_EVERY == 0 {
                    warn!(
                        dropped,
                        capacity = self.tx.max_capacity(),
                        "notification buffer full; dropping file events"
                    );
                }
                false
            }
            Err(TrySendError::Closed(_)) => {
                trace!("notification buffer closed");
                false
            }
        }
    }

    /// Notifications dropped so far because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Filtered stream of filesystem events.
///
/// `next_event` waits for the next admitted path. A single notification
/// may carry several paths; they are handed out one at a time, in order.
pub struct NotifySource {
    raw_rx: mpsc::Receiver<RawNotification>,
    paths: ScratchFilter,
    kinds: EventKindFilter,
    ready: VecDeque<Event>,
    /// Keeps the OS watch alive for as long as the source exists.
    _watcher: Option<RecommendedWatcher>,
}

impl std::fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySource")
            .field("paths", &self.paths)
            .field("kinds", &self.kinds)
            .field("ready", &self.ready.len())
            .finish_non_exhaustive()
    }
}

impl NotifySource {
    /// Start a recursive `notify` watch on every configured root.
    ///
    /// Roots that can't be watched are skipped with a warning; if none can
    /// be watched at all, this fails.
    pub fn watch(settings: &SourceSection) -> Result<Self> {
        let paths = ScratchFilter::from_config(settings)?;
        let kinds = EventKindFilter::from_config(settings);

        let (sink, raw_rx) = notification_channel(settings.channel_capacity);

        let mut watcher = RecommendedWatcher::new(
            move |res: RawNotification| {
                sink.push(res);
            },
            Config::default(),
        )
        .map_err(|e| SigwatchError::Other(e.into()))?;

        let mut watched = 0usize;
        for root in settings.roots.iter() {
            match watcher.watch(root, RecursiveMode::Recursive) {
                Ok(()) => {
                    info!(root = ?root, "watching");
                    watched += 1;
                }
                Err(e) => warn!(root = ?root, error = %e, "cannot watch root; skipping"),
            }
        }
        if watched == 0 {
            return Err(SigwatchError::ConfigError(format!(
                "none of the configured roots could be watched: {:?}",
                settings.roots
            )));
        }

        let mut source = Self::from_channel(raw_rx, paths, kinds);
        source._watcher = Some(watcher);
        Ok(source)
    }

    /// Build a source over an existing notification channel.
    pub fn from_channel(
        raw_rx: mpsc::Receiver<RawNotification>,
        paths: ScratchFilter,
        kinds: EventKindFilter,
    ) -> Self {
        Self {
            raw_rx,
            paths,
            kinds,
            ready: VecDeque::new(),
            _watcher: None,
        }
    }

    /// Wait for the next admitted event. `None` once the notification
    /// channel has closed and everything buffered was handed out.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(event);
            }

            match self.raw_rx.recv().await? {
                Ok(notification) => self.accept(notification),
                Err(err) => warn!(error = %err, "file watch error"),
            }
        }
    }

    fn accept(&mut self, notification: notify::Event) {
        if !self.kinds.forwards(&notification.kind) {
            trace!(kind = ?notification.kind, "ignored event kind");
            return;
        }

        for path in notification.paths {
            if self.paths.admits(&path) {
                self.ready.push_back(Event::from_path(&path));
            } else {
                trace!(path = ?path, "filtered at source");
            }
        }
    }
}

/// Handle for the forwarding task. Dropping it does not stop the task;
/// cancel the token passed to [`spawn_source`] instead.
#[derive(Debug)]
pub struct SourceHandle {
    task: JoinHandle<()>,
}

impl SourceHandle {
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            debug!(error = %e, "source task ended abnormally");
        }
    }
}

/// Start watching and forward admitted events into the pipeline inbox.
pub fn spawn_source(
    settings: &SourceSection,
    inbox: mpsc::Sender<Event>,
    cancel: CancellationToken,
) -> Result<SourceHandle> {
    let source = NotifySource::watch(settings)?;
    let task = tokio::spawn(forward_events(source, inbox, cancel));
    Ok(SourceHandle { task })
}

/// Move events from `source` into `inbox` until cancelled, or until either
/// side closes.
pub async fn forward_events(
    mut source: NotifySource,
    inbox: mpsc::Sender<Event>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = source.next_event() => match event {
                Some(e) => e,
                None => {
                    debug!("notification channel closed");
                    break;
                }
            },
        };

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = inbox.send(event) => sent,
        };
        if sent.is_err() {
            debug!("pipeline inbox closed; stopping source");
            break;
        }
    }

    debug!("event source stopped");
}

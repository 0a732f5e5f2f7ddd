// src/pipeline/status.rs

//! Periodic backlog gauge.
//!
//! Every interval the reporter samples the work queue, the coalescing window
//! and the raw inbox, and logs something like:
//!
//! ```text
//! 2026-10-18 09:14:03
//!         Worker queue:
//! [1200  ] =============>
//!         Coalescing window:
//! [310   ] ===>
//!         Inbox:
//! [0     ] >
//! ```
//!
//! Bars share one scale so they stay comparable; the scale never drops
//! below `floor`, which keeps small backlogs from looking alarming, and is
//! chosen so the longest bar fits in `columns`.

use std::fmt::Write as _;
use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::coalescer::WindowDepth;
use super::work_queue::WorkQueue;
use super::Event;
use crate::config::StatusSection;

/// Clears the screen and homes the cursor, so the next gauge draws over
/// the last one.
pub const CLEAR_SCREEN: &[u8] = b"\x1b[2J\x1b[H";

/// One sample of the backlog. Recomputed each tick, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSample {
    pub timestamp: DateTime<Utc>,
    pub work_queue_depth: usize,
    pub coalesce_window_depth: usize,
    pub inbox_depth: usize,
}

/// Characters per unit of depth, as `depth / factor` bar characters.
pub fn scale_factor(sample: &StatusSample, columns: usize, floor: usize) -> usize {
    let widest = sample
        .work_queue_depth
        .max(sample.coalesce_window_depth)
        .max(sample.inbox_depth)
        .max(floor);
    ((widest as f64 * 1.1) / columns.max(1) as f64) as usize + 1
}

/// Render the multi-line gauge for a sample.
pub fn render_gauge(sample: &StatusSample, columns: usize, floor: usize) -> String {
    let factor = scale_factor(sample, columns, floor);
    let mut out = String::new();

    let _ = writeln!(out, "{}", sample.timestamp.format("%Y-%m-%d %H:%M:%S"));
    for (label, depth) in [
        ("Worker queue", sample.work_queue_depth),
        ("Coalescing window", sample.coalesce_window_depth),
        ("Inbox", sample.inbox_depth),
    ] {
        let _ = writeln!(out, "        {label}:");
        let _ = writeln!(out, "[{:<6}] {}>", depth, "=".repeat(depth / factor));
    }

    out
}

/// Side observer that never mutates what it samples.
#[derive(Debug)]
pub struct StatusReporter {
    settings: StatusSection,
    queue: Arc<WorkQueue>,
    window: WindowDepth,
    /// Weak so the reporter never keeps the inbox open.
    inbox: Option<mpsc::WeakSender<Event>>,
}

impl StatusReporter {
    pub fn new(
        settings: StatusSection,
        queue: Arc<WorkQueue>,
        window: WindowDepth,
        inbox: Option<mpsc::WeakSender<Event>>,
    ) -> Self {
        Self {
            settings,
            queue,
            window,
            inbox,
        }
    }

    pub fn sample(&self) -> StatusSample {
        let inbox_depth = self
            .inbox
            .as_ref()
            .and_then(|weak| weak.upgrade())
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0);

        StatusSample {
            timestamp: Utc::now(),
            work_queue_depth: self.queue.len(),
            coalesce_window_depth: self.window.get(),
            inbox_depth,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let redraw = self.settings.redraw_in_place();
        self.run_on(cancel, redraw, std::io::stderr()).await;
    }

    /// Like [`run`](Self::run), with the screen-clearing sequence going to
    /// `terminal` instead of stderr.
    pub async fn run_on<W: Write + Send>(
        self,
        cancel: CancellationToken,
        redraw: bool,
        mut terminal: W,
    ) {
        let mut ticker = tokio::time::interval(self.settings.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(interval = ?self.settings.interval(), redraw, "status reporter started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let sample = self.sample();
            let gauge = render_gauge(&sample, self.settings.columns, self.settings.floor);

            if redraw {
                let _ = terminal.write_all(CLEAR_SCREEN);
                let _ = terminal.flush();
            }
            info!("{}", gauge);
        }

        debug!("status reporter stopped");
    }
}

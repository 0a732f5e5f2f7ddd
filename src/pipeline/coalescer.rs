// src/pipeline/coalescer.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::clock::TickClock;
use super::window::{Admission, CoalescingWindow};
use super::work_queue::{PushOutcome, WorkQueue};
use super::Event;
use crate::config::CoalesceSection;

/// Read-only view of the coalescing window size.
///
/// The coalescer publishes the depth after every change; readers never touch
/// the window itself.
#[derive(Debug, Clone, Default)]
pub struct WindowDepth(Arc<AtomicUsize>);

impl WindowDepth {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn set(&self, depth: usize) {
        self.0.store(depth, Ordering::Relaxed);
    }
}

/// What one poll of the inbox produced.
enum Inbound {
    Event(Event),
    Idle,
    Closed,
}

/// Owns the coalescing window and moves expired events onto the work queue.
///
/// The loop:
/// 1. wait for a raw event, for at most the poll interval (or less, if the
///    head of the window expires sooner);
/// 2. offer it to the window (duplicates are dropped there);
/// 3. release every expired entry from the head, in order.
///
/// Step 3 runs on every iteration, with or without a new event.
#[derive(Debug)]
pub struct Coalescer {
    window: CoalescingWindow,
    clock: TickClock,
    poll: Duration,
    inbox: mpsc::Receiver<Event>,
    inbox_open: bool,
    queue: Arc<WorkQueue>,
    depth: WindowDepth,
}

impl Coalescer {
    pub fn new(
        settings: &CoalesceSection,
        inbox: mpsc::Receiver<Event>,
        queue: Arc<WorkQueue>,
    ) -> Self {
        let clock = TickClock::new(settings.tick());
        let dwell_ticks = clock.ticks_in(settings.dwell());
        Self {
            window: CoalescingWindow::new(settings.policy, dwell_ticks),
            clock,
            poll: settings.poll(),
            inbox,
            inbox_open: true,
            queue,
            depth: WindowDepth::default(),
        }
    }

    pub fn depth_handle(&self) -> WindowDepth {
        self.depth.clone()
    }

    pub fn window(&self) -> &CoalescingWindow {
        &self.window
    }

    /// Offer one raw event to the window at the current tick.
    pub fn submit(&mut self, event: Event) -> Admission {
        let admission = self.window.offer(event.clone(), self.clock.now());
        if let Admission::Accepted { depth } = admission {
            self.depth.set(depth);
            debug!(depth, event = %event, "sent to window");
        }
        admission
    }

    /// Move every expired head entry onto the work queue. Returns how many
    /// events were handed to the queue.
    pub async fn release_expired(&mut self, cancel: &CancellationToken) -> usize {
        let mut released = 0;

        while let Some(entry) = self.window.pop_expired(self.clock.now()) {
            self.depth.set(self.window.len());
            let event = entry.event;

            match self.queue.push(event.clone(), cancel).await {
                PushOutcome::Enqueued | PushOutcome::Evicted(_) => {
                    released += 1;
                    debug!(queue_depth = self.queue.len(), event = %event, "sent to work queue");
                }
                PushOutcome::Rejected(_) => {}
                PushOutcome::Cancelled(_) => {
                    debug!(event = %event, "shutdown while waiting for work queue space");
                    break;
                }
            }
        }

        released
    }

    /// How long the next inbox poll may wait.
    fn next_wait(&self) -> Duration {
        match self.window.ticks_until_head_expires(self.clock.now()) {
            Some(ticks) => self
                .poll
                .min(self.clock.duration_of(ticks.max(1))),
            None => self.poll,
        }
    }

    async fn poll_inbox(&mut self, wait: Duration) -> Inbound {
        if !self.inbox_open {
            tokio::time::sleep(wait).await;
            return Inbound::Idle;
        }
        match tokio::time::timeout(wait, self.inbox.recv()).await {
            Ok(Some(event)) => Inbound::Event(event),
            Ok(None) => Inbound::Closed,
            Err(_elapsed) => Inbound::Idle,
        }
    }

    /// Main loop. Runs until `cancel` fires, or until the inbox is closed and
    /// the window has fully drained.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            dwell_ticks = self.window.dwell_ticks(),
            tick = ?self.clock.resolution(),
            poll = ?self.poll,
            policy = ?self.window.policy(),
            "coalescer started"
        );

        loop {
            let wait = self.next_wait();

            let inbound = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                inbound = self.poll_inbox(wait) => inbound,
            };

            match inbound {
                Inbound::Event(event) => {
                    trace!(event = %event, "raw event");
                    self.submit(event);
                }
                Inbound::Idle => {}
                Inbound::Closed => {
                    debug!(pending = self.window.len(), "inbox closed; draining window");
                    self.inbox_open = false;
                }
            }

            self.release_expired(&cancel).await;

            if cancel.is_cancelled() {
                break;
            }
            if !self.inbox_open && self.window.is_empty() {
                break;
            }
        }

        info!(pending = self.window.len(), "coalescer stopped");
    }
}

// src/pipeline/work_queue.rs

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Event;
use crate::types::BackpressurePolicy;

/// What happened to an event handed to [`WorkQueue::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// Enqueued after evicting the oldest queued event (`drop-oldest`).
    Evicted(Event),
    /// Discarded because the queue was full (`drop-newest`).
    Rejected(Event),
    /// Shutdown was requested while waiting for room (`block`).
    Cancelled(Event),
}

/// Bounded FIFO between the coalescer (single producer) and the workers
/// (many consumers).
///
/// Semantics:
/// - Events come out in the order they went in.
/// - `pop` suspends on an empty queue without spinning; it returns `None`
///   once the cancellation token fires.
/// - At capacity, `push` follows the configured [`BackpressurePolicy`].
/// - `len` takes the lock only for the duration of a length read, so the
///   status reporter can sample it at any time.
#[derive(Debug)]
pub struct WorkQueue {
    items: Mutex<VecDeque<Event>>,
    capacity: usize,
    policy: BackpressurePolicy,
    /// Signalled when an event is pushed.
    item_ready: Notify,
    /// Signalled when an event is popped.
    space_ready: Notify,
}

impl WorkQueue {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize, policy: BackpressurePolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            policy,
            item_ready: Notify::new(),
            space_ready: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the queued events, oldest first.
    pub fn snapshot(&self) -> Vec<Event> {
        self.lock().iter().cloned().collect()
    }

    /// Enqueue an event, applying the backpressure policy if the queue is full.
    pub async fn push(&self, event: Event, cancel: &CancellationToken) -> PushOutcome {
        match self.policy {
            BackpressurePolicy::Block => self.push_blocking(event, cancel).await,
            BackpressurePolicy::DropOldest => {
                let evicted = {
                    let mut items = self.lock();
                    let evicted = if items.len() >= self.capacity {
                        items.pop_front()
                    } else {
                        None
                    };
                    items.push_back(event);
                    evicted
                };
                self.item_ready.notify_one();

                match evicted {
                    Some(old) => {
                        warn!(evicted = %old, capacity = self.capacity, "work queue full; dropped oldest event");
                        PushOutcome::Evicted(old)
                    }
                    None => PushOutcome::Enqueued,
                }
            }
            BackpressurePolicy::DropNewest => {
                {
                    let mut items = self.lock();
                    if items.len() >= self.capacity {
                        drop(items);
                        warn!(rejected = %event, capacity = self.capacity, "work queue full; dropped newest event");
                        return PushOutcome::Rejected(event);
                    }
                    items.push_back(event);
                }
                self.item_ready.notify_one();
                PushOutcome::Enqueued
            }
        }
    }

    async fn push_blocking(&self, event: Event, cancel: &CancellationToken) -> PushOutcome {
        let mut waited = false;
        loop {
            let space = self.space_ready.notified();
            tokio::pin!(space);
            // Register before checking, so a pop between the check and the
            // await still wakes us.
            space.as_mut().enable();

            {
                let mut items = self.lock();
                if items.len() < self.capacity {
                    items.push_back(event);
                    drop(items);
                    self.item_ready.notify_one();
                    return PushOutcome::Enqueued;
                }
            }

            if !waited {
                debug!(capacity = self.capacity, "work queue full; waiting for a worker");
                waited = true;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return PushOutcome::Cancelled(event),
                _ = &mut space => {}
            }
        }
    }

    /// Take the oldest event without waiting.
    pub fn try_pop(&self) -> Option<Event> {
        let (event, more) = {
            let mut items = self.lock();
            let event = items.pop_front();
            (event, !items.is_empty())
        };

        if event.is_some() {
            self.space_ready.notify_one();
            // Pass the wakeup along so a burst of pushes that collapsed into
            // one stored permit still reaches every idle consumer.
            if more {
                self.item_ready.notify_one();
            }
        }
        event
    }

    /// Wait for the oldest event. Returns `None` once `cancel` fires; no
    /// event is taken after that point.
    pub async fn pop(&self, cancel: &CancellationToken) -> Option<Event> {
        loop {
            let ready = self.item_ready.notified();
            tokio::pin!(ready);
            ready.as_mut().enable();

            if cancel.is_cancelled() {
                return None;
            }
            if let Some(event) = self.try_pop() {
                return Some(event);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = &mut ready => {}
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

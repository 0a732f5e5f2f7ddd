// src/pipeline/window.rs

//! The coalescing window.
//!
//! A FIFO of pending events, each stamped with the tick at which it was
//! first accepted. Entries are appended at the tail and leave only from the
//! head, once they are older than the dwell time. The structure is pure and
//! synchronous: the caller supplies the current tick, which keeps every
//! ordering and aging rule testable without a runtime.

use std::collections::{HashSet, VecDeque};

use tracing::trace;

use super::Event;
use super::clock::Tick;
use crate::types::DuplicatePolicy;

/// An accepted event waiting out its dwell time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub arrival_tick: Tick,
    pub event: Event,
}

/// Result of offering an event to the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Appended at the tail; `depth` is the window size afterwards.
    Accepted { depth: usize },
    /// Dropped because a pending entry already covers it. The covering
    /// entry keeps its original arrival tick.
    Duplicate { covered_by: Event },
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted { .. })
    }
}

#[derive(Debug)]
pub struct CoalescingWindow {
    entries: VecDeque<PendingEntry>,
    /// Exact-match index over `entries`, so the common "same path again"
    /// case never needs a scan.
    pending: HashSet<Event>,
    policy: DuplicatePolicy,
    dwell_ticks: Tick,
    last_tick: Tick,
}

impl CoalescingWindow {
    pub fn new(policy: DuplicatePolicy, dwell_ticks: Tick) -> Self {
        Self {
            entries: VecDeque::new(),
            pending: HashSet::new(),
            policy,
            dwell_ticks,
            last_tick: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn dwell_ticks(&self) -> Tick {
        self.dwell_ticks
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &PendingEntry> {
        self.entries.iter()
    }

    /// The pending event that covers `event` under the configured policy.
    pub fn find_cover(&self, event: &Event) -> Option<&Event> {
        if let Some(existing) = self.pending.get(event) {
            return Some(existing);
        }
        match self.policy {
            DuplicatePolicy::Exact => None,
            DuplicatePolicy::Containment => self
                .entries
                .iter()
                .map(|entry| &entry.event)
                .find(|pending| pending.contains(event)),
        }
    }

    /// Offer an event observed at tick `now`.
    ///
    /// Arrival ticks never go backwards: if `now` is older than the newest
    /// entry, the entry is stamped with the newest tick instead, so the
    /// window stays sorted by arrival.
    pub fn offer(&mut self, event: Event, now: Tick) -> Admission {
        if let Some(cover) = self.find_cover(&event) {
            trace!(event = %event, covered_by = %cover, "duplicate dropped");
            return Admission::Duplicate {
                covered_by: cover.clone(),
            };
        }

        let arrival_tick = now.max(self.last_tick);
        self.last_tick = arrival_tick;
        self.pending.insert(event.clone());
        self.entries.push_back(PendingEntry {
            arrival_tick,
            event,
        });

        Admission::Accepted {
            depth: self.entries.len(),
        }
    }

    /// Whether the head entry has been pending for longer than the dwell time.
    pub fn head_expired(&self, now: Tick) -> bool {
        self.entries
            .front()
            .is_some_and(|head| now.saturating_sub(head.arrival_tick) > self.dwell_ticks)
    }

    /// Pop the head entry if it has expired.
    pub fn pop_expired(&mut self, now: Tick) -> Option<PendingEntry> {
        if !self.head_expired(now) {
            return None;
        }
        let entry = self.entries.pop_front()?;
        self.pending.remove(&entry.event);
        Some(entry)
    }

    /// Pop every expired entry from the head, stopping at the first one that
    /// is still within the dwell time.
    pub fn drain_expired(&mut self, now: Tick) -> Vec<Event> {
        let mut released = Vec::new();
        while let Some(entry) = self.pop_expired(now) {
            released.push(entry.event);
        }
        released
    }

    /// Ticks until the head entry expires, if there is one.
    ///
    /// `Some(0)` means the head is already releasable.
    pub fn ticks_until_head_expires(&self, now: Tick) -> Option<Tick> {
        self.entries.front().map(|head| {
            let expires_at = head.arrival_tick + self.dwell_ticks + 1;
            expires_at.saturating_sub(now)
        })
    }
}

// src/source/mod.rs

//! Event source adapter.
//!
//! Turns filesystem notifications into [`Event`](crate::pipeline::Event)s
//! for the coalescer. Nothing under the scratch directory (or matching an
//! exclude glob) is ever forwarded.
//!
//! - [`filter`] decides which paths are admitted.
//! - [`watcher`] wires up `notify` and the forwarding loop.

pub mod filter;
pub mod watcher;

pub use filter::{EventKindFilter, ScratchFilter};
pub use watcher::{notification_channel, spawn_source, NotificationSink, NotifySource, SourceHandle};

#![allow(dead_code)]

pub use sigwatch_test_utils::builders::ConfigFileBuilder;
pub use sigwatch_test_utils::fake_matcher::{Behaviour, FakeMatcher};
pub use sigwatch_test_utils::log_capture::LogCapture;
pub use sigwatch_test_utils::{init_tracing, wait_until, with_timeout};

use sigwatch::pipeline::Event;

/// Shorthand for a list of events.
pub fn events(paths: &[&str]) -> Vec<Event> {
    paths.iter().map(|p| Event::from(*p)).collect()
}

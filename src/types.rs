use std::str::FromStr;
use serde::Deserialize;

/// How the coalescer decides that an incoming path is already pending.
///
/// - `Containment`: the new path is a substring of a pending path. This is
///   the historical behaviour; it also folds a path into any longer pending
///   path that embeds it (e.g. `/a/f` is swallowed by `/a/f.bak`).
/// - `Exact`: the new path equals a pending path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    Exact,
    Containment,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        DuplicatePolicy::Containment
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(DuplicatePolicy::Exact),
            "containment" => Ok(DuplicatePolicy::Containment),
            other => Err(format!(
                "invalid duplicate policy: {other} (expected \"exact\" or \"containment\")"
            )),
        }
    }
}

/// What the work queue does when the coalescer releases an event while the
/// queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressurePolicy {
    /// Suspend the release step until a worker frees a slot. Nothing is lost.
    Block,
    /// Evict the oldest queued event to make room for the new one.
    DropOldest,
    /// Discard the event being released.
    DropNewest,
}

impl Default for BackpressurePolicy {
    fn default() -> Self {
        BackpressurePolicy::Block
    }
}

impl FromStr for BackpressurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "block" => Ok(BackpressurePolicy::Block),
            "drop-oldest" => Ok(BackpressurePolicy::DropOldest),
            "drop-newest" => Ok(BackpressurePolicy::DropNewest),
            other => Err(format!(
                "invalid backpressure policy: {other} (expected \"block\", \"drop-oldest\" or \"drop-newest\")"
            )),
        }
    }
}

/// Which signature matcher implementation the workers use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    /// Compile the signature lines with `regex` and scan in-process.
    Regex,
    /// Run an external `egrep`-compatible program per file.
    External,
}

impl Default for MatcherKind {
    fn default() -> Self {
        MatcherKind::Regex
    }
}

impl FromStr for MatcherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "regex" => Ok(MatcherKind::Regex),
            "external" => Ok(MatcherKind::External),
            other => Err(format!(
                "invalid matcher kind: {other} (expected \"regex\" or \"external\")"
            )),
        }
    }
}

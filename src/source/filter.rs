// src/source/filter.rs

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::EventKind;
use notify::event::{AccessKind, AccessMode};

use crate::config::SourceSection;
use crate::errors::{Result, SigwatchError};

/// Path filter applied before an event enters the pipeline.
///
/// A path is rejected if it lies under the scratch directory (compared by
/// path components, so `/tmpfoo` is not under `/tmp`) or matches one of the
/// exclude globs.
#[derive(Clone)]
pub struct ScratchFilter {
    scratch: Vec<PathBuf>,
    excludes: Option<GlobSet>,
}

impl fmt::Debug for ScratchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchFilter")
            .field("scratch", &self.scratch)
            .finish_non_exhaustive()
    }
}

impl ScratchFilter {
    pub fn new(scratch_dir: impl Into<PathBuf>, exclude: &[String]) -> Result<Self> {
        let scratch_dir = scratch_dir.into();

        // Keep both spellings: events may arrive with either the configured
        // or the resolved prefix (e.g. `/var/...` vs `/private/var/...`).
        let mut scratch = vec![scratch_dir.clone()];
        if let Ok(canon) = scratch_dir.canonicalize() {
            if canon != scratch_dir {
                scratch.push(canon);
            }
        }

        let excludes = if exclude.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in exclude {
                let glob = Glob::new(pattern).map_err(|e| {
                    SigwatchError::ConfigError(format!("invalid exclude glob '{pattern}': {e}"))
                })?;
                builder.add(glob);
            }
            Some(builder.build().map_err(|e| {
                SigwatchError::ConfigError(format!("building exclude globs: {e}"))
            })?)
        };

        Ok(Self { scratch, excludes })
    }

    pub fn from_config(cfg: &SourceSection) -> Result<Self> {
        Self::new(cfg.scratch_dir(), &cfg.exclude)
    }

    pub fn admits(&self, path: &Path) -> bool {
        if self.scratch.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        match self.excludes {
            Some(ref set) => !set.is_match(path),
            None => true,
        }
    }
}

/// Which kinds of notification are worth scanning.
///
/// Content changes, creations and written-then-closed files always are.
/// Read-only accesses are off by default: the scanners' own reads would
/// otherwise feed back into the pipeline. Removals are off by default since
/// there is nothing left to scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventKindFilter {
    pub include_reads: bool,
    pub include_removals: bool,
}

impl EventKindFilter {
    pub fn from_config(cfg: &SourceSection) -> Self {
        Self {
            include_reads: cfg.include_reads,
            include_removals: cfg.include_removals,
        }
    }

    pub fn forwards(&self, kind: &EventKind) -> bool {
        match kind {
            EventKind::Remove(_) => self.include_removals,
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
            EventKind::Access(_) => self.include_reads,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
                true
            }
        }
    }
}

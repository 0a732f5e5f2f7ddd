// src/matcher/signatures.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{Result, SigwatchError};

/// The signature file, loaded once at startup.
///
/// One pattern per line. Blank lines are skipped: a grep pattern file would
/// treat them as "match everything". A trailing `\r` is stripped.
#[derive(Debug, Clone)]
pub struct SignatureSet {
    path: PathBuf,
    /// `(line number, pattern)`, 1-based line numbers.
    patterns: Vec<(usize, String)>,
}

impl SignatureSet {
    /// Load signatures from `path`. A missing file is
    /// [`SigwatchError::SignaturesMissing`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SigwatchError::SignaturesMissing(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)?;
        let set = Self::parse(path, &contents);
        debug!(path = ?path, patterns = set.len(), "loaded signature set");
        Ok(set)
    }

    /// Parse signature lines that were read elsewhere. `path` only labels
    /// the set in logs.
    pub fn parse(path: impl Into<PathBuf>, contents: &str) -> Self {
        let patterns = contents
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.is_empty())
            .map(|(n, line)| (n, line.to_string()))
            .collect();

        Self {
            path: path.into(),
            patterns,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(_, p)| p.as_str())
    }

    /// Patterns with their line numbers in the source file.
    pub fn numbered(&self) -> &[(usize, String)] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

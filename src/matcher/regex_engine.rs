// src/matcher/regex_engine.rs

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, bail, Context};
use regex::bytes::{Regex, RegexSet};
use tracing::trace;

use super::{ScanFuture, SignatureMatcher, SignatureSet};
use crate::errors::{Result, SigwatchError};
use crate::fs::FileSystem;

/// In-process matcher.
///
/// Works line by line like `grep -H`: every line matching at least one
/// signature is reported as `path:line`, and the report is all such lines
/// joined by newlines. Files are streamed, never read whole, and a scan
/// whose future is dropped stops at the next line.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    set: Arc<RegexSet>,
    fs: Arc<dyn FileSystem>,
}

impl RegexMatcher {
    /// Compile every signature. The first invalid pattern is reported with
    /// its line number.
    pub fn compile(signatures: &SignatureSet, fs: Arc<dyn FileSystem>) -> Result<Self> {
        for (line, pattern) in signatures.numbered() {
            Regex::new(pattern)
                .map_err(|source| SigwatchError::SignatureCompile { line: *line, source })?;
        }

        let set = RegexSet::new(signatures.patterns()).map_err(|source| {
            SigwatchError::SignatureCompile { line: 0, source }
        })?;

        Ok(Self {
            set: Arc::new(set),
            fs,
        })
    }

    pub fn pattern_count(&self) -> usize {
        self.set.len()
    }
}

/// Longest run of bytes matched as one line. Longer lines are matched in
/// pieces of this size, so a file with no newlines can't exhaust memory.
pub const MAX_LINE_BYTES: u64 = 1 << 20;

/// Cooperative stop signal for a scan running on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Raises the flag when the owning scan future is dropped, which is what
/// a timeout or task abort does.
struct StopOnDrop(StopFlag);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Stream `reader` line by line and collect the lines matching `set`,
/// rendered as `path:line`. Checks `stop` before every line.
pub fn scan_lines<R: BufRead>(
    set: &RegexSet,
    path: &Path,
    mut reader: R,
    stop: &StopFlag,
) -> anyhow::Result<Vec<String>> {
    let shown = path.display();
    let mut hits = Vec::new();
    let mut line = Vec::new();

    loop {
        if stop.is_stopped() {
            bail!("scan of {shown} stopped");
        }

        line.clear();
        let n = (&mut reader)
            .take(MAX_LINE_BYTES)
            .read_until(b'\n', &mut line)
            .with_context(|| format!("reading file {shown}"))?;
        if n == 0 {
            break;
        }

        let text = line.strip_suffix(b"\n").unwrap_or(&line);
        let text = text.strip_suffix(b"\r").unwrap_or(text);
        if set.is_match(text) {
            hits.push(format!("{shown}:{}", String::from_utf8_lossy(text)));
        }
    }

    Ok(hits)
}

impl SignatureMatcher for RegexMatcher {
    fn scan<'a>(&'a self, path: &'a Path) -> ScanFuture<'a> {
        let set = Arc::clone(&self.set);
        let fs = Arc::clone(&self.fs);
        let path: PathBuf = path.to_path_buf();

        Box::pin(async move {
            let stop = StopFlag::default();
            let _stop_on_drop = StopOnDrop(stop.clone());

            tokio::task::spawn_blocking(move || {
                let file = match fs.open_read(&path) {
                    Ok(f) => f,
                    // Gone between the existence check and the open.
                    Err(_) if !fs.exists(&path) => {
                        trace!(path = ?path, "file vanished mid-scan");
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                };

                let lines = scan_lines(&set, &path, BufReader::new(file), &stop)?;
                if lines.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(lines.join("\n")))
                }
            })
            .await
            .map_err(|e| anyhow!("regex scan task failed: {e}"))?
        })
    }

    fn name(&self) -> &'static str {
        "regex"
    }
}

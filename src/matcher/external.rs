// src/matcher/external.rs

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{ScanFuture, SignatureMatcher, SignatureSet};
use crate::errors::Result;

/// Matcher that runs `<program> -Hf <patterns> <file>` for every scan.
///
/// `<patterns>` is a private copy of the signature set holding only the
/// parsed patterns. The original file is never handed to the program: a
/// blank line there is an empty pattern to grep, and matches everything.
///
/// Exit status follows grep conventions:
/// - `0`: match; stdout (the matching lines) is the match text,
/// - `1`: no match,
/// - anything else: failure, unless the file has vanished meanwhile, which
///   counts as no match.
///
/// The child is killed if the scan future is dropped (e.g. on timeout).
#[derive(Debug, Clone)]
pub struct ExternalMatcher {
    program: PathBuf,
    patterns: Arc<NamedTempFile>,
}

impl ExternalMatcher {
    pub fn new(program: impl Into<PathBuf>, signatures: &SignatureSet) -> Result<Self> {
        let mut patterns = tempfile::Builder::new()
            .prefix("sigwatch-")
            .suffix(".sig")
            .tempfile()?;
        for pattern in signatures.patterns() {
            writeln!(patterns, "{pattern}")?;
        }
        patterns.flush()?;
        debug!(
            source = ?signatures.path(),
            patterns = ?patterns.path(),
            count = signatures.len(),
            "wrote pattern file for external matcher"
        );

        Ok(Self {
            program: program.into(),
            patterns: Arc::new(patterns),
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The pattern file handed to the program.
    pub fn pattern_file(&self) -> &Path {
        self.patterns.path()
    }
}

impl SignatureMatcher for ExternalMatcher {
    fn scan<'a>(&'a self, path: &'a Path) -> ScanFuture<'a> {
        Box::pin(async move {
            let output = Command::new(&self.program)
                .arg("-Hf")
                .arg(self.patterns.path())
                .arg(path)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .with_context(|| format!("running {:?} on {:?}", self.program, path))?;

            match output.status.code() {
                Some(0) => {
                    let text = String::from_utf8_lossy(&output.stdout)
                        .trim_end()
                        .to_string();
                    return Ok(Some(text));
                }
                Some(1) => return Ok(None),
                _ => {}
            }

            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                trace!(path = ?path, "file vanished mid-scan");
                return Ok(None);
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(anyhow!(
                "{:?} exited with {:?}: {}",
                self.program,
                output.status.code(),
                stderr.trim()
            ))
        })
    }

    fn name(&self) -> &'static str {
        "external"
    }
}

// src/matcher/mod.rs

//! Signature matching.
//!
//! Workers talk to a [`SignatureMatcher`] and never know how matching is
//! done. Two implementations exist:
//!
//! - [`RegexMatcher`] compiles the signature lines with `regex` and scans
//!   file content in-process (on the blocking thread pool).
//! - [`ExternalMatcher`] runs an `egrep`-compatible program per file, the
//!   way the tool historically worked.
//!
//! Tests provide their own implementations to simulate matches, failures
//! and hangs.

use std::fmt::Debug;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;

use crate::config::MatcherSection;
use crate::fs::FileSystem;
use crate::types::MatcherKind;

pub mod external;
pub mod regex_engine;
pub mod signatures;

pub use external::ExternalMatcher;
pub use regex_engine::RegexMatcher;
pub use signatures::SignatureSet;

/// Future returned by [`SignatureMatcher::scan`].
///
/// - `Ok(Some(text))`: the file matched; `text` is the matched content.
/// - `Ok(None)`: no match (including a file that vanished mid-scan).
/// - `Err(_)`: the scan itself failed.
pub type ScanFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;

/// Checks one file's content against the signature set.
pub trait SignatureMatcher: Send + Sync + Debug {
    fn scan<'a>(&'a self, path: &'a Path) -> ScanFuture<'a>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Build the matcher selected in `[matcher]`.
pub fn build_matcher(
    settings: &MatcherSection,
    signatures: &SignatureSet,
    fs: Arc<dyn FileSystem>,
) -> crate::errors::Result<Arc<dyn SignatureMatcher>> {
    let matcher: Arc<dyn SignatureMatcher> = match settings.kind {
        MatcherKind::Regex => Arc::new(RegexMatcher::compile(signatures, fs)?),
        MatcherKind::External => {
            Arc::new(ExternalMatcher::new(settings.program.clone(), signatures)?)
        }
    };
    Ok(matcher)
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use sigwatch::matcher::{ScanFuture, SignatureMatcher};

/// What the fake matcher does for a given path.
#[derive(Debug, Clone)]
pub enum Behaviour {
    Match(String),
    Clean,
    Fail(String),
    /// Sleeps far longer than any test's scan timeout.
    Hang,
    Panic,
}

/// A fake matcher that:
/// - records every path it was asked to scan, in order
/// - answers according to a per-path [`Behaviour`] (default: `Clean`).
#[derive(Debug, Clone, Default)]
pub struct FakeMatcher {
    behaviours: Arc<Mutex<HashMap<PathBuf, Behaviour>>>,
    scanned: Arc<Mutex<Vec<String>>>,
}

impl FakeMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, path: impl AsRef<Path>, behaviour: Behaviour) -> Self {
        self.behaviours
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), behaviour);
        self
    }

    /// Paths scanned so far (a panicking or hung scan still counts).
    pub fn scanned(&self) -> Vec<String> {
        self.scanned.lock().unwrap().clone()
    }

    pub fn into_arc(self) -> Arc<dyn SignatureMatcher> {
        Arc::new(self)
    }
}

impl SignatureMatcher for FakeMatcher {
    fn scan<'a>(&'a self, path: &'a Path) -> ScanFuture<'a> {
        let behaviour = self
            .behaviours
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or(Behaviour::Clean);
        self.scanned
            .lock()
            .unwrap()
            .push(path.to_string_lossy().into_owned());

        Box::pin(async move {
            match behaviour {
                Behaviour::Match(text) => Ok(Some(text)),
                Behaviour::Clean => Ok(None),
                Behaviour::Fail(msg) => Err(anyhow!(msg)),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(None)
                }
                Behaviour::Panic => panic!("fake matcher panicked"),
            }
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

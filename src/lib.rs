// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs;
pub mod lock;
pub mod logging;
pub mod matcher;
pub mod pipeline;
pub mod source;
pub mod types;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_raw_or_default, ConfigFile, RawConfigFile};
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::lock::InstanceLock;
use crate::matcher::{build_matcher, SignatureSet};
use crate::pipeline::Pipeline;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (+ CLI overrides)
/// - signature loading and the single-instance lock (both fatal on failure)
/// - the coalescing pipeline and worker pool
/// - the filesystem event source
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve_config(&args)?;

    let signatures = SignatureSet::load(cfg.matcher.signatures_path())?;

    if args.dry_run {
        print_dry_run(&cfg, &signatures);
        return Ok(());
    }

    let _lock = InstanceLock::acquire(cfg.lock.lock_path())?;

    debug!(
        cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        "available parallelism"
    );

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let matcher = build_matcher(&cfg.matcher, &signatures, Arc::clone(&fs))?;
    info!(
        matcher = matcher.name(),
        signatures = signatures.len(),
        path = ?signatures.path(),
        "signature set loaded"
    );

    let cancel = CancellationToken::new();
    let (pipeline, inbox) = Pipeline::spawn(&cfg, matcher, fs, cancel.clone());

    let source = match crate::source::spawn_source(&cfg.source, inbox, cancel.clone()) {
        Ok(s) => s,
        Err(e) => {
            pipeline.shutdown().await;
            return Err(e);
        }
    };

    // Ctrl-C → graceful shutdown.
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Caught CTRL+C; exiting...");
            cancel.cancel();
        });
    }

    source.join().await;
    // The source only stops on its own if the watcher dies; take the rest
    // of the pipeline down with it.
    cancel.cancel();
    pipeline.join().await;

    Ok(())
}

/// Load the config file (if any), apply CLI overrides and validate.
pub fn resolve_config(args: &CliArgs) -> Result<ConfigFile> {
    let mut raw = load_raw_or_default(args.config.as_deref())?;
    apply_cli_overrides(&mut raw, args);
    ConfigFile::try_from(raw)
}

fn apply_cli_overrides(raw: &mut RawConfigFile, args: &CliArgs) {
    if let Some(ref sig) = args.signatures {
        raw.matcher.signatures = Some(sig.clone());
    }
    if let Some(workers) = args.workers {
        raw.workers.count = workers;
    }
    if !args.roots.is_empty() {
        raw.source.roots = args.roots.clone();
    }
    if let Some(ref lock) = args.lock_file {
        raw.lock.path = Some(lock.clone());
    }
    if let Some(policy) = args.policy {
        raw.coalesce.policy = policy;
    }
    if let Some(backpressure) = args.backpressure {
        raw.queue.backpressure = backpressure;
    }
    if let Some(kind) = args.matcher {
        raw.matcher.kind = kind;
    }
}

/// Simple dry-run output: the effective settings.
fn print_dry_run(cfg: &ConfigFile, signatures: &SignatureSet) {
    println!("sigwatch dry-run");
    println!(
        "  coalesce: dwell = {}ms, poll = {}ms, tick = {}ms, policy = {:?}",
        cfg.coalesce.dwell_ms, cfg.coalesce.poll_ms, cfg.coalesce.tick_ms, cfg.coalesce.policy
    );
    println!(
        "  queue: capacity = {}, backpressure = {:?}",
        cfg.queue.capacity, cfg.queue.backpressure
    );
    println!(
        "  workers: count = {}, scan_timeout = {}ms",
        cfg.workers.count, cfg.workers.scan_timeout_ms
    );
    println!(
        "  matcher: {:?} with {} signature(s) from {:?}",
        cfg.matcher.kind,
        signatures.len(),
        signatures.path()
    );
    println!("  roots: {:?}", cfg.source.roots);
    println!("  scratch: {:?}", cfg.source.scratch_dir());
    if !cfg.source.exclude.is_empty() {
        println!("  exclude: {:?}", cfg.source.exclude);
    }
    println!("  lock: {:?}", cfg.lock.lock_path());

    debug!("dry-run complete (nothing watched)");
}

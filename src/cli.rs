// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{ArgAction, Parser, ValueEnum};

use crate::types::{BackpressurePolicy, DuplicatePolicy, MatcherKind};

/// Command-line arguments for `sigwatch`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "sigwatch",
    version,
    about = "Watch filesystem activity and scan touched files against a signature set.",
    long_about = None
)]
pub struct CliArgs {
    /// Increase verbosity (repeat for more: -v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Logging level (error, warn, info, debug, trace). Overrides `-v`.
    ///
    /// If neither is given, `SIGWATCH_LOG` or `warn` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Path to a TOML config file. Built-in defaults are used if omitted.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Signature file (one pattern per line).
    ///
    /// Default: `sig/malware.sig` next to the executable.
    #[arg(short, long, value_name = "PATH")]
    pub signatures: Option<PathBuf>,

    /// Number of scanning workers.
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Directory to watch recursively (repeatable). Default: `/`.
    #[arg(short, long = "root", value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    /// Duplicate policy for the coalescing window (exact, containment).
    #[arg(long, value_name = "POLICY", value_parser = DuplicatePolicy::from_str)]
    pub policy: Option<DuplicatePolicy>,

    /// What a full work queue does (block, drop-oldest, drop-newest).
    #[arg(long, value_name = "POLICY", value_parser = BackpressurePolicy::from_str)]
    pub backpressure: Option<BackpressurePolicy>,

    /// Signature matcher implementation (regex, external).
    #[arg(long, value_name = "KIND", value_parser = MatcherKind::from_str)]
    pub matcher: Option<MatcherKind>,

    /// Single-instance lock file.
    #[arg(long, value_name = "PATH")]
    pub lock_file: Option<PathBuf>,

    /// Validate configuration and signatures, print the effective settings
    /// and exit without watching.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

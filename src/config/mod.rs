// src/config/mod.rs

//! Configuration loading and validation for sigwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate ranges and patterns (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_raw_or_default};
pub use model::{
    CoalesceSection, ConfigFile, LockSection, MatcherSection, QueueSection, RawConfigFile,
    SourceSection, StatusSection, WorkersSection,
};

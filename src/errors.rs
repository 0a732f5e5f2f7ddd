// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SigwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Can't find signature file {0:?}")]
    SignaturesMissing(PathBuf),

    #[error("Invalid signature pattern on line {line}: {source}")]
    SignatureCompile {
        line: usize,
        #[source]
        source: regex::Error,
    },

    #[error("Can't get exclusive lock on {0:?}; is another instance running?")]
    LockHeld(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SigwatchError>;

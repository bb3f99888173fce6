// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Only structural problems are modelled here: per-file build failures and
//! dependency resolution errors are recovered inside the batch and never
//! reach this type.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchbuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The destination tree invariant is violated: a path is needed as both a
    /// managed file and a managed directory. Fatal to the run.
    #[error("Invalid output structure: '{}' is both a folder and a file", path.display())]
    OutputConflict { path: PathBuf },

    /// Two handlers (or two inputs) claim the same destination file. Fatal to
    /// the run.
    #[error("Output '{path}' is already claimed by handler '{handler}' for input '{input}'")]
    OutputClaimed {
        path: String,
        handler: String,
        input: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatchbuildError>;

// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `watchbuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "watchbuild",
    version,
    about = "Mirror a source tree into a destination tree through incremental build handlers.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Watchbuild.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Watchbuild.toml")]
    pub config: String,

    /// Process exactly one batch (a full build of the current tree), then exit
    /// instead of watching for changes.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WATCHBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the handler table, but don't watch or build.
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

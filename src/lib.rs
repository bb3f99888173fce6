// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::Context;
use regex::Regex;
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::DependencyGraph;
use crate::engine::{HandlerEntry, Reactor};
use crate::errors::{Result, WatchbuildError};
use crate::handlers::{BuildAction, FileHandler, OutputSpec};
use crate::watch::collector::{Collector, CollectorEvent};
use crate::watch::detector::ChangeDetector;
use crate::watch::patterns::HandlerPatterns;

pub use crate::handlers::Handler;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - handler entries (patterns, dependency graphs, caches)
/// - the orchestrator and output tree
/// - the two change detectors and the debounce collector
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let base_dir = config_base_dir(&config_path);
    let src_root = base_dir.join(&cfg.build.src);
    let src_root = src_root
        .canonicalize()
        .with_context(|| format!("resolving source root {:?}", src_root))?;

    // The destination is fully owned by us; create it if missing. The root
    // itself is never pruned.
    let dest_root = base_dir.join(&cfg.build.dest);
    std::fs::create_dir_all(&dest_root)
        .with_context(|| format!("creating destination root {:?}", dest_root))?;
    let dest_root = dest_root
        .canonicalize()
        .with_context(|| format!("resolving destination root {:?}", dest_root))?;

    if dest_root.starts_with(&src_root) || src_root.starts_with(&dest_root) {
        return Err(WatchbuildError::ConfigError(format!(
            "source root {:?} and destination root {:?} must not overlap",
            src_root, dest_root
        )));
    }

    let entries = build_handler_entries(&cfg)?;
    let mut reactor = Reactor::new(src_root.clone(), dest_root.clone(), entries, args.once);

    let (event_tx, event_rx) = mpsc::unbounded_channel::<CollectorEvent>();

    let source = ChangeDetector::new(&src_root, event_tx.clone())?;
    let dest = ChangeDetector::new(&dest_root, event_tx.clone())?;

    // Ctrl-C → graceful shutdown; the in-flight batch finishes first.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(CollectorEvent::ShutdownRequested);
        });
    }

    info!(
        src = %src_root.display(),
        dest = %dest_root.display(),
        once = args.once,
        "watchbuild starting"
    );

    let collector = Collector::new(
        source,
        dest,
        cfg.bundle_duration(),
        cfg.timeout_duration(),
        event_rx,
    );
    collector.run(&mut reactor).await
}

/// Build one [`HandlerEntry`] per `[[handler]]` section, in config order.
pub fn build_handler_entries(cfg: &ConfigFile) -> Result<Vec<HandlerEntry>> {
    let mut entries = Vec::with_capacity(cfg.handlers.len());

    for hc in &cfg.handlers {
        let mut exclude = hc.exclude.clone();
        exclude.extend(cfg.build.exclude.iter().cloned());
        let patterns = HandlerPatterns::compile(&hc.include, &exclude)
            .with_context(|| format!("compiling patterns for handler '{}'", hc.name))?;

        let outputs = OutputSpec {
            suffixes: hc.suffixes.clone(),
            rename: hc
                .rename
                .as_ref()
                .map(|r| (r.from.clone(), r.to.clone())),
        };

        let action = match &hc.cmd {
            Some(cmd) => BuildAction::Command(cmd.clone()),
            None => BuildAction::Copy,
        };

        let graph = match &hc.reference_directive {
            Some(directive) => {
                let regex = Regex::new(directive).map_err(|e| {
                    WatchbuildError::ConfigError(format!(
                        "handler '{}': invalid reference_directive: {e}",
                        hc.name
                    ))
                })?;
                Some(DependencyGraph::new(regex))
            }
            None => None,
        };

        entries.push(HandlerEntry::new(
            Box::new(FileHandler::new(&hc.name, patterns, outputs, action)),
            graph,
        ));
    }

    Ok(entries)
}

/// Figure out the directory that relative `src`/`dest` paths in the config
/// are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "configs/Watchbuild.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Watchbuild.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: print roots, timings and the handler table.
fn print_dry_run(cfg: &ConfigFile) {
    println!("watchbuild dry-run");
    println!("  build.src = {}", cfg.build.src);
    println!("  build.dest = {}", cfg.build.dest);
    println!("  build.bundle = {}s", cfg.build.bundle);
    println!("  build.timeout = {}s", cfg.build.timeout);
    if !cfg.build.exclude.is_empty() {
        println!("  build.exclude = {:?}", cfg.build.exclude);
    }
    println!();

    println!("handlers ({}):", cfg.handlers.len());
    for handler in cfg.handlers.iter() {
        println!("  - {}", handler.name);
        println!("      include: {:?}", handler.include);
        if !handler.exclude.is_empty() {
            println!("      exclude: {:?}", handler.exclude);
        }
        println!("      suffixes: {:?}", handler.suffixes);
        if let Some(rename) = &handler.rename {
            println!("      rename: {} -> {}", rename.from, rename.to);
        }
        if let Some(directive) = &handler.reference_directive {
            println!("      reference_directive: {directive}");
        }
        match &handler.cmd {
            Some(cmd) => println!("      cmd: {cmd}"),
            None => println!("      cmd: (copy)"),
        }
    }
}

// src/watch/detector.rs

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use anyhow::{Context, Result};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::watch::collector::{ChangeSet, CollectorEvent};

/// Something the collector can ask for pending activity and diffs.
///
/// Production code uses [`ChangeDetector`]; tests can script a fake source.
pub trait ChangeSource: Send {
    /// Whether any filesystem activity has been observed since the last diff.
    fn pending(&self) -> bool;

    /// Collect all changes since the previous call (or since construction).
    fn diff(&mut self) -> ChangeSet;
}

/// Watches one root directory and computes snapshot diffs on demand.
///
/// OS notifications are treated as unreliable hints: the callback only sets a
/// dirty flag and signals the collector, and `diff()` performs a full
/// recursive walk comparing modification times against the snapshot. That
/// trades latency for correctness under rapid bursts (renames during
/// iteration, files that vanish between listing and stat).
///
/// Snapshot keys are `/`-separated paths relative to the root; directory
/// entries carry a trailing `/` and a sentinel timestamp, since only their
/// existence matters.
pub struct ChangeDetector {
    root: PathBuf,
    snapshot: HashMap<String, SystemTime>,
    dirty: Arc<AtomicBool>,
    // Dropping the watcher stops the notifications, so keep it alive.
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("root", &self.root)
            .field("entries", &self.snapshot.len())
            .finish_non_exhaustive()
    }
}

impl ChangeDetector {
    /// Start watching `root` recursively. Every raw notification sets the
    /// dirty flag and sends a `Touched` signal to the collector; the diff
    /// itself is never computed inside the callback.
    pub fn new(
        root: impl Into<PathBuf>,
        touched_tx: mpsc::UnboundedSender<CollectorEvent>,
    ) -> Result<Self> {
        let root = root.into();
        let root = root
            .canonicalize()
            .with_context(|| format!("canonicalizing watched root {:?}", root))?;

        // Starts dirty so the first diff reports the whole tree.
        let dirty = Arc::new(AtomicBool::new(true));

        let mut watcher = RecommendedWatcher::new(
            {
                let dirty = Arc::clone(&dirty);
                move |res: notify::Result<notify::Event>| match res {
                    Ok(_) => {
                        dirty.store(true, Ordering::SeqCst);
                        // Channel closed means the collector is gone; nothing
                        // left to wake.
                        let _ = touched_tx.send(CollectorEvent::Touched);
                    }
                    Err(err) => {
                        eprintln!("watchbuild: file watch error: {err}");
                    }
                }
            },
            Config::default(),
        )?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        debug!("change detector started on {:?}", root);

        Ok(Self {
            root,
            snapshot: HashMap::new(),
            dirty,
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// One authoritative diff pass: walk the tree, report changed-or-created
    /// and deleted entries, and update the snapshot in place.
    fn walk_diff(&mut self) -> ChangeSet {
        self.dirty.store(false, Ordering::SeqCst);

        let mut seen: HashSet<String> = HashSet::new();
        let mut changed: Vec<String> = Vec::new();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    // Unreadable mid-walk: its subtree falls out of `seen`
                    // and is reported deleted below.
                    trace!(dir = ?dir, error = %err, "skipping unreadable directory");
                    continue;
                }
            };

            for entry in entries {
                let Ok(entry) = entry else { continue };
                let path = entry.path();
                // A path that vanishes between listing and stat is treated
                // as deleted, not as an error.
                let Ok(meta) = entry.metadata() else { continue };

                if meta.is_dir() {
                    let Some(rel) = relative_key(&self.root, &path) else {
                        continue;
                    };
                    let rel = format!("{rel}/");
                    if !self.snapshot.contains_key(&rel) {
                        // Directory mtimes don't matter; track existence only.
                        self.snapshot.insert(rel.clone(), SystemTime::UNIX_EPOCH);
                        changed.push(rel.clone());
                    }
                    seen.insert(rel);
                    stack.push(path);
                } else if meta.is_file() {
                    let Some(rel) = relative_key(&self.root, &path) else {
                        continue;
                    };
                    let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                    match self.snapshot.get(&rel) {
                        Some(&last) if mtime <= last => {}
                        _ => {
                            self.snapshot.insert(rel.clone(), mtime);
                            changed.push(rel.clone());
                        }
                    }
                    seen.insert(rel);
                }
                // Symlinks to nowhere and other kinds are ignored entirely.
            }
        }

        // Entries that disappeared, or whose file/directory kind flipped
        // (the old key is no longer produced by the walk).
        let deleted: Vec<String> = self
            .snapshot
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        for key in &deleted {
            self.snapshot.remove(key);
        }

        ChangeSet { changed, deleted }
    }
}

impl ChangeSource for ChangeDetector {
    fn pending(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn diff(&mut self) -> ChangeSet {
        self.walk_diff()
    }
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path is not under `root` and cannot be relativized.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let s = rel.to_string_lossy().replace('\\', "/");
    if s.is_empty() { None } else { Some(s) }
}

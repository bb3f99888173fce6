// src/engine/outputs.rs

//! The output tree reconciler.
//!
//! Owns the destination root outright: every file and managed directory in it
//! must be claimed by a live input, and everything else is an orphan to be
//! removed. The claim registry is mutated only inside a batch pass.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::engine::path_depth;
use crate::errors::{Result, WatchbuildError};
use crate::watch::ChangeSet;

/// A destination file claimed by a handler for a given input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub handler: String,
    pub input: String,
}

#[derive(Debug)]
pub struct OutputTree {
    dest_root: PathBuf,
    /// destination-relative file path -> its claim.
    files: HashMap<String, Claim>,
    /// Managed directories (created by us rather than pre-existing), keyed
    /// with a trailing `/` to match detector change sets.
    dirs: HashSet<String>,
}

impl OutputTree {
    pub fn new(dest_root: PathBuf) -> Self {
        Self {
            dest_root,
            files: HashMap::new(),
            dirs: HashSet::new(),
        }
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    pub fn claim_for(&self, rel: &str) -> Option<&Claim> {
        self.files.get(rel)
    }

    pub fn is_claimed(&self, rel: &str) -> bool {
        if rel.ends_with('/') {
            self.dirs.contains(rel)
        } else {
            self.files.contains_key(rel)
        }
    }

    fn abs(&self, rel: &str) -> PathBuf {
        self.dest_root.join(rel.trim_end_matches('/'))
    }

    /// Register a file claim and make sure every intermediate directory
    /// segment exists.
    ///
    /// A pre-existing plain *file* at a segment is converted into a directory
    /// (the file removed), unless that segment is itself claimed as a file
    /// output. That means two handlers disagree about the tree shape, which
    /// is a structural error, fatal to the run. Same for a file claim on a
    /// path that is already a managed directory, or already claimed by a
    /// different handler/input pair.
    pub fn prepare_output(&mut self, rel: &str, handler: &str, input: &str) -> Result<()> {
        if self.dirs.contains(&format!("{rel}/")) {
            return Err(WatchbuildError::OutputConflict { path: self.abs(rel) });
        }
        if let Some(existing) = self.files.get(rel) {
            if existing.handler != handler || existing.input != input {
                return Err(WatchbuildError::OutputClaimed {
                    path: rel.to_string(),
                    handler: existing.handler.clone(),
                    input: existing.input.clone(),
                });
            }
        }

        for segment in parent_dirs(rel) {
            if self.files.contains_key(segment.as_str()) {
                return Err(WatchbuildError::OutputConflict {
                    path: self.abs(&segment),
                });
            }
            let abs = self.dest_root.join(&segment);
            match fs::metadata(&abs) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    debug!(path = %abs.display(), "replacing file with directory");
                    fs::remove_file(&abs)?;
                    fs::create_dir(&abs)?;
                }
                Err(_) => {
                    fs::create_dir_all(&abs)?;
                }
            }
            self.dirs.insert(format!("{segment}/"));
        }

        self.files.insert(
            rel.to_string(),
            Claim {
                handler: handler.to_string(),
                input: input.to_string(),
            },
        );
        Ok(())
    }

    /// Remove an output file, drop its claim, and prune now-empty managed
    /// directories upward until a non-empty or unmanaged one is reached. The
    /// destination root itself is never removed.
    pub fn clean_output(&mut self, rel: &str) {
        self.files.remove(rel);

        let abs = self.dest_root.join(rel);
        match fs::remove_file(&abs) {
            Ok(()) => debug!(path = %abs.display(), "removed output"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(path = %abs.display(), error = %err, "failed to remove output"),
        }

        for segment in parent_dirs(rel).into_iter().rev() {
            let key = format!("{segment}/");
            if !self.dirs.contains(&key) {
                // Not ours to prune.
                break;
            }
            match fs::remove_dir(self.dest_root.join(&segment)) {
                Ok(()) => {
                    self.dirs.remove(&key);
                }
                Err(_) => break, // still holds something
            }
        }
    }

    /// Apply one destination-side change set: delete unclaimed entries
    /// (deepest first, so a directory's contents go before the directory) and
    /// recreate managed directories that unexpectedly vanished: some
    /// handlers leave an output directory transiently empty and the expected
    /// structure must not be mistaken for an orphan.
    pub fn reconcile(&mut self, changes: &ChangeSet) -> Result<()> {
        let mut changed = changes.changed.clone();
        changed.sort_by(|a, b| path_depth(b).cmp(&path_depth(a)).then(b.cmp(a)));
        for rel in &changed {
            if self.is_claimed(rel) {
                continue;
            }
            let abs = self.abs(rel);
            let removed = if rel.ends_with('/') {
                fs::remove_dir(&abs)
            } else {
                fs::remove_file(&abs)
            };
            match removed {
                Ok(()) => debug!(path = %abs.display(), "removed orphan"),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!(path = %abs.display(), error = %err, "failed to remove orphan"),
            }
        }

        let mut deleted = changes.deleted.clone();
        deleted.sort_by(|a, b| path_depth(a).cmp(&path_depth(b)).then(a.cmp(b)));
        for rel in &deleted {
            if rel.ends_with('/') && self.dirs.contains(rel) {
                fs::create_dir_all(self.abs(rel))?;
                debug!(path = rel, "recreated managed directory");
            }
        }
        Ok(())
    }
}

/// Intermediate directory segments of `rel`, shallowest first
/// (`"a/b/c.txt"` → `["a", "a/b"]`).
fn parent_dirs(rel: &str) -> Vec<String> {
    let rel = rel.trim_end_matches('/');
    let Some((dirs, _file)) = rel.rsplit_once('/') else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut acc = String::new();
    for part in dirs.split('/') {
        if !acc.is_empty() {
            acc.push('/');
        }
        acc.push_str(part);
        out.push(acc.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::parent_dirs;

    #[test]
    fn parent_dirs_shallowest_first() {
        assert_eq!(parent_dirs("a.txt"), Vec::<String>::new());
        assert_eq!(parent_dirs("a/b.txt"), vec!["a"]);
        assert_eq!(parent_dirs("a/b/c.txt"), vec!["a", "a/b"]);
        assert_eq!(parent_dirs("a/b/"), vec!["a"]);
    }
}

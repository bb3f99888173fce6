// src/dag/graph.rs

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Component, Path};
use std::time::SystemTime;

use regex::Regex;
use thiserror::Error;
use tracing::trace;

/// Per-file resolution error. Scoped to a single input: the offending file is
/// treated as unresolved for the batch and never aborts it.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("unable to read '{path}': {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("reference '{reference}' outside of watched folder in '{path}'")]
    EscapesRoot { reference: String, path: String },

    #[error("circular reference to '{reference}' detected in '{path}'")]
    Circular { reference: String, path: String },
}

#[derive(Debug)]
struct Node {
    /// Modification time at the last successful scan; a matching stat is a
    /// cache hit and skips re-scanning (and parent re-validation).
    mtime: SystemTime,
    parents: HashSet<String>,
}

/// A build root reachable from a changed file, together with the maximum
/// modification time observed along the chain(s) leading to it. That maximum
/// is what existing outputs must be compared against: a change two levels
/// deep still invalidates the top-level output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRoot {
    pub rel: String,
    pub required: SystemTime,
}

/// Parent/child edges between inputs of one handler.
///
/// The two maps are kept as mutual inverses; cycles are rejected while edges
/// are being constructed, never detected after the fact.
#[derive(Debug)]
pub struct DependencyGraph {
    directive: Regex,
    nodes: HashMap<String, Node>,
    /// parent path -> the files that declared it as their parent.
    children: HashMap<String, HashSet<String>>,
}

impl DependencyGraph {
    /// `directive`'s first capture group extracts the referenced path from a
    /// line of the input file.
    pub fn new(directive: Regex) -> Self {
        Self {
            directive,
            nodes: HashMap::new(),
            children: HashMap::new(),
        }
    }

    /// Bring the node for `rel` up to date with the file's contents.
    ///
    /// A matching modification time is a no-op. On a genuine change the node
    /// is detached, the file re-scanned for directives, and every newly
    /// discovered parent resolved recursively (ordinarily a cache hit). On
    /// any rejection the whole failing chain is detached, leaving the file
    /// unresolved for this batch.
    pub fn resolve(&mut self, src_root: &Path, rel: &str) -> Result<(), GraphError> {
        let mut visiting = HashSet::new();
        self.resolve_inner(src_root, rel, &mut visiting)
    }

    fn resolve_inner(
        &mut self,
        src_root: &Path,
        rel: &str,
        visiting: &mut HashSet<String>,
    ) -> Result<(), GraphError> {
        visiting.insert(rel.to_string());
        let result = self.rescan(src_root, rel, visiting);
        if result.is_err() {
            self.on_deleted(rel);
        }
        visiting.remove(rel);
        result
    }

    fn rescan(
        &mut self,
        src_root: &Path,
        rel: &str,
        visiting: &mut HashSet<String>,
    ) -> Result<(), GraphError> {
        let abs = src_root.join(rel);
        let mtime = fs::metadata(&abs)
            .and_then(|meta| meta.modified())
            .map_err(|source| GraphError::Unreadable {
                path: rel.to_string(),
                source,
            })?;

        if self.nodes.get(rel).is_some_and(|node| node.mtime == mtime) {
            trace!(path = rel, "reference cache hit");
            return Ok(());
        }

        // Drop the stale edges before re-scanning.
        self.on_deleted(rel);

        let file = fs::File::open(&abs).map_err(|source| GraphError::Unreadable {
            path: rel.to_string(),
            source,
        })?;

        let mut parents: HashSet<String> = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| GraphError::Unreadable {
                path: rel.to_string(),
                source,
            })?;
            let Some(captures) = self.directive.captures(&line) else {
                continue;
            };
            let Some(reference) = captures.get(1) else {
                continue;
            };
            let reference = reference.as_str();

            let parent =
                resolve_reference(rel, reference).ok_or_else(|| GraphError::EscapesRoot {
                    reference: reference.to_string(),
                    path: rel.to_string(),
                })?;
            if visiting.contains(&parent) {
                return Err(GraphError::Circular {
                    reference: parent,
                    path: rel.to_string(),
                });
            }
            parents.insert(parent);
        }

        self.nodes.insert(
            rel.to_string(),
            Node {
                mtime,
                parents: parents.clone(),
            },
        );
        for parent in &parents {
            self.children
                .entry(parent.clone())
                .or_default()
                .insert(rel.to_string());
        }

        for parent in parents {
            self.resolve_inner(src_root, &parent, visiting)?;
        }
        Ok(())
    }

    /// Only roots claim output; a tracked file with parents produces nothing
    /// of its own. Unresolved files are not roots.
    pub fn is_root(&self, rel: &str) -> bool {
        self.nodes
            .get(rel)
            .is_some_and(|node| node.parents.is_empty())
    }

    /// Whether `rel` is declared as a parent by any tracked file. Lets base
    /// files that match no pattern still be claimed.
    pub fn is_referenced(&self, rel: &str) -> bool {
        self.children.contains_key(rel)
    }

    /// Walk all parent edges transitively (breadth-first, deduplicated) and
    /// return every reachable root with the maximum modification time seen
    /// along the way.
    pub fn roots_for(&self, rel: &str) -> Vec<BuildRoot> {
        let Some(start) = self.nodes.get(rel) else {
            return Vec::new();
        };

        let mut best: HashMap<&str, SystemTime> = HashMap::new();
        let mut roots: HashMap<&str, SystemTime> = HashMap::new();
        let mut queue: VecDeque<(&str, SystemTime)> = VecDeque::new();

        best.insert(rel, start.mtime);
        queue.push_back((rel, start.mtime));

        while let Some((path, carried)) = queue.pop_front() {
            let Some(node) = self.nodes.get(path) else {
                // Unresolved parent: the chain through it yields no root.
                continue;
            };
            let carried = carried.max(node.mtime);

            if node.parents.is_empty() {
                let slot = roots.entry(path).or_insert(carried);
                if carried > *slot {
                    *slot = carried;
                }
                continue;
            }
            for parent in &node.parents {
                let improved = best.get(parent.as_str()).is_none_or(|&m| carried > m);
                if improved {
                    best.insert(parent, carried);
                    queue.push_back((parent, carried));
                }
            }
        }

        let mut out: Vec<BuildRoot> = roots
            .into_iter()
            .map(|(rel, required)| BuildRoot {
                rel: rel.to_string(),
                required,
            })
            .collect();
        out.sort_by(|a, b| a.rel.cmp(&b.rel));
        out
    }

    /// Symmetric teardown of `rel`'s parent edges. Output cleanup is the
    /// orchestrator's job, not the graph's.
    pub fn on_deleted(&mut self, rel: &str) {
        if let Some(node) = self.nodes.remove(rel) {
            for parent in node.parents {
                if let Some(kids) = self.children.get_mut(&parent) {
                    kids.remove(rel);
                    if kids.is_empty() {
                        self.children.remove(&parent);
                    }
                }
            }
        }
    }
}

/// Resolve a directive reference against the referencing file's directory,
/// normalizing `.` and `..`. Returns `None` when the reference is absolute or
/// escapes the watched root.
fn resolve_reference(rel: &str, reference: &str) -> Option<String> {
    let dir = Path::new(rel).parent().unwrap_or_else(|| Path::new(""));
    let joined = dir.join(reference);

    let mut normalized: Vec<String> = Vec::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if normalized.pop().is_none() {
                    return None;
                }
            }
            Component::Normal(part) => normalized.push(part.to_string_lossy().into_owned()),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if normalized.is_empty() {
        return None;
    }
    Some(normalized.join("/"))
}

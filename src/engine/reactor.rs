// src/engine/reactor.rs

//! The orchestrator: wires handlers, dependency graphs, build caches and the
//! output tree together and applies one batch at a time.
//!
//! All of the state here is mutated only from inside `process`, which the
//! collector calls synchronously, so it is single-threaded by construction.

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::{Instant, SystemTime};

use tracing::{debug, error, info, warn};

use crate::dag::{BuildRoot, DependencyGraph};
use crate::engine::cache::BuildCache;
use crate::engine::outputs::OutputTree;
use crate::engine::path_depth;
use crate::errors::Result;
use crate::handlers::Handler;
use crate::watch::{Batch, BatchControl, BatchSink, ChangeSet};

/// One registered handler plus the per-handler state the orchestrator owns:
/// an optional dependency graph and the rebuild cache. No ambient globals;
/// everything is passed in at construction.
pub struct HandlerEntry {
    pub handler: Box<dyn Handler>,
    pub graph: Option<DependencyGraph>,
    pub cache: BuildCache,
}

impl HandlerEntry {
    pub fn new(handler: Box<dyn Handler>, graph: Option<DependencyGraph>) -> Self {
        Self {
            handler,
            graph,
            cache: BuildCache::new(),
        }
    }

    /// Resolve the claim this handler makes on `rel`.
    ///
    /// `None` = not claimed; `Some(vec![])` = nested dependency (tracked for
    /// rebuild propagation, no direct output); `Some(outputs)` = root input.
    fn declare(&mut self, src_root: &Path, rel: &str) -> Option<Vec<String>> {
        match &mut self.graph {
            None => self
                .handler
                .matches(rel)
                .then(|| self.handler.declare_outputs(rel)),
            Some(graph) => {
                // Files referenced as a parent are claimable even when no
                // pattern matches them.
                if !self.handler.matches(rel) && !graph.is_referenced(rel) {
                    return None;
                }
                if let Err(err) = graph.resolve(src_root, rel) {
                    warn!(
                        handler = self.handler.name(),
                        path = rel,
                        error = %err,
                        "dependency resolution failed; no output this batch"
                    );
                    return None;
                }
                if graph.is_root(rel) {
                    Some(self.handler.declare_outputs(rel))
                } else {
                    Some(Vec::new())
                }
            }
        }
    }

    /// The build roots a changed file invalidates, each with its required
    /// freshness timestamp.
    fn build_roots(&self, src_root: &Path, rel: &str) -> Vec<BuildRoot> {
        match &self.graph {
            Some(graph) => graph.roots_for(rel),
            None => match fs::metadata(src_root.join(rel)).and_then(|m| m.modified()) {
                Ok(mtime) => vec![BuildRoot {
                    rel: rel.to_string(),
                    required: mtime,
                }],
                // Vanished since the diff; the next batch reports it deleted.
                Err(_) => Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct InputClaim {
    entry: usize,
    outputs: Vec<String>,
}

pub struct Reactor {
    src_root: PathBuf,
    entries: Vec<HandlerEntry>,
    /// input rel path -> the claims it currently holds, one per handler.
    inputs: HashMap<String, Vec<InputClaim>>,
    outputs: OutputTree,
    initial: bool,
    once: bool,
}

impl Reactor {
    pub fn new(
        src_root: PathBuf,
        dest_root: PathBuf,
        entries: Vec<HandlerEntry>,
        once: bool,
    ) -> Self {
        Self {
            src_root,
            entries,
            inputs: HashMap::new(),
            outputs: OutputTree::new(dest_root),
            initial: true,
            once,
        }
    }

    pub fn output_tree(&self) -> &OutputTree {
        &self.outputs
    }

    /// Apply one batch.
    ///
    /// The very first batch resolves source-side claims *before* cleaning
    /// destination orphans: at startup the destination may already hold
    /// exactly the files about to be re-claimed, and cleaning first would
    /// delete valid outputs or force needless rebuilds. Every later batch
    /// cleans the destination first, so one consistent orphan set drives
    /// deletions before new claims are made.
    pub async fn process(&mut self, batch: Batch) -> Result<BatchControl> {
        if self.initial {
            self.apply_source(batch.source).await?;
            self.outputs.reconcile(&batch.dest)?;
            self.initial = false;
            if self.once {
                info!("one-shot build complete");
                return Ok(BatchControl::Stop);
            }
        } else {
            self.outputs.reconcile(&batch.dest)?;
            self.apply_source(batch.source).await?;
        }
        Ok(BatchControl::Continue)
    }

    async fn apply_source(&mut self, changes: ChangeSet) -> Result<()> {
        // Creations and changes shallowest first.
        let mut changed = changes.changed;
        changed.sort_by(|a, b| path_depth(a).cmp(&path_depth(b)).then(a.cmp(b)));
        for rel in &changed {
            if rel.ends_with('/') {
                // Directories carry no claims of their own.
                continue;
            }
            self.apply_changed(rel).await?;
        }

        // Deletions deepest first, so a deleted directory's children are
        // cleaned before the directory itself.
        let mut deleted = changes.deleted;
        deleted.sort_by(|a, b| path_depth(b).cmp(&path_depth(a)).then(b.cmp(a)));
        for rel in &deleted {
            self.apply_deleted(rel);
        }
        Ok(())
    }

    async fn apply_changed(&mut self, rel: &str) -> Result<()> {
        let previous = self.inputs.remove(rel).unwrap_or_default();

        // Resolve which handlers claim this version of the file. A path may
        // be claimed by several handlers at once, each with its own outputs.
        let src_root = self.src_root.clone();
        let mut claims: Vec<InputClaim> = Vec::new();
        for (idx, entry) in self.entries.iter_mut().enumerate() {
            if let Some(outputs) = entry.declare(&src_root, rel) {
                claims.push(InputClaim {
                    entry: idx,
                    outputs,
                });
            }
        }

        // Outputs the previous version produced but this one no longer
        // claims are stale. Re-claimed outputs are kept in place so the
        // freshness check below can skip untouched ones.
        for old in &previous {
            for out in &old.outputs {
                let still_claimed = claims.iter().any(|c| c.outputs.contains(out));
                if !still_claimed {
                    self.outputs.clean_output(out);
                }
            }
        }

        if claims.is_empty() {
            return Ok(());
        }

        for claim in &claims {
            let handler_name = self.entries[claim.entry].handler.name().to_string();
            for out in &claim.outputs {
                self.outputs.prepare_output(out, &handler_name, rel)?;
            }
        }

        let entry_indices: Vec<usize> = claims.iter().map(|c| c.entry).collect();
        self.inputs.insert(rel.to_string(), claims);

        for idx in entry_indices {
            self.drive_builds(idx, rel).await?;
        }
        Ok(())
    }

    async fn drive_builds(&mut self, idx: usize, rel: &str) -> Result<()> {
        let roots = self.entries[idx].build_roots(&self.src_root, rel);
        for root in roots {
            self.build_root(idx, &root).await?;
        }
        Ok(())
    }

    async fn build_root(&mut self, idx: usize, root: &BuildRoot) -> Result<()> {
        let Some(outputs) = self.ensure_claimed(idx, &root.rel)? else {
            return Ok(());
        };
        if outputs.is_empty() {
            // Nested input; it propagates to its own roots separately.
            return Ok(());
        }

        let entry = &mut self.entries[idx];
        if BuildCache::outputs_fresh(self.outputs.dest_root(), &outputs, root.required) {
            debug!(
                handler = entry.handler.name(),
                input = %root.rel,
                "outputs up to date"
            );
            return Ok(());
        }
        if entry.cache.should_skip_failed(&root.rel, root.required) {
            debug!(
                handler = entry.handler.name(),
                input = %root.rel,
                "unchanged since last failure; not retrying"
            );
            return Ok(());
        }

        let input_abs = self.src_root.join(&root.rel);
        let output_abs: Vec<PathBuf> = outputs
            .iter()
            .map(|out| self.outputs.dest_root().join(out))
            .collect();

        let attempt_started = SystemTime::now();
        let started = Instant::now();
        info!(handler = entry.handler.name(), input = %root.rel, "building");

        match entry.handler.build(&input_abs, &output_abs).await {
            Ok(()) => {
                entry.cache.clear_failure(&root.rel);
                info!(
                    handler = entry.handler.name(),
                    input = %root.rel,
                    elapsed = ?started.elapsed(),
                    "build finished"
                );
            }
            Err(err) => {
                // Scoped to this input/handler pair; the batch continues.
                entry.cache.record_failure(&root.rel, attempt_started);
                error!(
                    handler = entry.handler.name(),
                    input = %root.rel,
                    elapsed = ?started.elapsed(),
                    error = %err,
                    "build failed"
                );
            }
        }
        Ok(())
    }

    /// Outputs registered for `rel` under handler `idx`, claiming them first
    /// if this root has not been processed as a changed input yet (a changed
    /// leaf can invalidate a root the batch never touched directly).
    fn ensure_claimed(&mut self, idx: usize, rel: &str) -> Result<Option<Vec<String>>> {
        if let Some(outputs) = self.claimed_outputs(idx, rel) {
            return Ok(Some(outputs));
        }

        let src_root = self.src_root.clone();
        let Some(outputs) = self.entries[idx].declare(&src_root, rel) else {
            return Ok(None);
        };
        let handler_name = self.entries[idx].handler.name().to_string();
        for out in &outputs {
            self.outputs.prepare_output(out, &handler_name, rel)?;
        }
        self.inputs
            .entry(rel.to_string())
            .or_default()
            .push(InputClaim {
                entry: idx,
                outputs: outputs.clone(),
            });
        Ok(Some(outputs))
    }

    fn claimed_outputs(&self, idx: usize, rel: &str) -> Option<Vec<String>> {
        self.inputs
            .get(rel)?
            .iter()
            .find(|claim| claim.entry == idx)
            .map(|claim| claim.outputs.clone())
    }

    fn apply_deleted(&mut self, rel: &str) {
        let Some(claims) = self.inputs.remove(rel) else {
            return;
        };
        debug!(path = rel, "input deleted");
        for claim in claims {
            let entry = &mut self.entries[claim.entry];
            entry.handler.on_deleted(&self.src_root, rel);
            if let Some(graph) = &mut entry.graph {
                graph.on_deleted(rel);
            }
            entry.cache.clear_failure(rel);
            for out in &claim.outputs {
                self.outputs.clean_output(out);
            }
        }
    }
}

impl BatchSink for Reactor {
    fn process_batch(
        &mut self,
        batch: Batch,
    ) -> Pin<Box<dyn Future<Output = Result<BatchControl>> + Send + '_>> {
        Box::pin(self.process(batch))
    }
}

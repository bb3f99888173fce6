// src/engine/cache.rs

//! Per-handler rebuild bookkeeping: output freshness checks and the failure
//! memo that suppresses repeated doomed rebuild attempts.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Default)]
pub struct BuildCache {
    /// input path -> when its last failed build attempt started.
    failures: HashMap<String, SystemTime>,
}

impl BuildCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when every declared output exists with a modification time at
    /// least `required`, meaning the build can be skipped.
    pub fn outputs_fresh(dest_root: &Path, outputs: &[String], required: SystemTime) -> bool {
        outputs.iter().all(|rel| {
            fs::metadata(dest_root.join(rel))
                .and_then(|meta| meta.modified())
                .map(|mtime| mtime >= required)
                .unwrap_or(false)
        })
    }

    /// True when the input has not changed since its last failed attempt;
    /// retrying would reproduce the same failure.
    pub fn should_skip_failed(&self, rel: &str, required: SystemTime) -> bool {
        self.failures
            .get(rel)
            .is_some_and(|&failed_at| required <= failed_at)
    }

    pub fn record_failure(&mut self, rel: &str, attempt_started: SystemTime) {
        self.failures.insert(rel.to_string(), attempt_started);
    }

    /// Cleared the moment a build for the path succeeds.
    pub fn clear_failure(&mut self, rel: &str) {
        self.failures.remove(rel);
    }
}

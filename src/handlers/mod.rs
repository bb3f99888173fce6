// src/handlers/mod.rs

//! The transformation handler contract and the built-in implementation.
//!
//! Handlers are deliberately narrow: the orchestrator decides *whether* and
//! *when* to build; a handler only says which paths it operates on, which
//! outputs an input maps to, and how to produce them.

pub mod action;

pub use action::BuildAction;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::errors::Result;
use crate::watch::patterns::HandlerPatterns;

/// Capability contract between the orchestrator and a handler.
///
/// Production code uses [`FileHandler`]; tests can record builds instead of
/// performing them.
pub trait Handler: Send {
    fn name(&self) -> &str;

    /// Whether this handler operates on the given source-relative path.
    fn matches(&self, rel: &str) -> bool;

    /// Destination-relative paths this input will produce when built as a
    /// root. Whether the input *is* a root (and therefore whether this list
    /// or an empty claim applies) is the orchestrator's call.
    fn declare_outputs(&self, rel: &str) -> Vec<String>;

    /// Build `outputs` from `input`. Paths are absolute; writing the output
    /// files is entirely the handler's responsibility. The orchestrator only
    /// inspects modification times afterwards.
    fn build<'a>(
        &'a self,
        input: &'a Path,
        outputs: &'a [PathBuf],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Called when a previously claimed input is deleted from the source
    /// tree. Most handlers keep no auxiliary state and ignore it.
    fn on_deleted(&mut self, _src_root: &Path, _rel: &str) {}
}

/// Suffix/rename mapping from a root input path to its output paths.
#[derive(Debug, Clone)]
pub struct OutputSpec {
    /// Appended to the (possibly renamed) input path; `""` keeps the path.
    pub suffixes: Vec<String>,
    /// Optional `(from, to)` extension rename applied first, e.g.
    /// `(".less", ".css")`.
    pub rename: Option<(String, String)>,
}

impl OutputSpec {
    pub fn outputs_for(&self, rel: &str) -> Vec<String> {
        let base = match &self.rename {
            Some((from, to)) if rel.ends_with(from.as_str()) => {
                format!("{}{}", &rel[..rel.len() - from.len()], to)
            }
            _ => rel.to_string(),
        };
        self.suffixes
            .iter()
            .map(|suffix| format!("{base}{suffix}"))
            .collect()
    }
}

/// The built-in handler: glob patterns plus a copy or command action.
pub struct FileHandler {
    name: String,
    patterns: HandlerPatterns,
    outputs: OutputSpec,
    action: BuildAction,
}

impl FileHandler {
    pub fn new(
        name: impl Into<String>,
        patterns: HandlerPatterns,
        outputs: OutputSpec,
        action: BuildAction,
    ) -> Self {
        Self {
            name: name.into(),
            patterns,
            outputs,
            action,
        }
    }
}

impl Handler for FileHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, rel: &str) -> bool {
        self.patterns.matches(rel)
    }

    fn declare_outputs(&self, rel: &str) -> Vec<String> {
        self.outputs.outputs_for(rel)
    }

    fn build<'a>(
        &'a self,
        input: &'a Path,
        outputs: &'a [PathBuf],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.action.run(input, outputs))
    }
}

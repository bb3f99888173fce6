#![allow(dead_code)]

use regex::Regex;
use watchbuild::dag::DependencyGraph;
use watchbuild::engine::HandlerEntry;
use watchbuild::handlers::{BuildAction, FileHandler, OutputSpec};
use watchbuild::watch::HandlerPatterns;

/// Builder for a [`HandlerEntry`] backed by a [`FileHandler`], to simplify
/// orchestrator test setup.
pub struct HandlerEntryBuilder {
    name: String,
    include: Vec<String>,
    exclude: Vec<String>,
    suffixes: Vec<String>,
    rename: Option<(String, String)>,
    directive: Option<String>,
    cmd: Option<String>,
}

impl HandlerEntryBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            include: vec![],
            exclude: vec![],
            suffixes: vec![String::new()],
            rename: None,
            directive: None,
            cmd: None,
        }
    }

    pub fn include(mut self, pattern: &str) -> Self {
        self.include.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.exclude.push(pattern.to_string());
        self
    }

    pub fn suffixes(mut self, suffixes: &[&str]) -> Self {
        self.suffixes = suffixes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.rename = Some((from.to_string(), to.to_string()));
        self
    }

    pub fn reference_directive(mut self, directive: &str) -> Self {
        self.directive = Some(directive.to_string());
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.cmd = Some(cmd.to_string());
        self
    }

    pub fn build(self) -> HandlerEntry {
        let patterns = HandlerPatterns::compile(&self.include, &self.exclude)
            .expect("Failed to compile handler patterns from builder");

        let outputs = OutputSpec {
            suffixes: self.suffixes,
            rename: self.rename,
        };

        let action = match self.cmd {
            Some(cmd) => BuildAction::Command(cmd),
            None => BuildAction::Copy,
        };

        let graph = self.directive.map(|d| {
            DependencyGraph::new(Regex::new(&d).expect("Invalid directive regex from builder"))
        });

        HandlerEntry::new(
            Box::new(FileHandler::new(&self.name, patterns, outputs, action)),
            graph,
        )
    }
}

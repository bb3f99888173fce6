// src/dag/mod.rs

//! The include-reference dependency graph.
//!
//! Inputs for some handlers are textually composed: a file declares, via an
//! in-file directive, which file it is logically nested under. The graph
//! keeps those parent/child edges current and answers which *roots* a changed
//! leaf actually invalidates.

pub mod graph;

pub use graph::{BuildRoot, DependencyGraph, GraphError};

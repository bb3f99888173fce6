mod common;

use regex::Regex;
use tempfile::TempDir;
use watchbuild::dag::{DependencyGraph, GraphError};

use common::{bump_mtime, init_tracing, mtime_of, write_file};

fn require_graph() -> DependencyGraph {
    DependencyGraph::new(Regex::new(r"^//\s*require\s+(\S+)").unwrap())
}

#[test]
fn resolve_tracks_parents_and_roots() {
    init_tracing();
    let src = TempDir::new().unwrap();
    write_file(src.path(), "js/app.js", "function app() {}\n");
    write_file(src.path(), "js/widgets/menu.js", "// require ../app.js\n");

    let mut graph = require_graph();
    graph.resolve(src.path(), "js/widgets/menu.js").unwrap();

    // Resolving the child pulls the parent in too.
    assert!(graph.is_root("js/app.js"));
    assert!(!graph.is_root("js/widgets/menu.js"));
    assert!(graph.is_referenced("js/app.js"));
    assert!(!graph.is_referenced("js/widgets/menu.js"));
}

#[test]
fn roots_for_carries_the_newest_mtime_along_the_chain() {
    init_tracing();
    let src = TempDir::new().unwrap();
    write_file(src.path(), "app.js", "root\n");
    write_file(src.path(), "menu.js", "// require app.js\n");
    write_file(src.path(), "item.js", "// require menu.js\n");
    bump_mtime(src.path(), "item.js", 10);

    let mut graph = require_graph();
    graph.resolve(src.path(), "item.js").unwrap();

    let roots = graph.roots_for("item.js");
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].rel, "app.js");
    // The change two levels down must invalidate the root's outputs, so the
    // required timestamp is the deep file's, not the root's.
    assert_eq!(roots[0].required, mtime_of(src.path(), "item.js"));
}

#[test]
fn roots_for_a_root_is_itself() {
    init_tracing();
    let src = TempDir::new().unwrap();
    write_file(src.path(), "app.js", "root\n");

    let mut graph = require_graph();
    graph.resolve(src.path(), "app.js").unwrap();

    let roots = graph.roots_for("app.js");
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].rel, "app.js");
}

#[test]
fn diamond_references_are_not_cycles() {
    init_tracing();
    let src = TempDir::new().unwrap();
    write_file(src.path(), "base.js", "base\n");
    write_file(src.path(), "left.js", "// require base.js\n");
    write_file(src.path(), "right.js", "// require base.js\n");
    write_file(
        src.path(),
        "tip.js",
        "// require left.js\n// require right.js\n",
    );

    let mut graph = require_graph();
    graph.resolve(src.path(), "tip.js").unwrap();

    let roots = graph.roots_for("tip.js");
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].rel, "base.js");
}

#[test]
fn circular_references_detach_the_chain() {
    init_tracing();
    let src = TempDir::new().unwrap();
    write_file(src.path(), "a.js", "// require b.js\n");
    write_file(src.path(), "b.js", "// require a.js\n");

    let mut graph = require_graph();
    let err = graph.resolve(src.path(), "a.js").unwrap_err();
    assert!(matches!(err, GraphError::Circular { .. }));

    // The failing chain is left unresolved rather than half-tracked.
    assert!(!graph.is_root("a.js"));
    assert!(graph.roots_for("a.js").is_empty());
}

#[test]
fn escaping_reference_is_rejected() {
    init_tracing();
    let src = TempDir::new().unwrap();
    write_file(src.path(), "a.js", "// require ../outside.js\n");

    let mut graph = require_graph();
    let err = graph.resolve(src.path(), "a.js").unwrap_err();
    assert!(matches!(err, GraphError::EscapesRoot { .. }));
}

#[test]
fn deleting_a_child_releases_its_parent() {
    init_tracing();
    let src = TempDir::new().unwrap();
    write_file(src.path(), "app.js", "root\n");
    write_file(src.path(), "menu.js", "// require app.js\n");

    let mut graph = require_graph();
    graph.resolve(src.path(), "menu.js").unwrap();
    assert!(graph.is_referenced("app.js"));

    graph.on_deleted("menu.js");
    assert!(!graph.is_referenced("app.js"));
    assert!(graph.roots_for("menu.js").is_empty());
}

#[test]
fn rewriting_references_replaces_the_edges() {
    init_tracing();
    let src = TempDir::new().unwrap();
    write_file(src.path(), "one.js", "one\n");
    write_file(src.path(), "two.js", "two\n");
    write_file(src.path(), "child.js", "// require one.js\n");

    let mut graph = require_graph();
    graph.resolve(src.path(), "child.js").unwrap();
    assert!(graph.is_referenced("one.js"));

    write_file(src.path(), "child.js", "// require two.js\n");
    bump_mtime(src.path(), "child.js", 5);
    graph.resolve(src.path(), "child.js").unwrap();

    assert!(!graph.is_referenced("one.js"));
    assert!(graph.is_referenced("two.js"));
    assert_eq!(graph.roots_for("child.js")[0].rel, "two.js");
}

mod common;

use tempfile::TempDir;
use watchbuild::config::loader::load_and_validate;
use watchbuild::errors::WatchbuildError;

use common::{init_tracing, write_file};

fn load(toml: &str) -> Result<watchbuild::config::ConfigFile, WatchbuildError> {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "Watchbuild.toml", toml);
    load_and_validate(dir.path().join("Watchbuild.toml"))
}

#[test]
fn minimal_config_gets_defaults() {
    init_tracing();
    let cfg = load(
        r#"
        [build]
        src = "src"
        dest = "build"

        [[handler]]
        name = "copy"
        include = ["**/*"]
        "#,
    )
    .unwrap();

    assert_eq!(cfg.build.src, "src");
    assert_eq!(cfg.build.dest, "build");
    assert_eq!(cfg.build.bundle, 0.2);
    assert_eq!(cfg.build.timeout, 150.0);
    assert!(cfg.build.exclude.is_empty());

    assert_eq!(cfg.handlers.len(), 1);
    let handler = &cfg.handlers[0];
    assert_eq!(handler.name, "copy");
    assert_eq!(handler.suffixes, vec![String::new()]);
    assert!(handler.rename.is_none());
    assert!(handler.reference_directive.is_none());
    assert!(handler.cmd.is_none());
}

#[test]
fn full_handler_section_round_trips() {
    init_tracing();
    let cfg = load(
        r#"
        [build]
        src = "assets"
        dest = "public"
        bundle = 0.5
        timeout = 30.0
        exclude = ["**/.git/**"]

        [[handler]]
        name = "less"
        include = ["**/*.less"]
        exclude = ["**/_*.less"]
        suffixes = ["", ".map"]
        rename = { from = ".less", to = ".css" }
        reference_directive = '@import\s+"([^"]+)"'
        cmd = "lessc {input} {output}"
        "#,
    )
    .unwrap();

    let handler = &cfg.handlers[0];
    assert_eq!(handler.suffixes, vec!["".to_string(), ".map".to_string()]);
    let rename = handler.rename.as_ref().unwrap();
    assert_eq!(rename.from, ".less");
    assert_eq!(rename.to, ".css");
    assert_eq!(handler.cmd.as_deref(), Some("lessc {input} {output}"));
    assert_eq!(cfg.bundle_duration().as_millis(), 500);
}

#[test]
fn config_without_handlers_is_rejected() {
    init_tracing();
    let err = load(
        r#"
        [build]
        src = "src"
        dest = "build"
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("at least one [[handler]]"));
}

#[test]
fn duplicate_handler_names_are_rejected() {
    init_tracing();
    let err = load(
        r#"
        [build]
        src = "src"
        dest = "build"

        [[handler]]
        name = "copy"
        include = ["**/*"]

        [[handler]]
        name = "copy"
        include = ["**/*.txt"]
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("duplicate handler name"));
}

#[test]
fn invalid_glob_is_rejected() {
    init_tracing();
    let err = load(
        r#"
        [build]
        src = "src"
        dest = "build"

        [[handler]]
        name = "bad"
        include = ["**/*.{txt"]
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, WatchbuildError::ConfigError(_)));
}

#[test]
fn directive_without_capture_group_is_rejected() {
    init_tracing();
    let err = load(
        r#"
        [build]
        src = "src"
        dest = "build"

        [[handler]]
        name = "refs"
        include = ["**/*.js"]
        reference_directive = 'require .+'
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("capture group"));
}

#[test]
fn non_positive_bundle_is_rejected() {
    init_tracing();
    let err = load(
        r#"
        [build]
        src = "src"
        dest = "build"
        bundle = 0.0

        [[handler]]
        name = "copy"
        include = ["**/*"]
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("bundle"));
}

#[test]
fn missing_file_is_an_io_error() {
    init_tracing();
    let err = load_and_validate("/nonexistent/Watchbuild.toml").unwrap_err();
    assert!(matches!(err, WatchbuildError::IoError(_)));
}

#![allow(dead_code)]

pub use watchbuild_test_utils::{init_tracing, with_timeout};

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Write a file, creating parent directories as needed.
pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("creating parent directories");
    }
    fs::write(&path, contents).expect("writing test file");
}

/// Push a file's modification time `secs` seconds into the future, so a diff
/// or freshness check sees it as strictly newer regardless of filesystem
/// timestamp granularity.
pub fn bump_mtime(root: &Path, rel: &str, secs: u64) {
    let path = root.join(rel);
    let file = fs::File::options()
        .write(true)
        .open(&path)
        .expect("opening file to bump mtime");
    file.set_modified(SystemTime::now() + Duration::from_secs(secs))
        .expect("setting mtime");
}

pub fn mtime_of(root: &Path, rel: &str) -> SystemTime {
    fs::metadata(root.join(rel))
        .and_then(|m| m.modified())
        .expect("reading mtime")
}

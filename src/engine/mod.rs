// src/engine/mod.rs

//! The orchestration engine.
//!
//! - [`reactor`] drives each batch: claim resolution, builds, cleanups.
//! - [`outputs`] owns the destination tree and the claim registry.
//! - [`cache`] decides, per file, whether a rebuild is needed.

pub mod cache;
pub mod outputs;
pub mod reactor;

pub use cache::BuildCache;
pub use outputs::{Claim, OutputTree};
pub use reactor::{HandlerEntry, Reactor};

/// Directory depth of a relative path (`"a/b/c.txt"` → 2). Directory keys may
/// carry a trailing `/`.
pub(crate) fn path_depth(rel: &str) -> usize {
    rel.trim_end_matches('/').matches('/').count()
}

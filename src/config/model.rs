// src/config/model.rs

//! Serde model for `Watchbuild.toml`.
//!
//! ```toml
//! [build]
//! src = "resources"
//! dest = "static"
//! bundle = 0.2
//! timeout = 150.0
//! exclude = ["**/.git/**"]
//!
//! [[handler]]
//! name = "styles"
//! include = ["css/**/*.less"]
//! exclude = ["**/bootstrap/**"]
//! suffixes = ["", ".map"]
//! rename = { from = ".less", to = ".css" }
//! reference_directive = '//\s*<base\s+path="(.*?)"\s*/>'
//! cmd = "lessc {input} {output}"
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Raw, unvalidated configuration straight from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    pub build: BuildSection,
    #[serde(default, rename = "handler")]
    pub handlers: Vec<HandlerConfig>,
}

/// The `[build]` section: watched roots and debounce timings.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    /// Source root, relative to the config file's directory.
    pub src: String,
    /// Destination root, relative to the config file's directory. Created if
    /// missing; fully owned by watchbuild once the run starts.
    pub dest: String,
    /// Minimum quiet period (seconds) after the last detected change before a
    /// batch runs.
    #[serde(default = "default_bundle")]
    pub bundle: f64,
    /// Maximum period (seconds) between batches, even while changes keep
    /// arriving; doubles as the fallback poll interval.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Glob patterns appended to every handler's exclude list.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_bundle() -> f64 {
    0.2
}

fn default_timeout() -> f64 {
    150.0
}

/// One `[[handler]]` entry: an immutable handler descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerConfig {
    pub name: String,
    /// Glob patterns (relative to the source root) this handler claims.
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Output suffixes appended to each root input's (possibly renamed)
    /// relative path. `[""]` means "the same path".
    #[serde(default = "default_suffixes")]
    pub suffixes: Vec<String>,
    /// Optional extension rename applied before the suffixes, e.g.
    /// `{ from = ".less", to = ".css" }`.
    #[serde(default)]
    pub rename: Option<RenameRule>,
    /// Regex whose first capture group extracts an in-file reference to the
    /// file this input is nested under. Presence enables dependency tracking
    /// for this handler.
    #[serde(default)]
    pub reference_directive: Option<String>,
    /// External build command with `{input}`, `{output}` and `{outputs}`
    /// placeholders. Omitted means "copy the input over every output".
    #[serde(default)]
    pub cmd: Option<String>,
}

fn default_suffixes() -> Vec<String> {
    vec![String::new()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameRule {
    pub from: String,
    pub to: String,
}

/// Validated configuration.
///
/// Constructed only through `TryFrom<RawConfigFile>` (see
/// [`crate::config::validate`]), so holding one implies the semantic checks
/// have passed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub build: BuildSection,
    pub handlers: Vec<HandlerConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(build: BuildSection, handlers: Vec<HandlerConfig>) -> Self {
        Self { build, handlers }
    }

    pub fn bundle_duration(&self) -> Duration {
        Duration::from_secs_f64(self.build.bundle)
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.build.timeout)
    }
}

// src/config/validate.rs

use std::collections::HashSet;

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, WatchbuildError};
use crate::watch::patterns::HandlerPatterns;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = WatchbuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.build, raw.handlers))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_handlers(cfg)?;
    validate_build_section(cfg)?;
    validate_handlers(cfg)?;
    Ok(())
}

fn ensure_has_handlers(cfg: &RawConfigFile) -> Result<()> {
    if cfg.handlers.is_empty() {
        return Err(WatchbuildError::ConfigError(
            "config must contain at least one [[handler]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_build_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.build.src.is_empty() {
        return Err(WatchbuildError::ConfigError(
            "[build].src must not be empty".to_string(),
        ));
    }
    if cfg.build.dest.is_empty() {
        return Err(WatchbuildError::ConfigError(
            "[build].dest must not be empty".to_string(),
        ));
    }
    if !(cfg.build.bundle.is_finite() && cfg.build.bundle > 0.0) {
        return Err(WatchbuildError::ConfigError(format!(
            "[build].bundle must be a positive number of seconds (got {})",
            cfg.build.bundle
        )));
    }
    if !(cfg.build.timeout.is_finite() && cfg.build.timeout > 0.0) {
        return Err(WatchbuildError::ConfigError(format!(
            "[build].timeout must be a positive number of seconds (got {})",
            cfg.build.timeout
        )));
    }
    HandlerPatterns::compile(&[], &cfg.build.exclude)
        .map_err(|e| WatchbuildError::ConfigError(format!("[build].exclude: {e}")))?;
    Ok(())
}

fn validate_handlers(cfg: &RawConfigFile) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();

    for handler in cfg.handlers.iter() {
        if handler.name.is_empty() {
            return Err(WatchbuildError::ConfigError(
                "every [[handler]] must have a non-empty name".to_string(),
            ));
        }
        if !seen.insert(handler.name.as_str()) {
            return Err(WatchbuildError::ConfigError(format!(
                "duplicate handler name '{}'",
                handler.name
            )));
        }
        if handler.include.is_empty() {
            return Err(WatchbuildError::ConfigError(format!(
                "handler '{}' must have at least one include pattern",
                handler.name
            )));
        }
        HandlerPatterns::compile(&handler.include, &handler.exclude).map_err(|e| {
            WatchbuildError::ConfigError(format!("handler '{}': {e}", handler.name))
        })?;
        if handler.suffixes.is_empty() {
            return Err(WatchbuildError::ConfigError(format!(
                "handler '{}' must declare at least one output suffix (\"\" is allowed)",
                handler.name
            )));
        }
        if let Some(rename) = &handler.rename {
            if rename.from.is_empty() {
                return Err(WatchbuildError::ConfigError(format!(
                    "handler '{}': rename.from must not be empty",
                    handler.name
                )));
            }
        }
        if let Some(directive) = &handler.reference_directive {
            let regex = Regex::new(directive).map_err(|e| {
                WatchbuildError::ConfigError(format!(
                    "handler '{}': invalid reference_directive: {e}",
                    handler.name
                ))
            })?;
            if regex.captures_len() < 2 {
                return Err(WatchbuildError::ConfigError(format!(
                    "handler '{}': reference_directive needs a capture group for the referenced path",
                    handler.name
                )));
            }
        }
        if let Some(cmd) = &handler.cmd {
            if cmd.trim().is_empty() {
                return Err(WatchbuildError::ConfigError(format!(
                    "handler '{}': cmd must not be empty (omit it for a plain copy)",
                    handler.name
                )));
            }
        }
    }

    Ok(())
}

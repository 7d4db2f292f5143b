//! Session configuration (ambient: TOML-backed limits with graceful
//! fallback to defaults). Grounded on `core-config::load_from` in the
//! teacher: a missing or unparseable file is never a hard error, just a
//! signal to fall back to built-in defaults — the same shape is right
//! here since a malformed `basic.toml` shouldn't keep a user out of their
//! session.

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Default expression-token cache size (spec.md §4.J: "configurable max
/// size"). Matches `core-interp`'s own built-in default so a session that
/// never finds a config file behaves exactly as one that does but leaves
/// every field at its default.
pub const DEFAULT_EXPR_CACHE_CAPACITY: usize = 512;

/// Default sprite-message batching window size, mirrored from
/// `core_events::SPRITE_BATCH_MAX_ENTRIES` purely for display/validation
/// purposes — the actual batcher still reads the compiled-in constant
/// (spec.md §9: stack/cache bounds are "adequate" compiled-in values, not
/// independently reconfigurable without touching the components that
/// enforce them).
pub const DEFAULT_SPRITE_BATCH_MAX_ENTRIES: usize = 32;

#[derive(Debug, Deserialize, Default, Clone)]
struct LimitsSection {
    #[serde(default)]
    expr_cache_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct ConfigFile {
    #[serde(default)]
    limits: LimitsSection,
}

/// Effective session limits, already defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Passed straight to [`core_interp::Interpreter::with_expr_cache_capacity`].
    pub expr_cache_capacity: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self { expr_cache_capacity: DEFAULT_EXPR_CACHE_CAPACITY }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub limits: SessionLimits,
}

/// Best-effort config path: a local `basic.toml` in the working directory,
/// else the platform config dir, else just the bare filename.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("basic.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("basic-online").join("basic.toml");
    }
    PathBuf::from("basic.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => {
            info!(target: "config", path = %path.display(), "config_file_missing_using_defaults");
            return Ok(Config::default());
        }
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            let expr_cache_capacity = file.limits.expr_cache_capacity.unwrap_or(DEFAULT_EXPR_CACHE_CAPACITY);
            Ok(Config { limits: SessionLimits { expr_cache_capacity } })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_error_using_defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_basic_config__.toml"))).unwrap();
        assert_eq!(cfg.limits.expr_cache_capacity, DEFAULT_EXPR_CACHE_CAPACITY);
    }

    #[test]
    fn parses_expr_cache_capacity() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[limits]\nexpr_cache_capacity = 2048\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.limits.expr_cache_capacity, 2048);
    }

    #[test]
    fn falls_back_to_defaults_on_parse_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "not valid toml : : :").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.limits.expr_cache_capacity, DEFAULT_EXPR_CACHE_CAPACITY);
    }
}

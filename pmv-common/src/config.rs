//! Configuration loading
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config directory (`<config_dir>/pmv/<file>`)
//! 4. Compiled defaults (no file)
//!
//! A missing config file is never fatal: callers get `T::default()` and a
//! warning in the log. A file that exists but fails to parse is an error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Logging section shared by all PMV config files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Resolves which config file (if any) should be loaded
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    /// Environment variable holding an explicit config path
    env_var: String,
    /// File name inside `<config_dir>/pmv/`
    file_name: String,
}

impl ConfigResolver {
    pub fn new(env_var: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            file_name: file_name.into(),
        }
    }

    /// Resolve the config path; `None` means "use compiled defaults"
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Per-user config directory
        let user_config = dirs::config_dir().map(|d| d.join("pmv").join(&self.file_name));
        match user_config {
            Some(path) if path.exists() => Some(path),
            _ => None,
        }
    }
}

/// Load a TOML config file, falling back to defaults when the file is absent
pub fn load_toml<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No config file resolved, using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using compiled defaults");
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    info!(path = %path.display(), "Config loaded");
    Ok(config)
}

/// Read and parse an environment override, ignoring unparsable values
pub fn env_override<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}

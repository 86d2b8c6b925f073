//! Plugin configuration
//!
//! Read from `Documents/My Games/Fallout4/F4SE/xedit_dump.toml`, or from
//! the file named by `XEDIT_DUMP_CONFIG`. Every key is optional.
//!
//! ```toml
//! output = "C:/dumps/fo4_changeforms.txt"
//! log_level = "xedit_dump=debug"
//!
//! [extract]
//! command_tables = true
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use xedit_dump::ExtractOptions;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "XEDIT_DUMP_CONFIG";

const CONFIG_FILE: &str = "xedit_dump.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Where the schema document is written
    pub output: PathBuf,
    /// Diagnostics log
    pub log: PathBuf,
    /// `EnvFilter` directives for the diagnostics log
    pub log_level: String,
    pub extract: ExtractOptions,
}

impl Default for PluginConfig {
    fn default() -> Self {
        let dir = f4se_dir();
        Self {
            output: dir.join("xedit_dump.txt"),
            log: dir.join("xedit_dump.log"),
            log_level: "info".to_string(),
            extract: ExtractOptions::default(),
        }
    }
}

/// The script extender's per-user directory
pub fn f4se_dir() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("My Games")
        .join("Fallout4")
        .join("F4SE")
}

impl PluginConfig {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        Self::config_path_with(std::env::var_os(CONFIG_ENV))
    }

    fn config_path_with(env_override: Option<OsString>) -> PathBuf {
        match env_override {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => f4se_dir().join(CONFIG_FILE),
        }
    }

    /// Load the configuration, or defaults if there is no config file
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

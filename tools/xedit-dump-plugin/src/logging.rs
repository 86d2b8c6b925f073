//! Diagnostics log
//!
//! The host owns stdout, so diagnostics go to their own file, separate from
//! the dump. `XEDIT_DUMP_LOG` overrides the configured filter.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding `EnvFilter` directives
pub const LOG_ENV: &str = "XEDIT_DUMP_LOG";

fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

fn filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Install the global subscriber, appending to `path`
pub fn init(path: &Path, level: &str) -> Result<()> {
    let file = open_log(path)?;

    tracing_subscriber::registry()
        .with(filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")
}

//! Script extender plugin for xEdit schema dumps
//!
//! Registers the `xEditDump` console command. Running it extracts the
//! change-form schema from the live game and writes it to the configured
//! output file (by default `Documents/My Games/Fallout4/F4SE/xedit_dump.txt`).
//!
//! Exports:
//!   xedit_dump_query(runtime_version, is_editor) - version handshake
//!   xedit_dump_load(api)                         - store the host API and register the command
//!
//! Environment variables:
//!   XEDIT_DUMP_CONFIG=<path> - Config file (default: F4SE/xedit_dump.toml)
//!   XEDIT_DUMP_LOG=<filter>  - Diagnostics filter, overrides `log_level`

pub mod config;
pub mod foreign;
pub mod host;
pub mod logging;
pub mod process;

use anyhow::{anyhow, ensure, Context, Result};
use once_cell::sync::OnceCell;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::{error, info, warn};
use xedit_dump::revision::{Revision, SUPPORTED_REVISION};
use xedit_dump::{run_extraction, ExtractionReport, Host, WriterSink};

pub use config::PluginConfig;
pub use host::{HostApi, LiveHost};

/// Oldest `HostApi` layout this plugin understands
pub const INTERFACE_VERSION: u32 = 1;

/// Console command name
pub const TRIGGER_NAME: &str = "xEditDump";

const TRIGGER_NAME_C: &[u8] = b"xEditDump\0";
const TRIGGER_HELP_C: &[u8] = b"Dump change-form flag schemas for xEdit\0";

static HOST_API: OnceCell<HostApi> = OnceCell::new();
static CONFIG: OnceCell<PluginConfig> = OnceCell::new();

/// Version handshake: only the game runtime this build has tables for
#[no_mangle]
pub extern "C" fn xedit_dump_query(runtime_version: u32, is_editor: bool) -> bool {
    !is_editor && Revision(runtime_version) == SUPPORTED_REVISION
}

/// Plugin entry point
///
/// # Safety
///
/// `api` must be null or point to a valid [`HostApi`].
#[no_mangle]
pub unsafe extern "C" fn xedit_dump_load(api: *const HostApi) -> bool {
    // SAFETY: upheld by the caller
    let Some(api) = (unsafe { api.as_ref() }) else {
        return false;
    };

    match load(*api) {
        Ok(()) => true,
        Err(e) => {
            error!("xedit-dump failed to load: {:#}", e);
            false
        }
    }
}

fn load(api: HostApi) -> Result<()> {
    let (config, config_error) = match PluginConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (PluginConfig::default(), Some(e)),
    };
    // A retried load finds the subscriber from the first attempt still installed
    if let Err(e) = logging::init(&config.log, &config.log_level) {
        warn!("diagnostics log not installed: {:#}", e);
    }
    if let Some(e) = config_error {
        warn!("using default configuration: {:#}", e);
    }

    install(api, config)
}

/// Register the trigger, then keep `api` and `config` for it. Nothing is
/// stored unless registration succeeds, so a refused load can be retried.
fn install(api: HostApi, config: PluginConfig) -> Result<()> {
    ensure!(
        api.interface_version >= INTERFACE_VERSION,
        "host interface version {} is older than {}",
        api.interface_version,
        INTERFACE_VERSION
    );
    ensure!(HOST_API.get().is_none(), "plugin loaded twice");
    let register = api
        .register_command
        .context("host offers no command registration")?;

    // SAFETY: both strings are NUL-terminated statics
    let registered = unsafe {
        register(
            TRIGGER_NAME_C.as_ptr().cast(),
            TRIGGER_HELP_C.as_ptr().cast(),
            xedit_dump_trigger,
        )
    };
    ensure!(registered, "host refused to register {}", TRIGGER_NAME);

    HOST_API
        .set(api)
        .map_err(|_| anyhow!("plugin loaded twice"))?;
    CONFIG
        .set(config)
        .map_err(|_| anyhow!("plugin loaded twice"))?;

    info!(
        revision = %Revision(api.runtime_version),
        "registered {}",
        TRIGGER_NAME
    );
    Ok(())
}

extern "C" fn xedit_dump_trigger() -> bool {
    match trigger() {
        Ok(report) => report.is_complete(),
        Err(e) => {
            error!("{} failed: {:#}", TRIGGER_NAME, e);
            false
        }
    }
}

fn trigger() -> Result<ExtractionReport> {
    let api = HOST_API.get().context("plugin is not loaded")?;
    let config = CONFIG.get().context("plugin is not loaded")?;

    let host = LiveHost::attach(*api, config.extract.max_string_len)?;
    dump(&host, config)
}

/// Run one extraction and write the document to `config.output`
pub fn dump(host: &dyn Host, config: &PluginConfig) -> Result<ExtractionReport> {
    // Refuse before touching the previous dump
    xedit_dump::revision::resolve(host.revision())?;

    let mut sink = create_output(&config.output)?;
    let report = run_extraction(host, config.extract.clone(), &mut sink)?;
    sink.finish()
        .with_context(|| format!("Failed to write {}", config.output.display()))?;

    info!(
        lines = report.lines,
        skipped = report.skipped_records,
        "wrote {}",
        config.output.display()
    );
    Ok(report)
}

/// Buffered file sink at `path`, creating parent directories
pub fn create_output(path: &Path) -> Result<WriterSink<BufWriter<File>>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    Ok(WriterSink::new(BufWriter::new(file)))
}

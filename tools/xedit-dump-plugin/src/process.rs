//! In-Process Memory Source
//!
//! Reads go through the OS process-memory API against our own process, so a
//! stale or bogus pointer comes back as an error instead of a fault.

use anyhow::{Context, Result};
use process_memory::{CopyAddress, ProcessHandle, TryIntoProcessHandle};
use xedit_dump::MemorySource;

/// Handle to the process the plugin is loaded into
pub struct SelfProcess {
    handle: ProcessHandle,
}

// SAFETY: process handles are process-wide and can be used from any thread.
unsafe impl Send for SelfProcess {}
unsafe impl Sync for SelfProcess {}

impl SelfProcess {
    pub fn open() -> Result<Self> {
        let handle = (std::process::id() as process_memory::Pid)
            .try_into_process_handle()
            .context("Failed to open a handle to the host process")?;
        Ok(Self { handle })
    }
}

impl MemorySource for SelfProcess {
    fn read_bytes(&self, address: usize, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        self.handle
            .copy_address(address, &mut buffer)
            .with_context(|| format!("Failed to read {} bytes at {:#x}", size, address))?;
        Ok(buffer)
    }
}

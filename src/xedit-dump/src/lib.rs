//! # xedit-dump
//!
//! Extracts change-form schemas from a running Fallout 4 process and prints
//! them as xEdit `wb*` definitions.
//!
//! One pass:
//! - Resolve table offsets for the host revision ([`revision::resolve`])
//! - Decode the host tables through a [`MemorySource`] ([`decode::Decoder`])
//! - Probe every change type's flag names ([`flags::FlagResolver`])
//! - Emit the schema document to an [`OutputSink`]
//!
//! ## Example
//!
//! ```no_run
//! use xedit_dump::{run_extraction, ExtractOptions, Host};
//!
//! # fn demo(host: &dyn Host) -> xedit_dump::Result<()> {
//! let mut lines: Vec<String> = Vec::new();
//! let report = run_extraction(host, ExtractOptions::default(), &mut lines)?;
//! println!("{} lines, {} records skipped", report.lines, report.skipped_records);
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod decode;
pub mod document;
pub mod extract;
pub mod flags;
pub mod layout;
pub mod memory;
pub mod revision;
pub mod schema;
pub mod sink;

use revision::{Revision, TableId};

#[doc(inline)]
pub use commands::CommandTable;
#[doc(inline)]
pub use decode::{Decoder, MAX_STRING_LEN};
#[doc(inline)]
pub use document::{Document, Section, SEPARATOR};
#[doc(inline)]
pub use extract::{run_extraction, ExtractOptions, ExtractionReport, Extractor, Host, Stage};
#[doc(inline)]
pub use flags::{FlagNameSource, BAD_FLAG_NAME};
#[doc(inline)]
pub use memory::MemorySource;
#[doc(inline)]
pub use sink::{OutputSink, WriterSink};

/// Extraction errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported host revision {found}, expected {supported}")]
    UnsupportedRevision {
        found: Revision,
        supported: Revision,
    },

    #[error("malformed {table} region: {reason}")]
    MalformedRegion { table: TableId, reason: String },
}

/// A single record that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("record at {address:#x}: field `{field}`: {reason}")]
pub struct FieldDecodeError {
    pub address: usize,
    pub field: &'static str,
    pub reason: String,
}

pub type Result<T> = std::result::Result<T, Error>;

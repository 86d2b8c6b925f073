//! Record decoding
//!
//! Turns host table regions into sequences of [`Record`]s. Two shapes:
//! - [`Decoder::decode_array`]: contiguous records, `base + i * stride`
//! - [`Decoder::probe`]: records reached through a key lookup, filtered by
//!   a kind-tag predicate
//!
//! Region problems are reported up front as [`Error::MalformedRegion`].
//! Per-record problems come out of the iterators as [`FieldDecodeError`]
//! and never stop the sequence.

use byteorder::{ByteOrder, LE};

use crate::layout::{FieldKind, Layout, Record, Value};
use crate::memory::MemorySource;
use crate::revision::{Extent, TableId, TableRegion};
use crate::{Error, FieldDecodeError, Result};

/// Longest string a pointer field may reference before the record is rejected
pub const MAX_STRING_LEN: usize = 512;

/// Absolute placement of a table in host memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub base: usize,
    pub stride: usize,
    /// Record count, or absolute end address (exclusive)
    pub extent: Extent,
}

impl Region {
    /// Relocate an image-relative table region
    pub fn relocate(image_base: usize, table: &TableRegion) -> Self {
        let extent = match table.extent {
            Extent::Count(n) => Extent::Count(n),
            Extent::End(end) => Extent::End(image_base.wrapping_add(end)),
        };
        Self {
            base: image_base.wrapping_add(table.offset),
            stride: table.stride,
            extent,
        }
    }

    /// Number of whole records in the region
    fn record_count(&self, table: TableId) -> Result<usize> {
        if self.stride == 0 {
            return Err(malformed(table, "zero record stride"));
        }

        match self.extent {
            Extent::Count(n) => {
                n.checked_mul(self.stride)
                    .and_then(|len| self.base.checked_add(len))
                    .ok_or_else(|| malformed(table, "region overflows the address space"))?;
                Ok(n)
            }
            Extent::End(end) => {
                if end < self.base {
                    return Err(malformed(
                        table,
                        format!("end {:#x} precedes base {:#x}", end, self.base),
                    ));
                }
                let len = end - self.base;
                if len % self.stride != 0 {
                    return Err(malformed(
                        table,
                        format!(
                            "{:#x} bytes is not a whole number of {:#x}-byte records",
                            len, self.stride
                        ),
                    ));
                }
                Ok(len / self.stride)
            }
        }
    }
}

/// Ascending key range for probed tables, `first..ceiling`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    pub first: u32,
    pub ceiling: u32,
}

fn malformed(table: TableId, reason: impl Into<String>) -> Error {
    Error::MalformedRegion {
        table,
        reason: reason.into(),
    }
}

/// Kind check for probed addresses, run on a record's leading bytes before
/// the full record is read
pub trait ProbeFilter {
    /// Leading bytes [`ProbeFilter::accept`] looks at
    fn prefix_len(&self) -> usize;

    fn accept(&self, prefix: &[u8]) -> bool;
}

/// Accepts records whose byte at `offset` equals `tag`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagEquals {
    pub offset: usize,
    pub tag: u8,
}

pub fn tag_equals(offset: usize, tag: u8) -> TagEquals {
    TagEquals { offset, tag }
}

impl ProbeFilter for TagEquals {
    fn prefix_len(&self) -> usize {
        self.offset + 1
    }

    fn accept(&self, prefix: &[u8]) -> bool {
        prefix.get(self.offset) == Some(&self.tag)
    }
}

/// A prefix length paired with any predicate over that prefix
impl<F: Fn(&[u8]) -> bool> ProbeFilter for (usize, F) {
    fn prefix_len(&self) -> usize {
        self.0
    }

    fn accept(&self, prefix: &[u8]) -> bool {
        (self.1)(prefix)
    }
}

/// Layout-driven reader over one memory source
#[derive(Clone, Copy)]
pub struct Decoder<'a> {
    source: &'a dyn MemorySource,
    max_string_len: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(source: &'a dyn MemorySource) -> Self {
        Self {
            source,
            max_string_len: MAX_STRING_LEN,
        }
    }

    pub fn with_max_string_len(mut self, max_string_len: usize) -> Self {
        self.max_string_len = max_string_len;
        self
    }

    pub fn source(&self) -> &'a dyn MemorySource {
        self.source
    }

    /// Read and decode a single record at `address`
    pub fn decode_record(
        &self,
        address: usize,
        index: usize,
        layout: &'static Layout,
    ) -> std::result::Result<Record, FieldDecodeError> {
        let bytes = self.read_window(address, layout)?;
        self.decode_fields(address, index, layout, &bytes)
    }

    fn read_window(
        &self,
        address: usize,
        layout: &'static Layout,
    ) -> std::result::Result<Vec<u8>, FieldDecodeError> {
        self.read_prefix(address, layout, layout.size)
    }

    fn read_prefix(
        &self,
        address: usize,
        layout: &'static Layout,
        len: usize,
    ) -> std::result::Result<Vec<u8>, FieldDecodeError> {
        self.source
            .read_exact(address, len)
            .map_err(|e| FieldDecodeError {
                address,
                field: layout.name,
                reason: format!("{:#}", e),
            })
    }

    fn decode_fields(
        &self,
        address: usize,
        index: usize,
        layout: &'static Layout,
        bytes: &[u8],
    ) -> std::result::Result<Record, FieldDecodeError> {
        let mut values = Vec::with_capacity(layout.fields.len());

        for field in layout.fields {
            let fail = |reason: String| FieldDecodeError {
                address,
                field: field.name,
                reason,
            };

            let end = field.offset + field.kind.width();
            let raw = bytes.get(field.offset..end).ok_or_else(|| {
                fail(format!(
                    "field ends at {:#x}, past the {:#x}-byte record",
                    end,
                    bytes.len()
                ))
            })?;

            let value = match field.kind {
                FieldKind::U8 => Value::Int(raw[0] as u64),
                FieldKind::U16 => Value::Int(LE::read_u16(raw) as u64),
                FieldKind::U32 => Value::Int(LE::read_u32(raw) as u64),
                FieldKind::U64 => Value::Int(LE::read_u64(raw)),
                FieldKind::Chars(_) => {
                    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                    Value::Chars(String::from_utf8_lossy(&raw[..len]).into_owned())
                }
                FieldKind::StringPtr => {
                    let ptr = LE::read_u64(raw) as usize;
                    if ptr == 0 {
                        Value::Text(None)
                    } else {
                        let text = self
                            .source
                            .read_cstring(ptr, self.max_string_len)
                            .map_err(|e| fail(format!("{:#}", e)))?;
                        Value::Text(Some(text))
                    }
                }
            };
            values.push(value);
        }

        Ok(Record::new(address, index, layout, values))
    }

    /// Decode a contiguous table.
    ///
    /// Fails only if the region itself is malformed; the returned iterator
    /// yields exactly one item per record slot.
    pub fn decode_array(
        &self,
        table: TableId,
        region: Region,
        layout: &'static Layout,
    ) -> Result<RecordArray<'a>> {
        if layout.size > region.stride {
            return Err(malformed(
                table,
                format!(
                    "{} is {:#x} bytes, wider than the {:#x}-byte stride",
                    layout.name, layout.size, region.stride
                ),
            ));
        }
        let count = region.record_count(table)?;

        Ok(RecordArray {
            decoder: *self,
            base: region.base,
            stride: region.stride,
            layout,
            next: 0,
            count,
        })
    }

    /// Probe keys `range.first..range.ceiling` through `lookup`.
    ///
    /// Keys the lookup can't resolve, and records `accept` rejects, are
    /// skipped silently. Only `accept.prefix_len()` bytes are read before
    /// the kind check, so a smaller form of another kind is never an error.
    pub fn probe<L, P>(
        &self,
        table: TableId,
        range: KeyRange,
        layout: &'static Layout,
        lookup: L,
        accept: P,
    ) -> Result<ProbeRecords<'a, L, P>>
    where
        L: FnMut(u32) -> Option<usize>,
        P: ProbeFilter,
    {
        if range.first >= range.ceiling {
            return Err(malformed(
                table,
                format!(
                    "first key {:#x} is not below ceiling {:#x}",
                    range.first, range.ceiling
                ),
            ));
        }

        Ok(ProbeRecords {
            decoder: *self,
            layout,
            next_key: range.first,
            ceiling: range.ceiling,
            lookup,
            accept,
        })
    }
}

/// Lazy iterator over a contiguous table
pub struct RecordArray<'a> {
    decoder: Decoder<'a>,
    base: usize,
    stride: usize,
    layout: &'static Layout,
    next: usize,
    count: usize,
}

impl RecordArray<'_> {
    /// Total record slots in the region
    pub fn slots(&self) -> usize {
        self.count
    }
}

impl Iterator for RecordArray<'_> {
    type Item = std::result::Result<Record, FieldDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let address = self.base + index * self.stride;
        Some(self.decoder.decode_record(address, index, self.layout))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for RecordArray<'_> {}

/// Lazy iterator over a key-probed table
pub struct ProbeRecords<'a, L, P> {
    decoder: Decoder<'a>,
    layout: &'static Layout,
    next_key: u32,
    ceiling: u32,
    lookup: L,
    accept: P,
}

impl<L, P> Iterator for ProbeRecords<'_, L, P>
where
    L: FnMut(u32) -> Option<usize>,
    P: ProbeFilter,
{
    type Item = std::result::Result<Record, FieldDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_key < self.ceiling {
            let key = self.next_key;
            self.next_key += 1;

            let Some(address) = (self.lookup)(key) else {
                continue;
            };

            let prefix = match self
                .decoder
                .read_prefix(address, self.layout, self.accept.prefix_len())
            {
                Ok(prefix) => prefix,
                Err(e) => return Some(Err(e)),
            };
            if !self.accept.accept(&prefix) {
                continue;
            }

            return Some(self.decoder.decode_record(address, key as usize, self.layout));
        }
        None
    }
}

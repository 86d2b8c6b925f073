//! Change-flag name resolution
//!
//! The host names change flags through one function,
//! `ShowChangeFlagsName(flag, formType, wantDescription)`, which answers
//! [`BAD_FLAG_NAME`] for bits a form type doesn't use. Every bit of every
//! change type is probed fresh on each extraction.

use std::collections::BTreeMap;

use tracing::trace;

use crate::layout::Record;

/// Sentinel the host returns for unnamed bits
pub const BAD_FLAG_NAME: &str = "Bad Flag Name";

/// Bits in a change-flags word
pub const FLAG_BITS: u8 = 32;

/// Signature shown for form types missing from the nickname table
pub const UNKNOWN_SIGNATURE: &str = "????";

/// The host's flag-name function
pub trait FlagNameSource {
    /// Name (or description) of the single bit set in `mask` for `form_type`
    fn show_flag_name(&self, mask: u32, form_type: u32, want_description: bool) -> String;
}

impl<F> FlagNameSource for F
where
    F: Fn(u32, u32, bool) -> String,
{
    fn show_flag_name(&self, mask: u32, form_type: u32, want_description: bool) -> String {
        self(mask, form_type, want_description)
    }
}

/// One change type: its index, storage form type, and signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discriminant {
    /// Change type index
    pub code: u32,
    pub form_type: u32,
    /// Four-character form signature, e.g. `NPC_`
    pub name: String,
}

/// Change types in ascending code order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscriminantTable {
    entries: Vec<Discriminant>,
}

impl DiscriminantTable {
    pub fn new(mut entries: Vec<Discriminant>) -> Self {
        entries.sort_by_key(|d| d.code);
        entries.dedup_by_key(|d| d.code);
        Self { entries }
    }

    /// Join decoded change-type and nickname records.
    ///
    /// Change type codes are the record indices, so a skipped record leaves a
    /// gap instead of shifting every later code.
    pub fn from_records(change_types: &[Record], nicknames: &[Record]) -> Self {
        let signatures: BTreeMap<u64, &str> = nicknames
            .iter()
            .map(|r| (r.index as u64, r.str("nickname")))
            .collect();

        let entries = change_types
            .iter()
            .map(|r| {
                let form_type = r.int("formType");
                let name = signatures
                    .get(&form_type)
                    .filter(|s| !s.is_empty())
                    .copied()
                    .unwrap_or(UNKNOWN_SIGNATURE);
                Discriminant {
                    code: r.index as u32,
                    form_type: form_type as u32,
                    name: name.to_string(),
                }
            })
            .collect();

        Self::new(entries)
    }

    pub fn get(&self, code: u32) -> Option<&Discriminant> {
        self.entries
            .binary_search_by_key(&code, |d| d.code)
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Signature for a change type
    pub fn name(&self, code: u32) -> Option<&str> {
        self.get(code).map(|d| d.name.as_str())
    }

    /// Storage form type for a change type
    pub fn form_type(&self, code: u32) -> Option<u32> {
        self.get(code).map(|d| d.form_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Discriminant> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A named bit within one change type's flag word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagEntry {
    pub bit: u8,
    pub name: String,
    pub description: Option<String>,
}

/// Resolved flags for one change type, ascending by bit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagTable {
    pub code: u32,
    pub entries: Vec<FlagEntry>,
}

impl FlagTable {
    pub fn entry(&self, bit: u8) -> Option<&FlagEntry> {
        self.entries.iter().find(|e| e.bit == bit)
    }
}

/// Per-(change type, bit) lookups over the host's flag-name function
pub struct FlagResolver<'a> {
    source: &'a dyn FlagNameSource,
    discriminants: &'a DiscriminantTable,
}

impl<'a> FlagResolver<'a> {
    pub fn new(source: &'a dyn FlagNameSource, discriminants: &'a DiscriminantTable) -> Self {
        Self {
            source,
            discriminants,
        }
    }

    fn query(&self, code: u32, bit: u8, want_description: bool) -> Option<String> {
        if bit >= FLAG_BITS {
            return None;
        }
        let form_type = self.discriminants.form_type(code)?;
        let text = self
            .source
            .show_flag_name(1u32 << bit, form_type, want_description);
        (text != BAD_FLAG_NAME).then_some(text)
    }

    /// Display name of `bit` for change type `code`
    pub fn name_of(&self, code: u32, bit: u8) -> Option<String> {
        self.query(code, bit, false)
    }

    /// Description of `bit` for change type `code`
    pub fn description_of(&self, code: u32, bit: u8) -> Option<String> {
        self.query(code, bit, true)
    }

    /// Probe bits 0..=31 for one change type
    pub fn probe(&self, code: u32) -> FlagTable {
        let mut entries = Vec::new();

        for bit in 0..FLAG_BITS {
            match self.name_of(code, bit) {
                Some(name) => {
                    let description = self.description_of(code, bit);
                    entries.push(FlagEntry {
                        bit,
                        name,
                        description,
                    });
                }
                None => trace!(code, bit, "unresolved change flag"),
            }
        }

        FlagTable { code, entries }
    }

    /// Probe every change type in the table
    pub fn probe_all(&self) -> Vec<FlagTable> {
        self.discriminants
            .iter()
            .map(|d| self.probe(d.code))
            .collect()
    }
}

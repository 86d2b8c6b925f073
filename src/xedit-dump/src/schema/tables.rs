//! Flat table dumps
//!
//! Semicolon-separated listings of the standalone host tables, plus the
//! signature -> name reverse lookup for default objects.

use crate::layout::Record;

use super::node::quote;

pub const ACTOR_VALUE_HEADER: &str =
    "avID;avName;formID;\"fullName\";description.unk08;flags;avType";
pub const DIALOG_SUBTYPE_HEADER: &str =
    "dstID;dstName;dstType;dstShort;dstUnk008;dstUnk014;dstUnk015;dstUnk018";

/// Actor values, numbered relative to the first probed form ID
pub fn actor_value_lines(records: &[Record], first_key: u32) -> Vec<String> {
    let mut out = vec![ACTOR_VALUE_HEADER.to_string()];
    out.extend(records.iter().map(|r| {
        format!(
            "{};{};{:x};\"{}\";{:x};{:x};{:x}",
            r.index.saturating_sub(first_key as usize),
            r.str("avName"),
            r.int("formID"),
            r.str("fullName"),
            r.int("descriptionUnk08"),
            r.int("avFlags"),
            r.int("avType"),
        )
    }));
    out
}

pub fn dialog_subtype_lines(records: &[Record]) -> Vec<String> {
    let mut out = vec![DIALOG_SUBTYPE_HEADER.to_string()];
    out.extend(records.iter().map(|r| {
        format!(
            "{};\"{}\";{};\"{}\";{};{};{};{}",
            r.index,
            r.str("name"),
            r.int("dstID"),
            r.str("shortName"),
            r.int("unk008"),
            r.int("unk014"),
            r.int("unk015"),
            r.int("unk018"),
        )
    }));
    out
}

/// Default objects; `slots` is the table's full record count
pub fn default_object_lines(records: &[Record], slots: usize) -> Vec<String> {
    let mut out = vec![format!(
        "domID;domName;domShort;formType;domUnk010;domUnk014;domFormID; {} elements",
        slots
    )];
    out.extend(records.iter().map(|r| {
        format!(
            "{};\"{}\";\"{}\";{};{};{};{:08x}",
            r.index,
            r.str("name"),
            r.str("shortName"),
            r.int("formType"),
            r.int("unk010"),
            r.int("unk014"),
            r.int("formID"),
        )
    }));
    out
}

/// `sig2Int('WWSP'), 'name'` lines for mapping signatures back to names
pub fn default_object_lookup_lines(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| {
            format!(
                "sig2Int({}), {}",
                quote(r.str("shortName")),
                quote(r.str("name"))
            )
        })
        .collect()
}

/// `formType;formSignature` listing over the nickname table
pub fn form_signature_lines(records: &[Record]) -> Vec<String> {
    let mut out = vec![format!(
        "formType;formSignature; {} elements not counting the 6 specials for Papyrus",
        records.len()
    )];
    out.extend(
        records
            .iter()
            .map(|r| format!("{:03};{}", r.index, r.str("nickname"))),
    );
    out
}

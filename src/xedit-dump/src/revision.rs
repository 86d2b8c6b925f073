//! Fallout 4 1.9.4 Address Table
//!
//! Image-relative offsets and record layouts for the one host runtime this
//! build understands. Offsets for any other runtime are meaningless, so
//! [`resolve`] refuses every other revision instead of guessing.

use std::collections::BTreeMap;
use std::fmt;

use crate::layout::{FieldKind, FieldSpec, Layout};
use crate::{Error, Result};

/// Host runtime version token, packed as `major<<24 | minor<<16 | build<<4`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Revision(pub u32);

impl Revision {
    pub const fn new(major: u32, minor: u32, build: u32) -> Self {
        Self((major << 24) | (minor << 16) | ((build & 0xFFF) << 4))
    }

    pub const fn major(self) -> u32 {
        self.0 >> 24
    }

    pub const fn minor(self) -> u32 {
        (self.0 >> 16) & 0xFF
    }

    pub const fn build(self) -> u32 {
        (self.0 >> 4) & 0xFFF
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{} ({:08X})",
            self.major(),
            self.minor(),
            self.build(),
            self.0
        )
    }
}

/// The only runtime the compiled-in table describes
pub const SUPPORTED_REVISION: Revision = Revision::new(1, 9, 4);

/// Host tables the extraction reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableId {
    /// Change type index -> form type (u32 array)
    ChangeFormTypes,
    /// Form type -> four-character signature
    FormTypeNicknames,
    /// Dialogue subtype descriptors
    DialogSubtypes,
    /// Default object manager entries
    DefaultObjects,
    /// Actor values, probed by form ID
    ActorValues,
    /// Console command table (address supplied by the host)
    ConsoleCommands,
    /// Script command table (address supplied by the host)
    ScriptCommands,
}

impl TableId {
    pub fn label(self) -> &'static str {
        match self {
            TableId::ChangeFormTypes => "change form types",
            TableId::FormTypeNicknames => "form type nicknames",
            TableId::DialogSubtypes => "dialog subtypes",
            TableId::DefaultObjects => "default objects",
            TableId::ActorValues => "actor values",
            TableId::ConsoleCommands => "console commands",
            TableId::ScriptCommands => "script commands",
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How far a table extends past its base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    /// Fixed number of records
    Count(usize),
    /// Image-relative end offset (exclusive)
    End(usize),
}

/// One table's placement in the host image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRegion {
    /// Image-relative offset of the first record
    pub offset: usize,
    pub extent: Extent,
    pub stride: usize,
    pub layout: &'static Layout,
}

/// Key range for tables reached through the host's form lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRange {
    /// First key probed
    pub first_key: u32,
    /// Keys stay strictly below this
    pub ceiling: u32,
    /// Byte offset of the record kind tag
    pub tag_offset: usize,
    /// Kind tag a record must carry to be decoded
    pub tag: u8,
    pub layout: &'static Layout,
}

/// Resolved table locations for one host revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressTable {
    pub revision: Revision,
    /// Image-relative offset of the flag-name function
    pub flag_name_fn: usize,
    pub actor_values: ProbeRange,
    regions: BTreeMap<TableId, TableRegion>,
}

impl AddressTable {
    pub fn region(&self, id: TableId) -> Option<&TableRegion> {
        self.regions.get(&id)
    }

    pub fn regions(&self) -> impl Iterator<Item = (TableId, &TableRegion)> {
        self.regions.iter().map(|(id, region)| (*id, region))
    }

    /// Number of change types, i.e. discriminants
    pub fn change_type_count(&self) -> usize {
        match self.regions.get(&TableId::ChangeFormTypes).map(|r| r.extent) {
            Some(Extent::Count(n)) => n,
            _ => 0,
        }
    }
}

/// Resolve table locations for the running host.
///
/// Pure function of the revision token: either the full compiled-in table or
/// [`Error::UnsupportedRevision`].
pub fn resolve(revision: Revision) -> Result<AddressTable> {
    if revision != SUPPORTED_REVISION {
        return Err(Error::UnsupportedRevision {
            found: revision,
            supported: SUPPORTED_REVISION,
        });
    }

    Ok(AddressTable {
        revision,
        flag_name_fn: SHOW_CHANGE_FLAGS_NAME_OFFSET,
        actor_values: ACTOR_VALUE_PROBE,
        regions: REGIONS_1_9_4.iter().copied().collect(),
    })
}

// -- Runtime 1.9.4 offsets (image-relative) --

/// `char *ShowChangeFlagsName(u32 flag, u32 formType, bool description)`
pub const SHOW_CHANGE_FLAGS_NAME_OFFSET: usize = 0x00CB_D070;

/// Change type -> form type array
pub const CHANGE_FORM_TYPE_ARRAY_OFFSET: usize = 0x0371_A150;

/// Valid change types on this runtime (the first is TESClass)
pub const CHANGE_TYPE_COUNT: usize = 50;

/// Form type nickname table, one entry per form type
pub const FORM_TYPE_NICKNAMES_OFFSET: usize = 0x0366_7780;

/// Number of form types (kFormType_Max), not counting the Papyrus specials
pub const FORM_TYPE_COUNT: usize = 159;

/// Dialogue subtypes; the first is CUST (Custom)
pub const DIALOG_SUBTYPES_OFFSET: usize = 0x036A_73F0;
pub const DIALOG_SUBTYPES_END: usize = 0x036A_8778;

/// Default object manager array; the first is WWSP
pub const DEFAULT_OBJECTS_OFFSET: usize = 0x0367_CC00;
pub const DEFAULT_OBJECTS_END: usize = 0x0367_FD40;

/// Actor values live at form IDs 0x2BC..0x800 with form type AVIF
pub const FIRST_ACTOR_VALUE_ID: u32 = 0x2BC;
pub const ACTOR_VALUE_ID_CEILING: u32 = 0x800;
pub const FORM_TYPE_AVIF: u8 = 98;

/// TESForm::formType
pub const FORM_TYPE_OFFSET: usize = 0x1A;

// -- Layouts --

// struct FormTypeNickname {
//   char formType;      // +0x00
//   char pad01[7];
//   char *nickname;     // +0x08
//   u32 unk10;          // +0x10
//   u32 pad14;
// }; // Size: 0x18
pub static FORM_TYPE_NICKNAME: Layout = Layout {
    name: "FormTypeNickname",
    size: 0x18,
    fields: &[
        FieldSpec::new("nickname", 0x08, FieldKind::StringPtr),
    ],
};

pub static CHANGE_FORM_TYPE: Layout = Layout {
    name: "ChangeFormType",
    size: 0x04,
    fields: &[FieldSpec::new("formType", 0x00, FieldKind::U32)],
};

// struct DialogSubtype {
//   const char *name;   // +0x00
//   char unk008;        // +0x08
//   char shortName[4];  // +0x0C
//   char dstID;         // +0x10
//   char unk014;        // +0x14
//   char unk015;        // +0x15
//   char unk018;        // +0x18
// }; // Size: 0x28
pub static DIALOG_SUBTYPE: Layout = Layout {
    name: "DialogSubtype",
    size: 0x28,
    fields: &[
        FieldSpec::new("name", 0x00, FieldKind::StringPtr),
        FieldSpec::new("unk008", 0x08, FieldKind::U8),
        FieldSpec::new("shortName", 0x0C, FieldKind::Chars(4)),
        FieldSpec::new("dstID", 0x10, FieldKind::U8),
        FieldSpec::new("unk014", 0x14, FieldKind::U8),
        FieldSpec::new("unk015", 0x15, FieldKind::U8),
        FieldSpec::new("unk018", 0x18, FieldKind::U8),
    ],
};

// struct DataDOM {
//   const char *name;   // +0x00
//   u8 formType;        // +0x08
//   char shortName[4];  // +0x0C
//   u32 unk010;         // +0x10
//   u32 unk014;         // +0x14
//   u32 formID;         // +0x18
// }; // Size: 0x20
pub static DEFAULT_OBJECT: Layout = Layout {
    name: "DefaultObject",
    size: 0x20,
    fields: &[
        FieldSpec::new("name", 0x00, FieldKind::StringPtr),
        FieldSpec::new("formType", 0x08, FieldKind::U8),
        FieldSpec::new("shortName", 0x0C, FieldKind::Chars(4)),
        FieldSpec::new("unk010", 0x10, FieldKind::U32),
        FieldSpec::new("unk014", 0x14, FieldKind::U32),
        FieldSpec::new("formID", 0x18, FieldKind::U32),
    ],
};

// class ActorValueInfo : public TESForm {
//   u32 formID;               // +0x14 (TESForm)
//   u8 formType;              // +0x1A (TESForm)
//   TESFullName fullName;     // +0x20, name at +0x28
//   TESDescription desc;      // +0x30, unk08 at +0x38
//   const char *avName;       // +0x48
//   ...
//   u32 avFlags;              // +0x1B0
//   u32 avType;               // +0x1B4
// };
pub static ACTOR_VALUE_INFO: Layout = Layout {
    name: "ActorValueInfo",
    size: 0x1B8,
    fields: &[
        FieldSpec::new("formID", 0x14, FieldKind::U32),
        FieldSpec::new("formType", FORM_TYPE_OFFSET, FieldKind::U8),
        FieldSpec::new("fullName", 0x28, FieldKind::StringPtr),
        FieldSpec::new("descriptionUnk08", 0x38, FieldKind::U32),
        FieldSpec::new("avName", 0x48, FieldKind::StringPtr),
        FieldSpec::new("avFlags", 0x1B0, FieldKind::U32),
        FieldSpec::new("avType", 0x1B4, FieldKind::U32),
    ],
};

// struct ObScriptCommand {
//   const char *longName;   // +0x00
//   const char *shortName;  // +0x08
//   u32 opcode;             // +0x10
//   const char *helpText;   // +0x18
//   u8 needsParent;         // +0x20
//   u16 numParams;          // +0x22
//   ObScriptParam *params;  // +0x28
//   void *execute;          // +0x30
//   void *parse;            // +0x38
//   void *eval;             // +0x40
//   u32 flags;              // +0x48
// }; // Size: 0x50
pub static SCRIPT_COMMAND: Layout = Layout {
    name: "ObScriptCommand",
    size: 0x50,
    fields: &[
        FieldSpec::new("longName", 0x00, FieldKind::StringPtr),
        FieldSpec::new("numParams", 0x22, FieldKind::U16),
        FieldSpec::new("params", 0x28, FieldKind::U64),
        FieldSpec::new("eval", 0x40, FieldKind::U64),
    ],
};

// struct ObScriptParam {
//   const char *typeStr;  // +0x00
//   u32 typeID;           // +0x08
//   u32 isOptional;       // +0x0C
// }; // Size: 0x10
pub static SCRIPT_PARAM: Layout = Layout {
    name: "ObScriptParam",
    size: 0x10,
    fields: &[
        FieldSpec::new("typeStr", 0x00, FieldKind::StringPtr),
    ],
};

static ACTOR_VALUE_PROBE: ProbeRange = ProbeRange {
    first_key: FIRST_ACTOR_VALUE_ID,
    ceiling: ACTOR_VALUE_ID_CEILING,
    tag_offset: FORM_TYPE_OFFSET,
    tag: FORM_TYPE_AVIF,
    layout: &ACTOR_VALUE_INFO,
};

static REGIONS_1_9_4: &[(TableId, TableRegion)] = &[
    (
        TableId::ChangeFormTypes,
        TableRegion {
            offset: CHANGE_FORM_TYPE_ARRAY_OFFSET,
            extent: Extent::Count(CHANGE_TYPE_COUNT),
            stride: 0x04,
            layout: &CHANGE_FORM_TYPE,
        },
    ),
    (
        TableId::FormTypeNicknames,
        TableRegion {
            offset: FORM_TYPE_NICKNAMES_OFFSET,
            extent: Extent::Count(FORM_TYPE_COUNT),
            stride: 0x18,
            layout: &FORM_TYPE_NICKNAME,
        },
    ),
    (
        TableId::DialogSubtypes,
        TableRegion {
            offset: DIALOG_SUBTYPES_OFFSET,
            extent: Extent::End(DIALOG_SUBTYPES_END),
            stride: 0x28,
            layout: &DIALOG_SUBTYPE,
        },
    ),
    (
        TableId::DefaultObjects,
        TableRegion {
            offset: DEFAULT_OBJECTS_OFFSET,
            extent: Extent::End(DEFAULT_OBJECTS_END),
            stride: 0x20,
            layout: &DEFAULT_OBJECT,
        },
    ),
];

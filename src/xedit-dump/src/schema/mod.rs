//! xEdit schema emission
//!
//! Turns resolved change types, probed flags, and decoded host tables into
//! `wb*` definition text.

mod build;
mod ident;
mod node;
mod tables;

pub use build::{
    ChangeFormSchema, ChangeTypeSchema, FlagUnion, CHANGED_FORM_IDENT, CHANGE_FLAGS_IDENT,
    CHANGE_TYPES_IDENT, UNION_PREFIX,
};
pub use ident::{is_valid_ident, sanitize, IdentRequest, IdentScope};
pub use node::{quote, Decl, FlagSlot, Leaf, SchemaNode};
pub use tables::{
    actor_value_lines, default_object_lookup_lines, default_object_lines, dialog_subtype_lines,
    form_signature_lines, ACTOR_VALUE_HEADER, DIALOG_SUBTYPE_HEADER,
};

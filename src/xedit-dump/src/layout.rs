//! Record layouts and decoded records
//!
//! A [`Layout`] describes where each field of a fixed-width host record
//! lives. The decoder interprets raw bytes through it; nothing is ever
//! reinterpreted by pointer cast.

use std::fmt;

/// Field encoding within a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    U64,
    /// Inline character array, truncated at the first NUL
    Chars(usize),
    /// Pointer to a null-terminated string elsewhere in host memory
    StringPtr,
}

impl FieldKind {
    /// Bytes the field occupies inside the record
    pub const fn width(&self) -> usize {
        match self {
            FieldKind::U8 => 1,
            FieldKind::U16 => 2,
            FieldKind::U32 => 4,
            FieldKind::U64 | FieldKind::StringPtr => 8,
            FieldKind::Chars(n) => *n,
        }
    }
}

/// One named field at a fixed byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, offset: usize, kind: FieldKind) -> Self {
        Self { name, offset, kind }
    }
}

/// Ordered field description of one record type
#[derive(Debug, PartialEq, Eq)]
pub struct Layout {
    pub name: &'static str,
    /// Bytes read per record
    pub size: usize,
    pub fields: &'static [FieldSpec],
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(u64),
    /// Contents of an inline character array
    Chars(String),
    /// Owned copy of a pointed-to string; `None` for a null pointer
    Text(Option<String>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Chars(s) => f.write_str(s),
            Value::Text(Some(s)) => f.write_str(s),
            Value::Text(None) => Ok(()),
        }
    }
}

/// One fully decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Host address of the record
    pub address: usize,
    /// Position within its table (or probe key for probed tables)
    pub index: usize,
    pub layout: &'static Layout,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn new(
        address: usize,
        index: usize,
        layout: &'static Layout,
        values: Vec<Value>,
    ) -> Self {
        debug_assert_eq!(values.len(), layout.fields.len());
        Self {
            address,
            index,
            layout,
            values,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.layout
            .fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| &self.values[i])
    }

    /// Named field that the layout must declare
    fn field(&self, name: &str) -> Option<&Value> {
        let value = self.get(name);
        debug_assert!(
            value.is_some(),
            "{} layout has no field {:?}",
            self.layout.name,
            name
        );
        value
    }

    /// Integer field value; 0 if the field is not an integer.
    ///
    /// `name` must be a field of the layout (checked in debug builds).
    pub fn int(&self, name: &str) -> u64 {
        match self.field(name) {
            Some(Value::Int(v)) => *v,
            _ => 0,
        }
    }

    /// String field value; empty for null pointers.
    ///
    /// `name` must be a field of the layout (checked in debug builds).
    pub fn str(&self, name: &str) -> &str {
        match self.field(name) {
            Some(Value::Chars(s)) | Some(Value::Text(Some(s))) => s,
            _ => "",
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.layout
            .fields
            .iter()
            .map(|f| f.name)
            .zip(self.values.iter())
    }
}

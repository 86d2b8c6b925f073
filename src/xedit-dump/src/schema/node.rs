//! Schema nodes and their xEdit definition syntax
//!
//! Nodes render to Pascal-style `wb*` definition calls. [`SchemaNode::render`]
//! returns the first line unindented (the caller decides what precedes it)
//! and every following line fully indented.

/// Primitive, self-contained definitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaf {
    /// `wbNull`
    Null,
    /// `wbByteArray('label', counter)`
    ByteArray { label: String, counter: String },
}

/// One bit of a flag set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSlot {
    pub bit: u8,
    pub name: String,
    pub description: Option<String>,
    /// Name was synthesized because the host had none for this bit
    pub placeholder: bool,
}

impl FlagSlot {
    pub fn named(bit: u8, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            bit,
            name: name.into(),
            description,
            placeholder: false,
        }
    }

    /// `UnnamedFlagBB`
    pub fn placeholder(bit: u8) -> Self {
        Self {
            bit,
            name: format!("UnnamedFlag{:02}", bit),
            description: None,
            placeholder: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    /// A previously declared identifier
    Ref(String),
    Leaf(Leaf),
    Struct {
        label: String,
        /// Trailing `{...}` comment on the opening line
        note: Option<String>,
        fields: Vec<SchemaNode>,
    },
    Union {
        label: String,
        /// Name of the decider routine the consuming tool supplies
        decider: String,
        variants: Vec<SchemaNode>,
    },
    /// 32-bit integer with named bits
    FlagSet { label: String, slots: Vec<FlagSlot> },
    /// Key enumeration
    Enum { entries: Vec<String> },
}

/// Pascal string literal
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn pad(indent: usize) -> String {
    " ".repeat(indent)
}

/// Render `items` one per line at `indent`, comma-separated
fn push_children(out: &mut Vec<String>, children: &[SchemaNode], indent: usize) {
    let count = children.len();
    for (i, child) in children.iter().enumerate() {
        let mut lines = child.render(indent);
        lines[0] = format!("{}{}", pad(indent), lines[0]);
        if i + 1 < count {
            if let Some(last) = lines.last_mut() {
                last.push(',');
            }
        }
        out.extend(lines);
    }
}

impl SchemaNode {
    /// Pascal interface type of a declaration holding this node
    pub fn def_type(&self) -> &'static str {
        match self {
            SchemaNode::Ref(_) | SchemaNode::Leaf(_) => "IwbValueDef",
            SchemaNode::Struct { .. } => "IwbStructDef",
            SchemaNode::Union { .. } => "IwbUnionDef",
            SchemaNode::FlagSet { .. } => "IwbIntegerDef",
            SchemaNode::Enum { .. } => "IwbEnumDef",
        }
    }

    fn is_single_line(&self) -> bool {
        matches!(self, SchemaNode::Ref(_) | SchemaNode::Leaf(_))
    }

    pub fn render(&self, indent: usize) -> Vec<String> {
        match self {
            SchemaNode::Ref(ident) => vec![ident.clone()],
            SchemaNode::Leaf(Leaf::Null) => vec!["wbNull".to_string()],
            SchemaNode::Leaf(Leaf::ByteArray { label, counter }) => {
                vec![format!("wbByteArray({}, {})", quote(label), counter)]
            }
            SchemaNode::Union {
                label,
                decider,
                variants,
            } => {
                if variants.len() <= 2 && variants.iter().all(|v| v.is_single_line()) {
                    let inline: Vec<String> =
                        variants.iter().flat_map(|v| v.render(0)).collect();
                    return vec![format!(
                        "wbUnion({}, {}, [{}])",
                        quote(label),
                        decider,
                        inline.join(", ")
                    )];
                }

                let mut out = vec![format!("wbUnion({}, {}, [", quote(label), decider)];
                push_children(&mut out, variants, indent + 2);
                out.push(format!("{}])", pad(indent)));
                out
            }
            SchemaNode::Struct {
                label,
                note,
                fields,
            } => {
                let mut head = format!("wbStruct({}, [", quote(label));
                if let Some(note) = note {
                    head.push_str(&format!(" {{{}}}", note));
                }
                let mut out = vec![head];
                push_children(&mut out, fields, indent + 2);
                out.push(format!("{}])", pad(indent)));
                out
            }
            SchemaNode::FlagSet { label, slots } => {
                let mut out = vec![format!("wbInteger({}, itU32, wbFlags([", quote(label))];
                let count = slots.len();
                for (i, slot) in slots.iter().enumerate() {
                    let comma = if i + 1 < count { "," } else { "" };
                    let mut line = format!(
                        "{}{{{:02}}} {}{}",
                        pad(indent + 2),
                        slot.bit,
                        quote(&slot.name),
                        comma
                    );
                    if let Some(description) = &slot.description {
                        line.push_str(&format!(" // {}", description));
                    }
                    out.push(line);
                }
                out.push(format!("{}]))", pad(indent)));
                out
            }
            SchemaNode::Enum { entries } => {
                let mut out = vec!["wbKey2Data6Enum([".to_string()];
                let count = entries.len();
                for (i, entry) in entries.iter().enumerate() {
                    let comma = if i + 1 < count { "," } else { "" };
                    out.push(format!("{}{}{}", pad(indent + 2), quote(entry), comma));
                }
                out.push(format!("{}])", pad(indent)));
                out
            }
        }
    }
}

/// A named top-level definition: `ident := node;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub ident: String,
    /// `// ...` line emitted above the definition
    pub comment: Option<String>,
    pub node: SchemaNode,
}

impl Decl {
    pub fn new(ident: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            ident: ident.into(),
            comment: None,
            node,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Variable declaration line, `  ident : IwbUnionDef;`
    pub fn forward(&self) -> String {
        format!("  {} : {};", self.ident, self.node.def_type())
    }

    pub fn render(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(comment) = &self.comment {
            out.push(format!("  // {}", comment));
        }

        let mut lines = self.node.render(2);
        lines[0] = format!("  {} := {}", self.ident, lines[0]);
        if let Some(last) = lines.last_mut() {
            last.push(';');
        }
        out.extend(lines);
        out
    }
}

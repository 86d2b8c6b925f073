//! Schema document assembly
//!
//! A document is a fixed sequence of sections, each opened by [`SEPARATOR`],
//! with one closing separator after the last. A section that could not be
//! produced (or was only partly produced) carries an `// unavailable:` line
//! saying why.

use std::fmt;

use crate::sink::OutputSink;

/// Section delimiter line
pub const SEPARATOR: &str = "*****************************************************************************************************";

/// Document sections in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    ChangeTypes,
    ChangeFlags,
    FlagUnions,
    ChangedForm,
    TableDumps,
    ReverseLookups,
    FormSignatures,
    ConsoleFunctions,
    ScriptFunctions,
    ConditionFunctions,
}

impl Section {
    /// Sections every document has
    pub const CORE: [Section; 6] = [
        Section::ChangeTypes,
        Section::ChangeFlags,
        Section::FlagUnions,
        Section::ChangedForm,
        Section::TableDumps,
        Section::ReverseLookups,
    ];

    /// Sections emitted only when command tables are requested
    pub const COMMAND_TABLES: [Section; 4] = [
        Section::FormSignatures,
        Section::ConsoleFunctions,
        Section::ScriptFunctions,
        Section::ConditionFunctions,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Section::ChangeTypes => "change types",
            Section::ChangeFlags => "change flags",
            Section::FlagUnions => "flag unions",
            Section::ChangedForm => "changed form data",
            Section::TableDumps => "table dumps",
            Section::ReverseLookups => "reverse lookups",
            Section::FormSignatures => "form signatures",
            Section::ConsoleFunctions => "console functions",
            Section::ScriptFunctions => "script functions",
            Section::ConditionFunctions => "condition functions",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// `// unavailable: <reason>`
pub fn unavailable(reason: &str) -> String {
    format!("// unavailable: {}", reason)
}

/// Body of one section plus the reasons any part of it is missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionOutput {
    pub section: Section,
    pub lines: Vec<String>,
    pub failures: Vec<String>,
}

impl SectionOutput {
    pub fn new(section: Section) -> Self {
        Self {
            section,
            lines: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn extend(&mut self, lines: impl IntoIterator<Item = String>) {
        self.lines.extend(lines);
    }

    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// Record a failure and leave a marker line in its place
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.lines.push(unavailable(&reason));
        self.failures.push(reason);
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    sections: Vec<SectionOutput>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, section: SectionOutput) {
        self.sections.push(section);
    }

    pub fn sections(&self) -> &[SectionOutput] {
        &self.sections
    }

    /// `(section, reason)` for every failure, in document order
    pub fn failures(&self) -> Vec<(Section, String)> {
        self.sections
            .iter()
            .flat_map(|s| s.failures.iter().map(move |r| (s.section, r.clone())))
            .collect()
    }

    /// Stream the document; returns the number of lines written
    pub fn write_to(&self, sink: &mut dyn OutputSink) -> usize {
        let mut written = 0;
        let mut emit = |line: &str| {
            sink.write_line(line);
            written += 1;
        };

        for section in &self.sections {
            emit(SEPARATOR);
            for line in &section.lines {
                emit(line);
            }
            emit("");
        }
        if !self.sections.is_empty() {
            emit(SEPARATOR);
        }
        written
    }
}

//! Extraction orchestration
//!
//! One synchronous pass over the host:
//!
//! ```text
//! Idle -> Resolving -> Decoding -> ResolvingFlags -> Emitting -> Done
//!             |
//!             +-> Failed (revision mismatch, nothing emitted)
//! ```
//!
//! Table-level failures never abort the pass. The affected section gets an
//! `// unavailable:` marker and everything else is still emitted. Record
//! failures are logged and skipped.

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::commands::{self, Command, CommandTable};
use crate::decode::{tag_equals, Decoder, KeyRange, Region, MAX_STRING_LEN};
use crate::document::{Document, Section, SectionOutput};
use crate::flags::{DiscriminantTable, FlagNameSource, FlagResolver};
use crate::layout::Record;
use crate::memory::MemorySource;
use crate::revision::{self, AddressTable, Revision, TableId};
use crate::schema::{self, ChangeFormSchema};
use crate::sink::OutputSink;
use crate::{FieldDecodeError, Result};

/// What the extractor needs from the running host
pub trait Host {
    /// Runtime version token
    fn revision(&self) -> Revision;

    /// Load address of the host image
    fn image_base(&self) -> usize;

    fn memory(&self) -> &dyn MemorySource;

    /// Bind the flag-name function at absolute address `function`
    fn flag_names(&self, function: usize) -> Box<dyn FlagNameSource + '_>;

    /// Address of the form with `form_id`, if it exists
    fn lookup_form(&self, form_id: u32) -> Option<usize>;

    /// Placement of a command table; only the console and script tables
    /// are ever asked for
    fn command_table(&self, _table: TableId) -> Option<CommandTable> {
        None
    }
}

/// Extraction state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Resolving,
    Decoding,
    ResolvingFlags,
    Emitting,
    Done,
    Failed(String),
}

/// Extraction settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Also emit form signatures and the console/script/condition function
    /// tables
    pub command_tables: bool,
    /// Longest string a pointer field may reference
    pub max_string_len: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            command_tables: false,
            max_string_len: MAX_STRING_LEN,
        }
    }
}

/// Summary of a finished pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Lines handed to the sink
    pub lines: usize,
    /// Records dropped for decode errors
    pub skipped_records: usize,
    /// Sections emitted with an `unavailable` marker, and why
    pub failed_sections: Vec<(Section, String)>,
}

impl ExtractionReport {
    pub fn is_complete(&self) -> bool {
        self.failed_sections.is_empty()
    }
}

/// Decoded table, or why it is missing
type Table = std::result::Result<Decoded, String>;
type Commands = std::result::Result<Vec<Command>, String>;

struct Decoded {
    records: Vec<Record>,
    /// Record slots in the region, decoded or not
    slots: usize,
}

struct Tables {
    change_types: Table,
    nicknames: Table,
    dialog_subtypes: Table,
    default_objects: Table,
    actor_values: Table,
    console: Commands,
    script: Commands,
}

pub struct Extractor<'h> {
    host: &'h dyn Host,
    options: ExtractOptions,
    stage: Stage,
    skipped: usize,
}

impl<'h> Extractor<'h> {
    pub fn new(host: &'h dyn Host, options: ExtractOptions) -> Self {
        Self {
            host,
            options,
            stage: Stage::Idle,
            skipped: 0,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    fn enter(&mut self, stage: Stage) {
        info!(from = ?self.stage, to = ?stage, "extraction stage");
        self.stage = stage;
    }

    /// Run one full pass, streaming the document into `sink`.
    ///
    /// Only a revision mismatch is an error, and in that case nothing is
    /// written.
    pub fn run(&mut self, sink: &mut dyn OutputSink) -> Result<ExtractionReport> {
        self.skipped = 0;
        let host = self.host;

        self.enter(Stage::Resolving);
        let table = match revision::resolve(host.revision()) {
            Ok(table) => table,
            Err(e) => {
                error!(error = %e, "extraction refused");
                self.enter(Stage::Failed(e.to_string()));
                return Err(e);
            }
        };
        info!(
            revision = %table.revision,
            "extracting at image base {:#x}",
            host.image_base()
        );

        self.enter(Stage::Decoding);
        let decoder = Decoder::new(host.memory()).with_max_string_len(self.options.max_string_len);
        let tables = self.decode_tables(&decoder, &table);

        self.enter(Stage::ResolvingFlags);
        let schema = self.resolve_schema(&table, &tables);

        self.enter(Stage::Emitting);
        let document = self.assemble(&tables, &schema);
        let lines = document.write_to(sink);
        let failed_sections = document.failures();
        for (section, reason) in &failed_sections {
            warn!(section = %section, reason = %reason, "section incomplete");
        }

        info!(
            lines,
            skipped = self.skipped,
            failed = failed_sections.len(),
            "extraction finished"
        );
        self.enter(Stage::Done);

        Ok(ExtractionReport {
            lines,
            skipped_records: self.skipped,
            failed_sections,
        })
    }

    fn decode_tables(&mut self, decoder: &Decoder<'_>, table: &AddressTable) -> Tables {
        let change_types = self.decode_region(decoder, table, TableId::ChangeFormTypes);
        let nicknames = self.decode_region(decoder, table, TableId::FormTypeNicknames);
        let dialog_subtypes = self.decode_region(decoder, table, TableId::DialogSubtypes);
        let default_objects = self.decode_region(decoder, table, TableId::DefaultObjects);
        let actor_values = self.probe_actor_values(decoder, table);

        let (console, script) = if self.options.command_tables {
            (
                self.decode_commands(decoder, TableId::ConsoleCommands),
                self.decode_commands(decoder, TableId::ScriptCommands),
            )
        } else {
            (Ok(Vec::new()), Ok(Vec::new()))
        };

        Tables {
            change_types,
            nicknames,
            dialog_subtypes,
            default_objects,
            actor_values,
            console,
            script,
        }
    }

    /// Keep the records that decoded, log and count the rest
    fn keep<T>(
        &mut self,
        id: TableId,
        items: impl IntoIterator<Item = std::result::Result<T, FieldDecodeError>>,
    ) -> Vec<T> {
        let mut kept = Vec::new();
        for item in items {
            match item {
                Ok(value) => kept.push(value),
                Err(e) => {
                    warn!(table = %id, error = %e, "skipping record");
                    self.skipped += 1;
                }
            }
        }
        kept
    }

    fn decode_region(&mut self, decoder: &Decoder<'_>, table: &AddressTable, id: TableId) -> Table {
        let region = table
            .region(id)
            .ok_or_else(|| format!("no {} table for revision {}", id, table.revision))?;
        let placed = Region::relocate(self.host.image_base(), region);

        let array = decoder
            .decode_array(id, placed, region.layout)
            .map_err(|e| {
                warn!(table = %id, error = %e, "table unavailable");
                e.to_string()
            })?;
        let slots = array.slots();
        let records = self.keep(id, array);
        debug!(table = %id, decoded = records.len(), slots, "decoded table");

        Ok(Decoded { records, slots })
    }

    fn probe_actor_values(&mut self, decoder: &Decoder<'_>, table: &AddressTable) -> Table {
        let host = self.host;
        let range = table.actor_values;

        let probed = decoder
            .probe(
                TableId::ActorValues,
                KeyRange {
                    first: range.first_key,
                    ceiling: range.ceiling,
                },
                range.layout,
                |key| host.lookup_form(key),
                tag_equals(range.tag_offset, range.tag),
            )
            .map_err(|e| {
                warn!(table = %TableId::ActorValues, error = %e, "table unavailable");
                e.to_string()
            })?;
        let records = self.keep(TableId::ActorValues, probed);
        debug!(table = %TableId::ActorValues, decoded = records.len(), "probed table");

        Ok(Decoded {
            slots: records.len(),
            records,
        })
    }

    fn decode_commands(&mut self, decoder: &Decoder<'_>, id: TableId) -> Commands {
        let placement = self
            .host
            .command_table(id)
            .ok_or_else(|| format!("host reports no {} table", id))?;

        let decoded = commands::decode_commands(decoder, id, placement).map_err(|e| {
            warn!(table = %id, error = %e, "table unavailable");
            e.to_string()
        })?;
        let kept = self.keep(id, decoded);
        debug!(table = %id, decoded = kept.len(), slots = placement.count, "decoded commands");

        Ok(kept)
    }

    fn resolve_schema(
        &self,
        table: &AddressTable,
        tables: &Tables,
    ) -> std::result::Result<ChangeFormSchema, String> {
        let change_types = tables.change_types.as_ref().map_err(String::clone)?;
        let nicknames = tables
            .nicknames
            .as_ref()
            .map(|d| d.records.as_slice())
            .unwrap_or_default();
        let discriminants = DiscriminantTable::from_records(&change_types.records, nicknames);

        let function = self.host.image_base().wrapping_add(table.flag_name_fn);
        let names = self.host.flag_names(function);
        let flags = FlagResolver::new(&*names, &discriminants).probe_all();

        let named: usize = flags.iter().map(|t| t.entries.len()).sum();
        info!(
            change_types = discriminants.len(),
            named_flags = named,
            "resolved change flags"
        );

        Ok(ChangeFormSchema::build(&discriminants, &flags))
    }

    fn assemble(
        &self,
        tables: &Tables,
        schema: &std::result::Result<ChangeFormSchema, String>,
    ) -> Document {
        let mut doc = Document::new();

        doc.push(section(Section::ChangeTypes, schema, |s| s.change_type_lines()));
        doc.push(section(Section::ChangeFlags, schema, |s| s.flag_set_lines()));
        doc.push(section(Section::FlagUnions, schema, |s| s.union_lines()));
        doc.push(section(Section::ChangedForm, schema, |s| s.changed_form_lines()));

        let mut dumps = SectionOutput::new(Section::TableDumps);
        append(&mut dumps, &tables.actor_values, |d| {
            schema::actor_value_lines(&d.records, revision::FIRST_ACTOR_VALUE_ID)
        });
        dumps.blank();
        append(&mut dumps, &tables.dialog_subtypes, |d| {
            schema::dialog_subtype_lines(&d.records)
        });
        dumps.blank();
        append(&mut dumps, &tables.default_objects, |d| {
            schema::default_object_lines(&d.records, d.slots)
        });
        doc.push(dumps);

        doc.push(section(Section::ReverseLookups, &tables.default_objects, |d| {
            schema::default_object_lookup_lines(&d.records)
        }));

        if self.options.command_tables {
            doc.push(section(Section::FormSignatures, &tables.nicknames, |d| {
                schema::form_signature_lines(&d.records)
            }));
            doc.push(section(Section::ConsoleFunctions, &tables.console, |c| {
                commands::function_lines("wbConsoleFunctions", c)
            }));
            doc.push(section(Section::ScriptFunctions, &tables.script, |c| {
                commands::function_lines("wbFunctions", c)
            }));
            doc.push(section(Section::ConditionFunctions, &tables.script, |c| {
                commands::condition_function_lines(c)
            }));
        }

        doc
    }
}

fn append<T>(
    out: &mut SectionOutput,
    source: &std::result::Result<T, String>,
    render: impl FnOnce(&T) -> Vec<String>,
) {
    match source {
        Ok(value) => out.extend(render(value)),
        Err(reason) => out.fail(reason.clone()),
    }
}

fn section<T>(
    id: Section,
    source: &std::result::Result<T, String>,
    render: impl FnOnce(&T) -> Vec<String>,
) -> SectionOutput {
    let mut out = SectionOutput::new(id);
    append(&mut out, source, render);
    out
}

/// Run one extraction pass against `host`
pub fn run_extraction(
    host: &dyn Host,
    options: ExtractOptions,
    sink: &mut dyn OutputSink,
) -> Result<ExtractionReport> {
    Extractor::new(host, options).run(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SEPARATOR;
    use crate::flags::tests::ScriptedFlags;
    use crate::memory::MockMemorySource;
    use crate::revision::{
        CHANGE_FORM_TYPE_ARRAY_OFFSET, DEFAULT_OBJECTS_END, DEFAULT_OBJECTS_OFFSET,
        DIALOG_SUBTYPES_END, DIALOG_SUBTYPES_OFFSET, FORM_TYPE_NICKNAMES_OFFSET,
        SHOW_CHANGE_FLAGS_NAME_OFFSET, SUPPORTED_REVISION,
    };
    use crate::Error;
    use anyhow::anyhow;
    use std::cell::Cell;
    use std::collections::HashMap;

    const IMAGE_BASE: usize = 0x1_4000_0000;
    const HEAP: usize = 0x2000_0000;

    /// Disjoint mapped ranges
    struct Segments(Vec<MockMemorySource>);

    impl Segments {
        fn at(&mut self, address: usize) -> &mut MockMemorySource {
            self.0
                .iter_mut()
                .find(|s| address >= s.base_address && address < s.base_address + s.data.len())
                .unwrap()
        }
    }

    impl MemorySource for Segments {
        fn read_bytes(&self, address: usize, size: usize) -> anyhow::Result<Vec<u8>> {
            self.0
                .iter()
                .find(|s| {
                    address >= s.base_address
                        && address.saturating_add(size) <= s.base_address + s.data.len()
                })
                .ok_or_else(|| anyhow!("{:#x}+{:#x} is not mapped", address, size))?
                .read_bytes(address, size)
        }
    }

    struct MockHost {
        revision: Revision,
        memory: Segments,
        flags: ScriptedFlags,
        flag_fn: Cell<Option<usize>>,
        forms: HashMap<u32, usize>,
        commands: HashMap<TableId, CommandTable>,
        next_string: usize,
    }

    impl MockHost {
        fn new() -> Self {
            let table_segment = |offset: usize, len: usize| {
                MockMemorySource::zeroed(IMAGE_BASE + offset, len)
            };
            let memory = Segments(vec![
                table_segment(CHANGE_FORM_TYPE_ARRAY_OFFSET, 50 * 4),
                table_segment(FORM_TYPE_NICKNAMES_OFFSET, 159 * 0x18),
                table_segment(DIALOG_SUBTYPES_OFFSET, DIALOG_SUBTYPES_END - DIALOG_SUBTYPES_OFFSET),
                table_segment(DEFAULT_OBJECTS_OFFSET, DEFAULT_OBJECTS_END - DEFAULT_OBJECTS_OFFSET),
                MockMemorySource::zeroed(HEAP, 0x10000),
            ]);

            let mut host = Self {
                revision: SUPPORTED_REVISION,
                memory,
                flags: ScriptedFlags::default().with(0x2D, 2, "Essential", "Actor is essential"),
                flag_fn: Cell::new(None),
                forms: HashMap::new(),
                commands: HashMap::new(),
                next_string: HEAP + 0x8000,
            };
            host.populate();
            host
        }

        fn string(&mut self, text: &str) -> u64 {
            let at = self.next_string;
            self.memory.at(at).put_cstr(at, text);
            self.next_string += text.len() + 1;
            at as u64
        }

        fn populate(&mut self) {
            let change_types = IMAGE_BASE + CHANGE_FORM_TYPE_ARRAY_OFFSET;
            self.memory.at(change_types).put_u32(change_types, 0x0D);
            self.memory.at(change_types).put_u32(change_types + 4, 0x2D);

            let nicknames = IMAGE_BASE + FORM_TYPE_NICKNAMES_OFFSET;
            for (form_type, name) in [(0usize, "NONE"), (0x0D, "CLAS"), (0x2D, "NPC_")] {
                let ptr = self.string(name);
                let at = nicknames + form_type * 0x18;
                self.memory.at(at).put_u8(at, form_type as u8);
                self.memory.at(at).put_u64(at + 8, ptr);
            }

            let dialog = IMAGE_BASE + DIALOG_SUBTYPES_OFFSET;
            let ptr = self.string("Custom");
            self.memory.at(dialog).put_u64(dialog, ptr);
            self.memory.at(dialog).put_bytes(dialog + 0x0C, b"CUST");

            let dom = IMAGE_BASE + DEFAULT_OBJECTS_OFFSET;
            let ptr = self.string("WorkshopWorkbench");
            self.memory.at(dom).put_u64(dom, ptr);
            self.memory.at(dom).put_bytes(dom + 0x0C, b"WWSP");
            self.memory.at(dom).put_u32(dom + 0x18, 0x0001_2345);

            // Strength is an actor value; 0x2C3 is some other form kind
            let av = HEAP;
            let full = self.string("Strength");
            let name = self.string("Strength");
            let mem = self.memory.at(av);
            mem.put_u32(av + 0x14, 0x2C2);
            mem.put_u8(av + 0x1A, 98);
            mem.put_u64(av + 0x28, full);
            mem.put_u64(av + 0x48, name);
            mem.put_u32(av + 0x1B4, 1);
            self.forms.insert(0x2C2, av);

            let other = HEAP + 0x400;
            self.memory.at(other).put_u8(other + 0x1A, 12);
            self.forms.insert(0x2C3, other);
        }

        fn add_console_command(&mut self, name: &str) {
            let at = HEAP + 0x1000;
            let ptr = self.string(name);
            self.memory.at(at).put_u64(at, ptr);
            self.commands.insert(
                TableId::ConsoleCommands,
                CommandTable { base: at, count: 1 },
            );
        }
    }

    impl Host for MockHost {
        fn revision(&self) -> Revision {
            self.revision
        }

        fn image_base(&self) -> usize {
            IMAGE_BASE
        }

        fn memory(&self) -> &dyn MemorySource {
            &self.memory
        }

        fn flag_names(&self, function: usize) -> Box<dyn FlagNameSource + '_> {
            self.flag_fn.set(Some(function));
            Box::new(move |mask: u32, form_type: u32, want: bool| {
                self.flags.show_flag_name(mask, form_type, want)
            })
        }

        fn lookup_form(&self, form_id: u32) -> Option<usize> {
            self.forms.get(&form_id).copied()
        }

        fn command_table(&self, table: TableId) -> Option<CommandTable> {
            self.commands.get(&table).copied()
        }
    }

    fn separators(lines: &[String]) -> usize {
        lines.iter().filter(|l| l.as_str() == SEPARATOR).count()
    }

    fn has(lines: &[String], wanted: &str) -> bool {
        lines.iter().any(|l| l == wanted)
    }

    #[test]
    fn test_full_document() {
        let host = MockHost::new();
        let mut lines: Vec<String> = Vec::new();
        let mut extractor = Extractor::new(&host, ExtractOptions::default());

        let report = extractor.run(&mut lines).unwrap();

        assert_eq!(extractor.stage(), &Stage::Done);
        assert!(report.is_complete(), "{:?}", report.failed_sections);
        assert_eq!(report.skipped_records, 0);
        assert_eq!(report.lines, lines.len());
        assert_eq!(
            host.flag_fn.get(),
            Some(IMAGE_BASE + SHOW_CHANGE_FLAGS_NAME_OFFSET)
        );

        assert_eq!(lines[0], SEPARATOR);
        assert_eq!(lines.last().map(String::as_str), Some(SEPARATOR));
        assert_eq!(separators(&lines), 7);

        assert!(has(&lines, "    '00 (00D : CLAS)',"));
        assert!(has(&lines, "    '01 (02D : NPC_)',"));
        assert!(has(&lines, "    '49 (000 : NONE)'"));
        assert!(has(&lines, "    {02} 'Essential', // Actor is essential"));
        assert!(has(
            &lines,
            "  wbUnionEssential := wbUnion('Actor is essential', ChangedFlag02Decider, [wbNull, wbNull]);"
        ));
        assert!(has(&lines, "      wbStruct('Change NPC_ Data', [ {02D}"));
        assert!(has(&lines, "6;Strength;2c2;\"Strength\";0;0;1"));
        assert!(has(&lines, "0;\"Custom\";0;\"CUST\";0;0;0;0"));
        assert!(has(&lines, "0;\"WorkshopWorkbench\";\"WWSP\";0;0;0;00012345"));
        assert!(has(&lines, "sig2Int('WWSP'), 'WorkshopWorkbench'"));

        // 0x2C3 is not an actor value
        assert!(!lines.iter().any(|l| l.contains(";2c3;")));
    }

    #[test]
    fn test_section_order() {
        let host = MockHost::new();
        let mut lines: Vec<String> = Vec::new();
        run_extraction(&host, ExtractOptions::default(), &mut lines).unwrap();

        let position = |needle: &str| lines.iter().position(|l| l.starts_with(needle)).unwrap();
        let enum_at = position("  wbChangeTypes := ");
        let flags_at = position("  wbChangeFlags000 : IwbIntegerDef;");
        let unions_at = position("  wbUnionEssential : IwbUnionDef;");
        let form_at = position("  wbChangedFormData := ");
        let dumps_at = position("avID;avName;");
        let lookup_at = position("sig2Int(");

        assert!(enum_at < flags_at);
        assert!(flags_at < unions_at);
        assert!(unions_at < form_at);
        assert!(form_at < dumps_at);
        assert!(dumps_at < lookup_at);
    }

    #[test]
    fn test_revision_mismatch_emits_nothing() {
        let mut host = MockHost::new();
        host.revision = Revision::new(1, 10, 163);
        let mut lines: Vec<String> = Vec::new();
        let mut extractor = Extractor::new(&host, ExtractOptions::default());

        let err = extractor.run(&mut lines).unwrap_err();

        assert!(matches!(err, Error::UnsupportedRevision { .. }));
        assert!(lines.is_empty());
        assert!(matches!(extractor.stage(), Stage::Failed(_)));
        assert_eq!(host.flag_fn.get(), None);
    }

    #[test]
    fn test_bad_record_is_skipped() {
        let mut host = MockHost::new();
        // Nickname 5 points at unmapped memory
        let at = IMAGE_BASE + FORM_TYPE_NICKNAMES_OFFSET + 5 * 0x18;
        host.memory.at(at).put_u64(at + 8, 0xdead_0000);

        let mut lines: Vec<String> = Vec::new();
        let report = run_extraction(&host, ExtractOptions::default(), &mut lines).unwrap();

        assert_eq!(report.skipped_records, 1);
        assert!(report.is_complete());
        assert_eq!(separators(&lines), 7);
    }

    #[test]
    fn test_command_tables() {
        let mut host = MockHost::new();
        host.add_console_command("Show");
        let options = ExtractOptions {
            command_tables: true,
            ..ExtractOptions::default()
        };

        let mut lines: Vec<String> = Vec::new();
        let report = run_extraction(&host, options, &mut lines).unwrap();

        assert_eq!(separators(&lines), 11);
        assert!(has(
            &lines,
            "formType;formSignature; 159 elements not counting the 6 specials for Papyrus"
        ));
        assert!(has(&lines, "045;NPC_"));
        assert!(has(&lines, "  wbConsoleFunctions : array[] of TFunction = ("));
        assert!(has(&lines, "    (Index:   0; Name: 'Show')"));

        // No script table: both sections that read it are marked
        let failed: Vec<Section> = report.failed_sections.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            failed,
            vec![Section::ScriptFunctions, Section::ConditionFunctions]
        );
        assert!(has(&lines, "// unavailable: host reports no script commands table"));
    }

    #[test]
    fn test_malformed_command_region_marks_section() {
        let mut host = MockHost::new();
        host.commands.insert(
            TableId::ConsoleCommands,
            CommandTable {
                base: usize::MAX - 0x10,
                count: 2,
            },
        );
        let options = ExtractOptions {
            command_tables: true,
            ..ExtractOptions::default()
        };

        let mut lines: Vec<String> = Vec::new();
        let report = run_extraction(&host, options, &mut lines).unwrap();

        assert!(report
            .failed_sections
            .contains(&(Section::ConsoleFunctions, "malformed console commands region: region overflows the address space".to_string())));
        assert!(has(
            &lines,
            "// unavailable: malformed console commands region: region overflows the address space"
        ));
        // Core sections are untouched
        assert!(has(&lines, "    '01 (02D : NPC_)',"));
    }
}

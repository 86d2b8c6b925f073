//! Script command tables
//!
//! The host keeps console and script commands in two contiguous arrays of
//! `ObScriptCommand` records. Each record points at its own parameter array,
//! decoded here as a nested bounded array.

use crate::decode::{Decoder, Region};
use crate::layout::Record;
use crate::revision::{Extent, TableId, SCRIPT_COMMAND, SCRIPT_PARAM};
use crate::schema::quote;
use crate::{FieldDecodeError, Result};

/// Parameters listed per command; anything beyond gets a `More...` note
pub const MAX_LISTED_PARAMS: usize = 9;

/// Conditions list only their leading parameters
pub const CONDITION_PARAMS: usize = 3;

/// Placement of a command table, reported by the host at run time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTable {
    /// Absolute address of the first command record
    pub base: usize,
    pub count: usize,
}

impl CommandTable {
    pub fn region(&self) -> Region {
        Region {
            base: self.base,
            stride: SCRIPT_COMMAND.size,
            extent: Extent::Count(self.count),
        }
    }
}

/// A decoded script command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Position within its table
    pub index: usize,
    pub name: String,
    /// Parameter type names, at most [`MAX_LISTED_PARAMS`]
    pub params: Vec<String>,
    /// Parameter count the host declares
    pub param_count: u16,
    /// Command has a condition evaluator
    pub has_eval: bool,
}

impl Command {
    /// Build a command from its record, reading the parameter array it
    /// points at. A declared count with a null array yields no parameters.
    pub fn from_record(
        decoder: &Decoder<'_>,
        record: &Record,
    ) -> std::result::Result<Self, FieldDecodeError> {
        let param_count = record.int("numParams") as u16;
        let params_at = record.int("params") as usize;

        let mut params = Vec::new();
        if params_at != 0 && param_count > 0 {
            let listed = (param_count as usize).min(MAX_LISTED_PARAMS);
            let region = Region {
                base: params_at,
                stride: SCRIPT_PARAM.size,
                extent: Extent::Count(listed),
            };
            let array = decoder
                .decode_array(TableId::ScriptCommands, region, &SCRIPT_PARAM)
                .map_err(|e| FieldDecodeError {
                    address: record.address,
                    field: "params",
                    reason: e.to_string(),
                })?;
            for param in array {
                params.push(param?.str("typeStr").to_string());
            }
        }

        Ok(Self {
            index: record.index,
            name: record.str("longName").to_string(),
            params,
            param_count,
            has_eval: record.int("eval") != 0,
        })
    }

    /// `(Index: NNN; Name: 'X'; Paramtype1: ptY ...)` for the first `limit`
    /// parameters
    fn entry(&self, index: usize, limit: usize) -> String {
        let mut out = format!("(Index: {:3}; Name: {}", index, quote(&self.name));
        for (i, param) in self.params.iter().take(limit).enumerate() {
            out.push_str(&format!("; Paramtype{}: pt{}", i + 1, param));
        }
        out.push(')');
        out
    }

    fn has_more_params(&self) -> bool {
        self.param_count as usize > MAX_LISTED_PARAMS
    }
}

/// Decode every command in a table. Record failures stay in place so the
/// caller can log and skip them.
pub fn decode_commands(
    decoder: &Decoder<'_>,
    table: TableId,
    placement: CommandTable,
) -> Result<Vec<std::result::Result<Command, FieldDecodeError>>> {
    let array = decoder.decode_array(table, placement.region(), &SCRIPT_COMMAND)?;
    Ok(array
        .map(|record| record.and_then(|r| Command::from_record(decoder, &r)))
        .collect())
}

/// `wbConsoleFunctions` / `wbFunctions` style listing
pub fn function_lines(var_name: &str, commands: &[Command]) -> Vec<String> {
    let mut out = vec![format!("  {} : array[] of TFunction = (", var_name)];
    let count = commands.len();
    for (i, command) in commands.iter().enumerate() {
        let mut line = format!("    {}", command.entry(command.index, MAX_LISTED_PARAMS));
        if i + 1 < count {
            line.push(',');
        }
        if command.has_more_params() {
            line.push_str(" // ; More...");
        }
        out.push(line);
    }
    out.push("  );".to_string());
    out
}

/// `wbCTDAFunctions`: commands usable in conditions, with a running
/// condition index
pub fn condition_function_lines(commands: &[Command]) -> Vec<String> {
    let mut out = vec!["  wbCTDAFunctions : array[] of TCTDAFunction = (".to_string()];
    let conditions: Vec<&Command> = commands.iter().filter(|c| c.has_eval).collect();
    let count = conditions.len();
    for (n, command) in conditions.iter().enumerate() {
        let comma = if n + 1 < count { "," } else { "" };
        out.push(format!(
            "    {}{}\t\t// {:3}",
            command.entry(command.index, CONDITION_PARAMS),
            comma,
            n
        ));
    }
    out.push("  );".to_string());
    out
}

//! The running game as an extraction host

use std::ffi::{c_char, c_void};

use anyhow::Result;
use xedit_dump::revision::{Revision, TableId};
use xedit_dump::{CommandTable, FlagNameSource, Host, MemorySource};

use crate::foreign::ForeignFlagNames;
use crate::process::SelfProcess;

/// Trigger callback the host invokes for `xEditDump`
pub type TriggerFn = extern "C" fn() -> bool;

/// Registers a zero-argument console command
pub type RegisterCommandFn =
    unsafe extern "C" fn(name: *const c_char, help: *const c_char, callback: TriggerFn) -> bool;

/// `TESForm *LookupFormByID(u32 formID)`
pub type LookupFormFn = unsafe extern "C" fn(form_id: u32) -> *const c_void;

/// Services the script extender hands the plugin at load time
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostApi {
    pub interface_version: u32,
    /// Packed runtime version, see [`Revision`]
    pub runtime_version: u32,
    pub image_base: usize,
    pub register_command: Option<RegisterCommandFn>,
    pub lookup_form_by_id: Option<LookupFormFn>,
    /// First console command record; 0 if unknown
    pub console_commands: usize,
    pub console_command_count: u32,
    /// First script command record; 0 if unknown
    pub script_commands: usize,
    pub script_command_count: u32,
}

/// Host for one extraction pass
pub struct LiveHost {
    api: HostApi,
    memory: SelfProcess,
    max_string_len: usize,
}

impl LiveHost {
    pub fn attach(api: HostApi, max_string_len: usize) -> Result<Self> {
        Ok(Self {
            api,
            memory: SelfProcess::open()?,
            max_string_len,
        })
    }
}

fn command_table(base: usize, count: u32) -> Option<CommandTable> {
    (base != 0 && count != 0).then_some(CommandTable {
        base,
        count: count as usize,
    })
}

impl Host for LiveHost {
    fn revision(&self) -> Revision {
        Revision(self.api.runtime_version)
    }

    fn image_base(&self) -> usize {
        self.api.image_base
    }

    fn memory(&self) -> &dyn MemorySource {
        &self.memory
    }

    fn flag_names(&self, function: usize) -> Box<dyn FlagNameSource + '_> {
        // SAFETY: the extractor only binds the flag-name offset from the
        // address table after the runtime version matched it
        Box::new(unsafe { ForeignFlagNames::bind(function, &self.memory, self.max_string_len) })
    }

    fn lookup_form(&self, form_id: u32) -> Option<usize> {
        let lookup = self.api.lookup_form_by_id?;
        // SAFETY: the host supplied this function for exactly this call
        let form = unsafe { lookup(form_id) };
        (!form.is_null()).then_some(form as usize)
    }

    fn command_table(&self, table: TableId) -> Option<CommandTable> {
        match table {
            TableId::ConsoleCommands => {
                command_table(self.api.console_commands, self.api.console_command_count)
            }
            TableId::ScriptCommands => {
                command_table(self.api.script_commands, self.api.script_command_count)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use xedit_dump::revision::SUPPORTED_REVISION;

    static FORM: [u8; 0x20] = [0; 0x20];

    unsafe extern "C" fn lookup(form_id: u32) -> *const c_void {
        if form_id == 0x2C2 {
            FORM.as_ptr().cast()
        } else {
            std::ptr::null()
        }
    }

    pub(crate) fn api() -> HostApi {
        HostApi {
            interface_version: crate::INTERFACE_VERSION,
            runtime_version: SUPPORTED_REVISION.0,
            image_base: 0x1_4000_0000,
            register_command: None,
            lookup_form_by_id: Some(lookup),
            console_commands: 0x2000_0000,
            console_command_count: 3,
            script_commands: 0,
            script_command_count: 0,
        }
    }

    #[test]
    fn test_form_lookup() {
        let host = LiveHost::attach(api(), 512).unwrap();
        assert_eq!(host.lookup_form(0x2C2), Some(FORM.as_ptr() as usize));
        assert_eq!(host.lookup_form(0x2C3), None);

        let without = LiveHost::attach(
            HostApi {
                lookup_form_by_id: None,
                ..api()
            },
            512,
        )
        .unwrap();
        assert_eq!(without.lookup_form(0x2C2), None);
    }

    #[test]
    fn test_command_tables_from_api() {
        let host = LiveHost::attach(api(), 512).unwrap();
        assert_eq!(
            host.command_table(TableId::ConsoleCommands),
            Some(CommandTable {
                base: 0x2000_0000,
                count: 3
            })
        );
        assert_eq!(host.command_table(TableId::ScriptCommands), None);
        assert_eq!(host.command_table(TableId::DialogSubtypes), None);
    }

    #[test]
    fn test_revision_from_api() {
        let host = LiveHost::attach(api(), 512).unwrap();
        assert_eq!(host.revision(), SUPPORTED_REVISION);
        assert_eq!(host.image_base(), 0x1_4000_0000);
    }
}

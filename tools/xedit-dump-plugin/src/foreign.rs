//! Host flag-name function binding

use std::ffi::c_char;

use tracing::warn;
use xedit_dump::{FlagNameSource, MemorySource, BAD_FLAG_NAME};

/// `const char *ShowChangeFlagsName(u32 flag, u32 formType, bool description)`
pub type ShowChangeFlagsName = unsafe extern "C" fn(u32, u32, bool) -> *const c_char;

/// The host's flag-name function, with its result copied out through a
/// bounded string read
pub struct ForeignFlagNames<'a> {
    function: ShowChangeFlagsName,
    memory: &'a dyn MemorySource,
    max_len: usize,
}

impl<'a> ForeignFlagNames<'a> {
    /// Bind the function at `address`.
    ///
    /// # Safety
    ///
    /// `address` must be the entry point of a function with the
    /// [`ShowChangeFlagsName`] signature, valid for as long as this value
    /// is used.
    pub unsafe fn bind(address: usize, memory: &'a dyn MemorySource, max_len: usize) -> Self {
        // SAFETY: upheld by the caller
        let function = unsafe { std::mem::transmute::<usize, ShowChangeFlagsName>(address) };
        Self {
            function,
            memory,
            max_len,
        }
    }
}

impl FlagNameSource for ForeignFlagNames<'_> {
    fn show_flag_name(&self, mask: u32, form_type: u32, want_description: bool) -> String {
        // SAFETY: `bind` guarantees the signature
        let text = unsafe { (self.function)(mask, form_type, want_description) };
        if text.is_null() {
            return BAD_FLAG_NAME.to_string();
        }

        match self.memory.read_cstring(text as usize, self.max_len) {
            Ok(name) => name,
            Err(e) => {
                warn!(mask, form_type, error = %e, "unreadable flag name");
                BAD_FLAG_NAME.to_string()
            }
        }
    }
}

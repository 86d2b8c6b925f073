//! Memory Source Abstraction
//!
//! Host memory is reached only through [`MemorySource`]:
//! - The plugin's in-process reader
//! - Mock sources for testing

mod traits;

#[cfg(test)]
mod mock;

#[cfg(test)]
pub use mock::MockMemorySource;
pub use traits::{MemorySource, CSTRING_CHUNK};

//! Memory Source Trait
//!
//! Core abstraction for reading host memory.

use anyhow::{bail, Result};
use byteorder::{ByteOrder, LE};

/// Trait for reading memory from the host (in-process reader, test mock, etc.)
///
/// Implementations are read-only. Nothing in this crate writes host memory.
pub trait MemorySource: Send + Sync {
    /// Read bytes from a virtual address
    fn read_bytes(&self, address: usize, size: usize) -> Result<Vec<u8>>;

    /// Read exactly `size` bytes; a short read from the source is an error
    fn read_exact(&self, address: usize, size: usize) -> Result<Vec<u8>> {
        let bytes = self.read_bytes(address, size)?;
        if bytes.len() != size {
            bail!(
                "Short read at {:#x}: wanted {} bytes, got {}",
                address,
                size,
                bytes.len()
            );
        }
        Ok(bytes)
    }

    /// Read a u8 from memory
    fn read_u8(&self, address: usize) -> Result<u8> {
        let bytes = self.read_exact(address, 1)?;
        Ok(bytes[0])
    }

    /// Read a u16 from memory
    fn read_u16(&self, address: usize) -> Result<u16> {
        let bytes = self.read_exact(address, 2)?;
        Ok(LE::read_u16(&bytes))
    }

    /// Read a u32 from memory
    fn read_u32(&self, address: usize) -> Result<u32> {
        let bytes = self.read_exact(address, 4)?;
        Ok(LE::read_u32(&bytes))
    }

    /// Read a u64 from memory
    fn read_u64(&self, address: usize) -> Result<u64> {
        let bytes = self.read_exact(address, 8)?;
        Ok(LE::read_u64(&bytes))
    }

    /// Read a pointer (usize) from memory
    fn read_ptr(&self, address: usize) -> Result<usize> {
        let bytes = self.read_exact(address, 8)?;
        Ok(LE::read_u64(&bytes) as usize)
    }

    /// Read a null-terminated string of at most `max_len` bytes.
    ///
    /// Reads in chunks that never cross a `CSTRING_CHUNK` boundary, so a short
    /// string sitting at the end of a mapped page doesn't fault on the next one.
    /// Fails if no terminator is found within `max_len` bytes.
    fn read_cstring(&self, address: usize, max_len: usize) -> Result<String> {
        let mut bytes = Vec::new();
        let mut cursor = address;

        while bytes.len() < max_len {
            let to_boundary = CSTRING_CHUNK - (cursor % CSTRING_CHUNK);
            let size = to_boundary.min(max_len - bytes.len());
            let chunk = self.read_exact(cursor, size)?;

            if let Some(end) = chunk.iter().position(|&b| b == 0) {
                bytes.extend_from_slice(&chunk[..end]);
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }

            bytes.extend_from_slice(&chunk);
            cursor += size;
        }

        bail!(
            "String at {:#x} not terminated within {} bytes",
            address,
            max_len
        )
    }
}

/// Alignment of the chunks `read_cstring` pulls from memory
pub const CSTRING_CHUNK: usize = 64;

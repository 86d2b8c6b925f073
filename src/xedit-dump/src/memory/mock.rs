//! Mock Memory Source
//!
//! A flat, zero-filled address range for decoder and extraction tests.

use super::MemorySource;
use anyhow::{bail, Result};

/// A mock memory source backed by one contiguous buffer
pub struct MockMemorySource {
    /// Raw memory data (contiguous, starting at base_address)
    pub data: Vec<u8>,
    /// Base virtual address for the data
    pub base_address: usize,
}

impl MockMemorySource {
    /// Create a new mock with data at given base address
    pub fn new(data: Vec<u8>, base_address: usize) -> Self {
        Self { data, base_address }
    }

    /// Create a zero-filled mock of `size` bytes
    pub fn zeroed(base_address: usize, size: usize) -> Self {
        Self::new(vec![0; size], base_address)
    }

    fn offset(&self, address: usize, size: usize) -> usize {
        let offset = address - self.base_address;
        assert!(
            offset + size <= self.data.len(),
            "write of {} bytes at {:#x} outside mock",
            size,
            address
        );
        offset
    }

    pub fn put_bytes(&mut self, address: usize, bytes: &[u8]) {
        let offset = self.offset(address, bytes.len());
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn put_u8(&mut self, address: usize, value: u8) {
        self.put_bytes(address, &[value]);
    }

    pub fn put_u16(&mut self, address: usize, value: u16) {
        self.put_bytes(address, &value.to_le_bytes());
    }

    pub fn put_u32(&mut self, address: usize, value: u32) {
        self.put_bytes(address, &value.to_le_bytes());
    }

    pub fn put_u64(&mut self, address: usize, value: u64) {
        self.put_bytes(address, &value.to_le_bytes());
    }

    /// Write a null-terminated string
    pub fn put_cstr(&mut self, address: usize, value: &str) {
        self.put_bytes(address, value.as_bytes());
        self.put_u8(address + value.len(), 0);
    }
}

impl MemorySource for MockMemorySource {
    fn read_bytes(&self, address: usize, size: usize) -> Result<Vec<u8>> {
        if address < self.base_address {
            bail!("Address {:#x} below base {:#x}", address, self.base_address);
        }

        let offset = address - self.base_address;
        if offset + size > self.data.len() {
            bail!(
                "Read of {} bytes at {:#x} exceeds data size {}",
                size,
                address,
                self.data.len()
            );
        }

        Ok(self.data[offset..offset + size].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_read_bytes() {
        let data = vec![0x41, 0x42, 0x43, 0x44]; // "ABCD"
        let source = MockMemorySource::new(data, 0x1000);

        let result = source.read_bytes(0x1000, 4).unwrap();
        assert_eq!(result, vec![0x41, 0x42, 0x43, 0x44]);

        let partial = source.read_bytes(0x1001, 2).unwrap();
        assert_eq!(partial, vec![0x42, 0x43]);
    }

    #[test]
    fn test_mock_source_read_integers() {
        let data = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let source = MockMemorySource::new(data, 0x1000);

        assert_eq!(source.read_u8(0x1000).unwrap(), 0x01);
        assert_eq!(source.read_u16(0x1000).unwrap(), 0x0201);
        assert_eq!(source.read_u32(0x1000).unwrap(), 0x04030201);
        assert_eq!(source.read_u64(0x1000).unwrap(), 0x0807060504030201);
    }

    #[test]
    fn test_mock_source_read_cstring() {
        let mut source = MockMemorySource::zeroed(0x1000, 0x100);
        source.put_cstr(0x1000, "Hello");
        source.put_cstr(0x1006, "World");

        assert_eq!(source.read_cstring(0x1000, 64).unwrap(), "Hello");
        assert_eq!(source.read_cstring(0x1006, 64).unwrap(), "World");
    }

    #[test]
    fn test_read_cstring_across_chunks() {
        let mut source = MockMemorySource::zeroed(0x1000, 0x200);
        let long = "x".repeat(150);
        source.put_cstr(0x1030, &long);

        assert_eq!(source.read_cstring(0x1030, 512).unwrap(), long);
    }

    #[test]
    fn test_read_cstring_stops_at_chunk_boundary_near_end() {
        // String ends right before the end of the buffer; a single
        // max_len-sized read would run past it.
        let mut source = MockMemorySource::zeroed(0x1000, 0x40);
        source.put_cstr(0x1038, "tail");

        assert_eq!(source.read_cstring(0x1038, 512).unwrap(), "tail");
    }

    #[test]
    fn test_read_cstring_unterminated_is_error() {
        let source = MockMemorySource::new(vec![b'A'; 0x100], 0x1000);
        assert!(source.read_cstring(0x1000, 32).is_err());
    }

    #[test]
    fn test_mock_source_read_out_of_bounds() {
        let data = vec![0x41, 0x42, 0x43, 0x44];
        let source = MockMemorySource::new(data, 0x1000);

        // Reading past end should fail
        assert!(source.read_bytes(0x1002, 10).is_err());

        // Reading before base should fail
        assert!(source.read_bytes(0x500, 4).is_err());
    }
}

use std::collections::HashMap;
use std::fmt;
use std::fmt::{Debug, Formatter};
use thiserror::Error;

/// 4KB pages
pub const PAGE_SIZE: usize = 4096;

/// A multi-byte access whose final byte would fall past the end of
/// the 32-bit address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("memory access out of bounds at 0x{address:08x}")]
pub struct OutOfBounds {
    pub address: u32,
}

/// An implementation of paged memory covering the full 4GB address
/// space. Pages are allocated on first write; loads from untouched
/// pages read as zero.
#[derive(Default, Clone)]
pub struct Memory {
    /// Pages indexed by the upper 20 bits of the address
    pages: HashMap<u32, Box<[u8; PAGE_SIZE]>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the byte at the address
    #[inline]
    pub fn load_byte(&self, address: u32) -> u8 {
        match self.pages.get(&page_index(address)) {
            Some(page) => page[page_offset(address)],
            None => 0,
        }
    }

    /// Get the half word (2 bytes, little-endian) at the address
    pub fn load_half(&self, address: u32) -> Result<u16, OutOfBounds> {
        let high = address.checked_add(1).ok_or(OutOfBounds { address })?;
        Ok(u16::from_le_bytes([
            self.load_byte(address),
            self.load_byte(high),
        ]))
    }

    /// Get the word (4 bytes, little-endian) at the address
    pub fn load_word(&self, address: u32) -> Result<u32, OutOfBounds> {
        address.checked_add(3).ok_or(OutOfBounds { address })?;

        let mut bytes = [0; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.load_byte(address + i as u32);
        }

        Ok(u32::from_le_bytes(bytes))
    }

    /// Set the byte at the address, allocating its page if needed
    #[inline]
    pub fn store_byte(&mut self, address: u32, value: u8) {
        let page = self
            .pages
            .entry(page_index(address))
            .or_insert_with(|| Box::new([0; PAGE_SIZE]));

        page[page_offset(address)] = value;
    }

    /// Set the half word (2 bytes, little-endian) at the address
    pub fn store_half(&mut self, address: u32, value: u16) -> Result<(), OutOfBounds> {
        address.checked_add(1).ok_or(OutOfBounds { address })?;

        for (i, byte) in value.to_le_bytes().iter().enumerate() {
            self.store_byte(address + i as u32, *byte);
        }

        Ok(())
    }

    /// Set the word (4 bytes, little-endian) at the address
    pub fn store_word(&mut self, address: u32, value: u32) -> Result<(), OutOfBounds> {
        address.checked_add(3).ok_or(OutOfBounds { address })?;

        for (i, byte) in value.to_le_bytes().iter().enumerate() {
            self.store_byte(address + i as u32, *byte);
        }

        Ok(())
    }

    /// Bulk-copy an image into memory starting at the given address
    pub fn load_image(&mut self, data: &[u8], start: u32) -> Result<(), OutOfBounds> {
        if !data.is_empty() {
            let end = u64::from(start) + (data.len() as u64 - 1);
            if end > u64::from(u32::MAX) {
                return Err(OutOfBounds { address: start });
            }
        }

        for (i, byte) in data.iter().enumerate() {
            self.store_byte(start + i as u32, *byte);
        }

        Ok(())
    }

    /// The number of pages that have been touched by a write
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Get the index of the page the address is in
fn page_index(address: u32) -> u32 {
    address >> 12
}

/// Get the address's offset in its page
fn page_offset(address: u32) -> usize {
    address as usize % PAGE_SIZE
}

impl Debug for Memory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Memory({} pages)", self.pages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip() {
        let mut memory = Memory::new();
        memory.store_byte(0x1000, 0xFF);
        assert_eq!(memory.load_byte(0x1000), 0xFF);
    }

    #[test]
    fn untouched_memory_reads_zero() {
        let memory = Memory::new();
        assert_eq!(memory.load_byte(0x5000_0000), 0);
        assert_eq!(memory.load_word(0x5000_0000), Ok(0));
        // Loads never allocate
        assert_eq!(memory.page_count(), 0);
    }

    #[test]
    fn little_endian_layout() {
        let mut memory = Memory::new();
        memory.store_word(0x1000, 0x1234_5678).unwrap();

        assert_eq!(memory.load_byte(0x1000), 0x78);
        assert_eq!(memory.load_byte(0x1001), 0x56);
        assert_eq!(memory.load_byte(0x1002), 0x34);
        assert_eq!(memory.load_byte(0x1003), 0x12);

        assert_eq!(memory.load_half(0x1000), Ok(0x5678));
        assert_eq!(memory.load_half(0x1002), Ok(0x1234));
        assert_eq!(memory.load_word(0x1000), Ok(0x1234_5678));
    }

    #[test]
    fn unaligned_access() {
        let mut memory = Memory::new();
        memory.store_word(0x1001, 0xDEAD_BEEF).unwrap();
        assert_eq!(memory.load_word(0x1001), Ok(0xDEAD_BEEF));
    }

    #[test]
    fn sparse_pages() {
        let mut memory = Memory::new();
        memory.store_word(0x1000, 0xDEAD_BEEF).unwrap();
        memory.store_word(0x8000_0000, 0xABCD_EF00).unwrap();

        assert_eq!(memory.load_word(0x1000), Ok(0xDEAD_BEEF));
        assert_eq!(memory.load_word(0x8000_0000), Ok(0xABCD_EF00));
        assert_eq!(memory.load_word(0x5000_0000), Ok(0));
        // Only the two touched pages were allocated
        assert_eq!(memory.page_count(), 2);
    }

    #[test]
    fn access_crossing_the_end_fails() {
        let mut memory = Memory::new();
        assert!(memory.load_word(0xFFFF_FFFE).is_err());
        assert!(memory.load_half(0xFFFF_FFFF).is_err());
        assert!(memory.store_word(0xFFFF_FFFD, 1).is_err());
        assert!(memory.store_half(0xFFFF_FFFF, 1).is_err());

        // The very last complete word is fine
        assert!(memory.store_word(0xFFFF_FFFC, 0x0102_0304).is_ok());
        assert_eq!(memory.load_word(0xFFFF_FFFC), Ok(0x0102_0304));
        memory.store_byte(0xFFFF_FFFF, 0xAA);
        assert_eq!(memory.load_byte(0xFFFF_FFFF), 0xAA);
    }

    #[test]
    fn image_copy() {
        let mut memory = Memory::new();
        memory.load_image(&[1, 2, 3, 4, 5], 0x2000).unwrap();
        assert_eq!(memory.load_byte(0x2000), 1);
        assert_eq!(memory.load_byte(0x2004), 5);
        assert_eq!(memory.load_word(0x2000), Ok(0x0403_0201));

        assert!(memory.load_image(&[1, 2], 0xFFFF_FFFF).is_err());
        assert!(memory.load_image(&[1], 0xFFFF_FFFF).is_ok());
    }
}

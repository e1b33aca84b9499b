//! Binary Image
//!
//! A raw memory image mapped at a fixed base address. Instruction words are read
//! big-endian at `address - load_base`.

use std::path::Path;

use crate::decompiler::error::{DecompilerError, Result};

/// Default mapped base of the image (KSEG0).
pub const DEFAULT_LOAD_BASE: u32 = 0x8000_0000;

#[derive(Debug, Clone)]
pub struct BinaryImage {
    data: Vec<u8>,
    load_base: u32,
}

impl BinaryImage {
    pub fn from_bytes(data: Vec<u8>, load_base: u32) -> Self {
        Self { data, load_base }
    }

    /// Read a whole image file into memory.
    pub fn from_file(path: &Path, load_base: u32) -> Result<Self> {
        let data: Vec<u8> = std::fs::read(path)?;
        log::debug!(
            "Loaded {} bytes from {} at base 0x{:08X}",
            data.len(),
            path.display(),
            load_base
        );
        Ok(Self::from_bytes(data, load_base))
    }

    #[inline]
    pub fn load_base(&self) -> u32 {
        self.load_base
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read the big-endian word mapped at `address`.
    ///
    /// # Errors
    /// [`DecompilerError::AddressOutOfImage`] if any of the four bytes lies outside
    /// the image.
    #[inline] // Hot path - called once per instruction
    pub fn read_word(&self, address: u32) -> Result<u32> {
        let out_of_image = || DecompilerError::address_out_of_image(address, self.load_base, self.data.len());
        let offset: usize = address.checked_sub(self.load_base).ok_or_else(out_of_image)? as usize;
        let bytes: &[u8] = offset
            .checked_add(4)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(out_of_image)?;

        let mut buf: [u8; 4] = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(u32::from_be_bytes(buf))
    }
}

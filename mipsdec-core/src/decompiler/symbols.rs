//! Symbol Table
//!
//! Parses `nm`-style map files, one symbol per line:
//!
//! ```text
//! 80001000 T main
//! 80001040 t helper
//! ```
//!
//! An 8-digit hex address, a space, a one-character type code, a space, then the
//! name. Symbols are kept ordered by address; a function's instruction range runs
//! from its own address to the next symbol with a greater address.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decompiler::error::{DecompilerError, Result};

/// Shortest well-formed line: address, two separators, type code, one name character.
const MIN_LINE_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub address: u32,
    pub kind: char,
    pub name: String,
}

/// Address-ordered symbol collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Build a table from already-parsed symbols, sorting them by address.
    pub fn new(mut symbols: Vec<Symbol>) -> Self {
        symbols.sort_by_key(|symbol| symbol.address);
        Self { symbols }
    }

    /// Parse a symbol file from disk.
    ///
    /// # Errors
    /// Returns [`DecompilerError::Io`] if the file cannot be read, or
    /// [`DecompilerError::SymbolParse`] for the first malformed line.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content: String = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse symbol file text. Any malformed line aborts the whole load.
    pub fn parse(text: &str) -> Result<Self> {
        let mut symbols: Vec<Symbol> = Vec::new();

        for (index, raw_line) in text.lines().enumerate() {
            let line: &str = raw_line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            symbols.push(Self::parse_line(line).ok_or_else(|| DecompilerError::symbol_parse(index + 1, line))?);
        }

        log::debug!("Loaded {} symbols", symbols.len());
        Ok(Self::new(symbols))
    }

    fn parse_line(line: &str) -> Option<Symbol> {
        if line.len() < MIN_LINE_LEN || !line.is_ascii() {
            return None;
        }
        let bytes: &[u8] = line.as_bytes();
        if bytes[8] != b' ' || bytes[10] != b' ' {
            return None;
        }

        let address_field: &str = &line[..8];
        if !address_field.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let address: u32 = u32::from_str_radix(address_field, 16).ok()?;
        let kind: char = bytes[9] as char;
        let name: &str = line[11..].trim_end();
        if name.is_empty() || kind == ' ' {
            return None;
        }

        Some(Symbol {
            address,
            kind,
            name: name.to_string(),
        })
    }

    /// Address of the first symbol with this name.
    pub fn lookup_name(&self, name: &str) -> Option<u32> {
        self.symbols
            .iter()
            .find(|symbol| symbol.name == name)
            .map(|symbol| symbol.address)
    }

    /// Name of the first symbol at this address.
    pub fn lookup_address(&self, address: u32) -> Option<&str> {
        let start: usize = self.symbols.partition_point(|symbol| symbol.address < address);
        self.symbols
            .get(start)
            .filter(|symbol| symbol.address == address)
            .map(|symbol| symbol.name.as_str())
    }

    pub fn entry_at(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.symbols.iter().position(|symbol| symbol.name == name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// Half-open address range `[start, end)` of a function.
    ///
    /// The end is the first following symbol with a strictly greater address, so
    /// aliases sharing the function's address do not produce an empty range.
    ///
    /// # Errors
    /// [`DecompilerError::SymbolNotFound`] if the name is absent,
    /// [`DecompilerError::UnboundedFunction`] if nothing follows it.
    pub fn function_range(&self, name: &str) -> Result<(u32, u32)> {
        let index: usize = self
            .index_of(name)
            .ok_or_else(|| DecompilerError::symbol_not_found(name))?;
        let start: u32 = self.symbols[index].address;

        let end: u32 = self.symbols[index + 1..]
            .iter()
            .map(|symbol| symbol.address)
            .find(|&address| address > start)
            .ok_or_else(|| DecompilerError::unbounded_function(name, start))?;

        Ok((start, end))
    }
}

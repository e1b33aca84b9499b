//! Decompiler Error Handling
//!
//! Error types for the decompiler using `thiserror`.
//!
//! # Error Categories
//! - **Lookup errors**: function name absent from the symbol table, or no boundary after it
//! - **Decode errors**: a word in the function's range matches no opcode descriptor
//! - **Delay-slot errors**: a branch or jump is the last instruction of the range
//! - **Input errors**: malformed symbol files, reads outside the binary image, I/O
//!
//! Restructuring non-convergence is deliberately absent: it is reported through
//! [`Convergence`](crate::decompiler::optimizer::Convergence) and never aborts a run.

use thiserror::Error;

/// Decompiler error types.
///
/// The first four variants are fatal for the function being decompiled; the
/// remaining ones come from loading the inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompilerError {
    /// Function name absent from the symbol table.
    #[error("Symbol lookup error: function '{name}' is not in the symbol table\nSuggestion: {suggestion}")]
    SymbolNotFound { name: String, suggestion: String },

    /// The function is the last symbol, so its instruction range has no end.
    #[error("Symbol lookup error: function '{name}' at 0x{address:08X} has no following symbol to bound it\nSuggestion: {suggestion}")]
    UnboundedFunction {
        name: String,
        address: u32,
        suggestion: String,
    },

    /// Instruction word matches no descriptor in the opcode table.
    #[error("Instruction decode error at 0x{address:08X}: no descriptor matches word 0x{word:08X}\nSuggestion: {suggestion}")]
    InstructionDecode {
        address: u32,
        word: u32,
        suggestion: String,
    },

    /// A branch or jump has no instruction after it to act as its delay slot.
    #[error("Delay slot error at 0x{address:08X}: control transfer 0x{word:08X} ends the function\nSuggestion: {suggestion}")]
    DelaySlotUnderflow {
        address: u32,
        word: u32,
        suggestion: String,
    },

    /// Malformed line in a symbol file.
    #[error("Symbol file error at line {line_number}: malformed entry '{line}'\nSuggestion: {suggestion}")]
    SymbolParse {
        line_number: usize,
        line: String,
        suggestion: String,
    },

    /// Word read outside the loaded binary image.
    #[error("Binary image error: address 0x{address:08X} is outside the image (base 0x{load_base:08X}, {image_len} bytes)\nSuggestion: {suggestion}")]
    AddressOutOfImage {
        address: u32,
        load_base: u32,
        image_len: usize,
        suggestion: String,
    },

    /// I/O failure while reading an input file.
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl DecompilerError {
    pub fn symbol_not_found(name: impl Into<String>) -> Self {
        Self::SymbolNotFound {
            name: name.into(),
            suggestion: "Check the spelling of the function name and that the map file belongs to this binary.".to_string(),
        }
    }

    pub fn unbounded_function(name: impl Into<String>, address: u32) -> Self {
        Self::UnboundedFunction {
            name: name.into(),
            address,
            suggestion: "Add an end marker symbol after the last function in the map file.".to_string(),
        }
    }

    /// Create an instruction decode error with context.
    pub fn instruction_decode(address: u32, word: u32) -> Self {
        let suggestion: String = if word == 0xFFFF_FFFF || address & 0x3 != 0 {
            "The range looks like data or is misaligned; verify the symbol boundaries.".to_string()
        } else {
            "The opcode is not covered by the decoder's table; extend the table or skip this function.".to_string()
        };
        Self::InstructionDecode {
            address,
            word,
            suggestion,
        }
    }

    pub fn delay_slot_underflow(address: u32, word: u32) -> Self {
        Self::DelaySlotUnderflow {
            address,
            word,
            suggestion: "The function boundary is probably one word short, or the function falls through into the next symbol.".to_string(),
        }
    }

    pub fn symbol_parse(line_number: usize, line: impl Into<String>) -> Self {
        Self::SymbolParse {
            line_number,
            line: line.into(),
            suggestion: "Each line must read 'XXXXXXXX t name' with an 8-digit hex address.".to_string(),
        }
    }

    pub fn address_out_of_image(address: u32, load_base: u32, image_len: usize) -> Self {
        Self::AddressOutOfImage {
            address,
            load_base,
            image_len,
            suggestion: "Check the load base address and that the map file matches the binary.".to_string(),
        }
    }

    /// Both flavours of symbol lookup failure.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            Self::SymbolNotFound { .. } | Self::UnboundedFunction { .. }
        )
    }
}

impl From<std::io::Error> for DecompilerError {
    #[cold] // Error path
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// Result alias for decompiler operations.
pub type Result<T> = std::result::Result<T, DecompilerError>;

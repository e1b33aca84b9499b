//! Test Utilities
//!
//! Instruction encoders and fixture builders shared by the integration tests.
#![allow(dead_code)]

use mipsdec_core::decompiler::{BinaryImage, Function, SymbolTable};

/// Load base used by every fixture.
pub const BASE: u32 = 0x8000_0000;

// Register numbers
pub const ZERO: u32 = 0;
pub const V0: u32 = 2;
pub const V1: u32 = 3;
pub const A0: u32 = 4;
pub const A1: u32 = 5;
pub const A2: u32 = 6;
pub const T0: u32 = 8;
pub const S0: u32 = 16;
pub const T9: u32 = 25;
pub const SP: u32 = 29;
pub const RA: u32 = 31;

// Primary opcodes
pub const OP_J: u32 = 0x02;
pub const OP_BEQ: u32 = 0x04;
pub const OP_BNE: u32 = 0x05;
pub const OP_ADDIU: u32 = 0x09;
pub const OP_ORI: u32 = 0x0D;
pub const OP_LUI: u32 = 0x0F;
pub const OP_BEQL: u32 = 0x14;
pub const OP_LW: u32 = 0x23;
pub const OP_SW: u32 = 0x2B;

// SPECIAL function codes
pub const FN_JR: u32 = 0x08;
pub const FN_JALR: u32 = 0x09;
pub const FN_ADDU: u32 = 0x21;

pub const NOP: u32 = 0;

pub fn encode_i(op: u32, rs: u32, rt: u32, imm: i16) -> u32 {
    (op << 26) | (rs << 21) | (rt << 16) | (imm as u16 as u32)
}

pub fn encode_r(rs: u32, rt: u32, rd: u32, sa: u32, funct: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | (sa << 6) | funct
}

pub fn encode_regimm(code: u32, rs: u32, imm: i16) -> u32 {
    (1 << 26) | (rs << 21) | (code << 16) | (imm as u16 as u32)
}

/// `j target`, for a target in the same 256 MiB region.
pub fn encode_j(target: u32) -> u32 {
    (OP_J << 26) | ((target >> 2) & 0x03FF_FFFF)
}

/// Immediate of a branch at `from` reaching `to`.
pub fn branch_offset(from: u32, to: u32) -> i16 {
    ((to.wrapping_sub(from).wrapping_sub(4) as i32) >> 2) as i16
}

pub fn addiu(rt: u32, rs: u32, imm: i16) -> u32 {
    encode_i(OP_ADDIU, rs, rt, imm)
}

pub fn jr_ra() -> u32 {
    encode_r(RA, 0, 0, 0, FN_JR)
}

/// Function words plus an image and a symbol table bounding them.
pub struct Fixture {
    pub image: BinaryImage,
    pub symbols: SymbolTable,
}

impl Fixture {
    /// One function `name` at [`BASE`], followed by an `end` symbol and any `extra` symbols.
    pub fn single(name: &str, words: &[u32], extra: &[(u32, &str)]) -> Self {
        let mut map: String = format!("{:08x} T {}\n", BASE, name);
        map.push_str(&format!("{:08x} T end\n", BASE + 4 * words.len() as u32));
        for (address, symbol) in extra {
            map.push_str(&format!("{:08x} T {}\n", address, symbol));
        }
        Self {
            image: image_of(words),
            symbols: SymbolTable::parse(&map).unwrap(),
        }
    }

    /// Several functions laid out back to back, the last one bounded by `end`.
    pub fn sequence(functions: &[(&str, &[u32])]) -> Self {
        let mut map: String = String::new();
        let mut words: Vec<u32> = Vec::new();
        for (name, body) in functions {
            map.push_str(&format!("{:08x} T {}\n", BASE + 4 * words.len() as u32, name));
            words.extend_from_slice(body);
        }
        map.push_str(&format!("{:08x} T end\n", BASE + 4 * words.len() as u32));
        Self {
            image: image_of(&words),
            symbols: SymbolTable::parse(&map).unwrap(),
        }
    }

    pub fn function(&self, name: &str) -> Function {
        Function::decode(name, &self.symbols, &self.image).unwrap()
    }
}

pub fn image_of(words: &[u32]) -> BinaryImage {
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();
    BinaryImage::from_bytes(bytes, BASE)
}

/// Decoded and delay-slot resolved function `f` built from `words`.
pub fn resolved_function(words: &[u32]) -> Function {
    let mut function: Function = Fixture::single("f", words, &[]).function("f");
    function.resolve_delay_slots().unwrap();
    function
}

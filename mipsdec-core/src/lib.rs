//! MIPS32 single-function decompiler.
//!
//! Decodes a function's machine code, resolves branch delay slots, restructures
//! the result into nested if/else blocks and renders it as pseudo-C.

pub mod decompiler;

pub use decompiler::pipeline::decompile;

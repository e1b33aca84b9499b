//! Function: one decompilation unit.
//!
//! A function is decoded from the address range between its symbol and the next
//! one, turned into a tree by delay-slot resolution, rewritten in place by the
//! restructuring passes and finally read by the code generator.

use std::fmt::Write;

use crate::decompiler::analysis::control_flow::ControlFlowAnalyzer;
use crate::decompiler::analysis::delay_slot::{DelaySlotResolver, DelaySlotStats};
use crate::decompiler::binary::BinaryImage;
use crate::decompiler::decoder::InstructionKind;
use crate::decompiler::error::Result;
use crate::decompiler::instruction::Instruction;
use crate::decompiler::optimizer::Convergence;
use crate::decompiler::register::Register;
use crate::decompiler::symbols::SymbolTable;

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    /// First address of the decoded range
    pub start_address: u32,
    /// One past the last decoded address
    pub end_address: u32,
    /// Root of the instruction tree
    pub instructions: Vec<Instruction>,
    /// Bytes reserved by the prologue's `addiu sp, sp, -N`
    pub stack_frame_size: Option<u32>,
    pub optimization_passes_run: u32,
    pub convergence: Convergence,
    /// Top-level sequence right after delay-slot resolution, kept for data-flow queries
    pub resolved_snapshot: Vec<Instruction>,
}

impl Function {
    /// Wrap an already-decoded flat sequence.
    pub fn new(name: impl Into<String>, instructions: Vec<Instruction>) -> Self {
        let start_address: u32 = instructions.first().map_or(0, |insn| insn.address);
        let end_address: u32 = instructions.last().map_or(start_address, |insn| insn.address.wrapping_add(4));
        let stack_frame_size: Option<u32> = Self::detect_stack_frame(&instructions);

        Self {
            name: name.into(),
            start_address,
            end_address,
            instructions,
            stack_frame_size,
            optimization_passes_run: 0,
            convergence: Convergence::NotRun,
            resolved_snapshot: Vec::new(),
        }
    }

    /// Decode a function's instruction range from the binary image.
    ///
    /// # Arguments
    /// * `name` - Symbol name of the function
    /// * `symbols` - Symbol table bounding the range
    /// * `image` - Binary image the words are read from
    ///
    /// # Errors
    /// Lookup failures from [`SymbolTable::function_range`], image reads outside the
    /// image, and the first word that fails to decode.
    pub fn decode(name: &str, symbols: &SymbolTable, image: &BinaryImage) -> Result<Self> {
        let (start, end): (u32, u32) = symbols.function_range(name)?;
        let word_count: usize = ((end - start) / 4) as usize;
        let mut instructions: Vec<Instruction> = Vec::with_capacity(word_count);

        for slot in 0..word_count {
            let address: u32 = start + (slot as u32) * 4;
            let word: u32 = image.read_word(address)?;
            instructions.push(Instruction::decode(word, address)?);
        }

        log::debug!(
            "Decoded {} instructions for {} (0x{:08X}..0x{:08X})",
            instructions.len(),
            name,
            start,
            end
        );

        let mut function: Function = Self::new(name, instructions);
        function.start_address = start;
        function.end_address = end;
        Ok(function)
    }

    /// Frame size from the first `ADDIU` that writes the stack pointer.
    ///
    /// A non-negative adjustment there means the function has no frame.
    pub fn detect_stack_frame(instructions: &[Instruction]) -> Option<u32> {
        let adjustment: &Instruction = instructions
            .iter()
            .find(|insn| insn.kind == InstructionKind::Addiu && insn.defines(Register::SP))?;
        if adjustment.immediate < 0 {
            Some(adjustment.immediate.unsigned_abs() as u32)
        } else {
            None
        }
    }

    /// Run delay-slot resolution, label the tree and keep the flat snapshot.
    pub fn resolve_delay_slots(&mut self) -> Result<DelaySlotStats> {
        let stats: DelaySlotStats = DelaySlotResolver::resolve(&mut self.instructions)?;
        self.recompute_jump_targets();
        self.resolved_snapshot = self.instructions.clone();
        Ok(stats)
    }

    #[inline]
    pub fn recompute_jump_targets(&mut self) {
        ControlFlowAnalyzer::recompute_jump_targets(&mut self.instructions);
    }

    /// Number of instructions in the tree, nested and synthetic ones included.
    pub fn instruction_count(&self) -> usize {
        self.instructions.iter().map(Instruction::count).sum()
    }

    pub fn label_count(&self) -> usize {
        ControlFlowAnalyzer::label_count(&self.instructions)
    }

    /// Position of the call at `address` in the resolved snapshot.
    pub fn call_site(&self, address: u32) -> Option<usize> {
        self.resolved_snapshot
            .iter()
            .position(|insn| insn.address == address && insn.is_call())
    }

    /// Disassembly listing of the current tree.
    pub fn dump(&self) -> String {
        let mut out: String = String::with_capacity(self.instruction_count() * 40);
        let _ = writeln!(out, "{}:", self.name);
        Self::dump_sequence(&mut out, &self.instructions, 0);
        out
    }

    fn dump_sequence(out: &mut String, sequence: &[Instruction], depth: usize) {
        let indent: String = "    ".repeat(depth);
        for insn in sequence {
            if insn.is_jump_target {
                let _ = writeln!(out, "LABEL_{:08X}:", insn.address);
            }
            if insn.is_synthetic() {
                let _ = writeln!(out, "--------: --------  {}{}", indent, insn);
            } else if insn.is_shadow_move() {
                let _ = writeln!(out, "{:08x}: --------  {}{}", insn.address, indent, insn);
            } else {
                let _ = writeln!(out, "{:08x}: {:08x}  {}{}", insn.address, insn.raw, indent, insn);
            }
            if !insn.if_branch.is_empty() {
                let _ = writeln!(out, "                    {}  if:", indent);
                Self::dump_sequence(out, &insn.if_branch, depth + 1);
            }
            if !insn.else_branch.is_empty() {
                let _ = writeln!(out, "                    {}  else:", indent);
                Self::dump_sequence(out, &insn.else_branch, depth + 1);
            }
        }
    }
}

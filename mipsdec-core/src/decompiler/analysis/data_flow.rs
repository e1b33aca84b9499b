//! Data Flow Analysis
//!
//! Register value resolution: a bounded backward query that recovers the constant
//! held by a register at a given position, used to name the targets of indirect calls.
//!
//! # Algorithm
//! Walking backward from the query position over a flat sequence:
//! - `LUI reg` fixes the upper half; the walk then replays forward to the query
//!   position, folding in every `ADDIU reg, reg, imm` / `ORI reg, reg, imm`
//! - `ADDU reg, a, b` resolves `a` and `b` recursively and adds them (`zero` is 0)
//! - `ADDIU`/`ORI` from another register resolve that register and apply the immediate
//! - self-updates (`ADDIU reg, reg, imm`) are stepped over and folded in by the replay
//! - any other definition, a definition nested in a branch, a call clobbering the
//!   register, a jump target (merge point) or the start of the sequence ends the
//!   query with `None`
//!
//! Failure is never an error: the caller just emits a less readable call.

use crate::decompiler::decoder::InstructionKind;
use crate::decompiler::instruction::Instruction;
use crate::decompiler::register::Register;

/// Backward constant resolver for registers.
#[derive(Debug, Clone, Copy)]
pub struct RegisterValueResolver {
    max_depth: u32,
}

impl Default for RegisterValueResolver {
    fn default() -> Self {
        Self::new(8)
    }
}

impl RegisterValueResolver {
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }

    /// Value of `register` just before the instruction at `at` executes.
    ///
    /// # Arguments
    /// * `instructions` - Flat sequence, after delay-slot resolution
    /// * `at` - Position of the instruction reading the register
    /// * `register` - Register to resolve
    ///
    /// # Returns
    /// `Option<u32>` - The constant, or `None` if it cannot be proven single-valued
    pub fn resolve_register(&self, instructions: &[Instruction], at: usize, register: Register) -> Option<u32> {
        self.resolve_at(instructions, at, register, 0)
    }

    fn resolve_at(&self, instructions: &[Instruction], at: usize, register: Register, depth: u32) -> Option<u32> {
        if register.is_zero() {
            return Some(0);
        }
        if depth > self.max_depth || at > instructions.len() {
            return None;
        }
        if instructions.get(at).map_or(false, |insn| insn.is_jump_target) {
            return None;
        }

        for index in (0..at).rev() {
            let insn: &Instruction = &instructions[index];

            if insn.defines(register) {
                let self_update: bool = insn.rs == register
                    && matches!(insn.kind, InstructionKind::Addiu | InstructionKind::Ori);
                if !self_update {
                    return self.evaluate_definition(instructions, index, at, register, depth);
                }
            } else if insn.defines_anywhere(register) {
                log::trace!("{} is conditionally defined at 0x{:08X}", register, insn.address);
                return None;
            }

            if insn.is_call() && register.is_clobbered_by_call() {
                return None;
            }
            if insn.is_jump_target {
                return None;
            }
        }

        None
    }

    fn evaluate_definition(
        &self,
        instructions: &[Instruction],
        index: usize,
        at: usize,
        register: Register,
        depth: u32,
    ) -> Option<u32> {
        let insn: &Instruction = &instructions[index];
        match insn.kind {
            InstructionKind::Lui => {
                let upper: u32 = (insn.unsigned_immediate as u32) << 16;
                Self::replay_forward(instructions, index + 1, at, register, upper)
            }
            InstructionKind::Addu => {
                let lhs: u32 = self.resolve_at(instructions, index, insn.rs, depth + 1)?;
                let rhs: u32 = self.resolve_at(instructions, index, insn.rt, depth + 1)?;
                Some(lhs.wrapping_add(rhs))
            }
            InstructionKind::Addiu => {
                let base: u32 = self.resolve_at(instructions, index, insn.rs, depth + 1)?;
                Some(base.wrapping_add(insn.immediate as i32 as u32))
            }
            InstructionKind::Ori => {
                let base: u32 = self.resolve_at(instructions, index, insn.rs, depth + 1)?;
                Some(base | insn.unsigned_immediate as u32)
            }
            _ => None,
        }
    }

    /// Fold the self-updates between a `LUI` and the query position.
    fn replay_forward(instructions: &[Instruction], from: usize, to: usize, register: Register, mut value: u32) -> Option<u32> {
        for insn in &instructions[from..to] {
            if !insn.defines(register) {
                continue;
            }
            match insn.kind {
                InstructionKind::Addiu if insn.rs == register => {
                    value = value.wrapping_add(insn.immediate as i32 as u32);
                }
                InstructionKind::Ori if insn.rs == register => {
                    value |= insn.unsigned_immediate as u32;
                }
                _ => return None,
            }
        }
        Some(value)
    }
}

//! Cleanup passes: stack-frame stripping and dead no-op removal.

use crate::decompiler::analysis::control_flow::{find_site, sequence_at_mut, Path};
use crate::decompiler::decoder::InstructionKind;
use crate::decompiler::function::Function;
use crate::decompiler::instruction::Instruction;
use crate::decompiler::register::Register;

/// Remove the instruction at `path`/`index`, leaving a `NOP` behind if it is labelled.
fn elide(function: &mut Function, path: &Path, index: usize) -> bool {
    let Some(sequence) = sequence_at_mut(&mut function.instructions, path) else {
        return false;
    };
    let Some((address, labelled)) = sequence.get(index).map(|insn| (insn.address, insn.is_jump_target)) else {
        return false;
    };
    if labelled {
        sequence[index] = Instruction::label_placeholder(address, true);
    } else {
        sequence.remove(index);
    }
    true
}

/// Whether `insn` belongs to the frame setup or teardown of a `frame`-byte frame.
///
/// That is `addiu sp,sp,±frame`, or an `lw`/`sw` through `sp` into the register
/// save area `frame - 4 .. frame - window`.
fn is_frame_instruction(insn: &Instruction, frame: u32, window: u32) -> bool {
    let frame: i32 = frame as i32;
    let offset: i32 = i32::from(insn.immediate);
    match insn.kind {
        InstructionKind::Addiu => insn.rs == Register::SP && insn.rt == Register::SP && offset.abs() == frame,
        InstructionKind::Lw | InstructionKind::Sw if insn.rs == Register::SP => {
            let below: i32 = frame - offset;
            below >= 4 && below <= window as i32 && below % 4 == 0
        }
        _ => false,
    }
}

/// Prologue/epilogue stripping.
///
/// Drops one stack adjustment or register save/restore per call. Does nothing for
/// functions without a detected frame.
pub fn strip_prologue_epilogue(function: &mut Function, window: u32) -> bool {
    let Some(frame) = function.stack_frame_size else {
        return false;
    };
    let site: Option<(Path, usize)> = find_site(&function.instructions, |sequence, index, path| {
        is_frame_instruction(&sequence[index], frame, window).then(|| (path.clone(), index))
    });
    match site {
        Some((path, index)) => elide(function, &path, index),
        None => false,
    }
}

/// Dead-NOP removal.
///
/// Deletes an unlabelled `NOP`/`SSNOP`, or collapses a branch whose arms are both
/// empty into a `NOP` at its address.
pub fn remove_dead_nops(function: &mut Function) -> bool {
    let site: Option<(Path, usize)> = find_site(&function.instructions, |sequence, index, path| {
        let insn: &Instruction = &sequence[index];
        let dead_nop: bool = insn.is_no_op() && !insn.is_jump_target;
        let empty_branch: bool = insn.is_branch() && !insn.has_branches();
        (dead_nop || empty_branch).then(|| (path.clone(), index))
    });
    let Some((path, index)) = site else {
        return false;
    };
    let Some(sequence) = sequence_at_mut(&mut function.instructions, &path) else {
        return false;
    };

    if sequence[index].is_branch() {
        let (address, labelled): (u32, bool) = (sequence[index].address, sequence[index].is_jump_target);
        log::trace!("Collapsing empty branch at 0x{:08X}", address);
        sequence[index] = Instruction::label_placeholder(address, labelled);
    } else {
        sequence.remove(index);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_op(kind: InstructionKind, rt: Register, offset: i16) -> Instruction {
        let mut insn = Instruction::new(0x8000_0000, 0, kind);
        insn.rs = Register::SP;
        insn.rt = rt;
        insn.immediate = offset;
        insn
    }

    #[test]
    fn test_frame_instruction_window() {
        assert!(is_frame_instruction(&stack_op(InstructionKind::Addiu, Register::SP, -32), 32, 24));
        assert!(is_frame_instruction(&stack_op(InstructionKind::Addiu, Register::SP, 32), 32, 24));
        assert!(is_frame_instruction(&stack_op(InstructionKind::Sw, Register::RA, 28), 32, 24));
        assert!(is_frame_instruction(&stack_op(InstructionKind::Lw, Register::RA, 8), 32, 24));
        // Local variable slots stay
        assert!(!is_frame_instruction(&stack_op(InstructionKind::Sw, Register::A0, 4), 32, 24));
        assert!(!is_frame_instruction(&stack_op(InstructionKind::Sw, Register::A0, 32), 32, 24));
        assert!(!is_frame_instruction(&stack_op(InstructionKind::Addiu, Register::SP, -16), 32, 24));
    }
}

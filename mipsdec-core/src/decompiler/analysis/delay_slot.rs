//! Delay-Slot Resolution
//!
//! Turns the flat decoded sequence into the initial instruction tree by giving every
//! branch and jump an explicit home for the instruction in its delay slot.
//!
//! # Algorithm
//! Repeatedly take the first control transfer with `delay_slot_resolved == false`
//! (rescanning from the start after every rewrite) and, with `next` the instruction
//! after it:
//! 1. **Branch-likely** (`BEQL`, `BNEL`): `next` only runs when the branch is taken,
//!    so it moves into `if_branch`.
//! 2. **Branch**: if `next` defines a register the test reads, `next` is duplicated
//!    into both arms so the test still sees the old value. Otherwise `next` and the
//!    branch swap places.
//! 3. **Jump** (`J`, `JR`, `JALR`, `.hb`): always swaps with `next`. If `next` defines
//!    the register the jump reads, a synthetic `addu shadow, reg, zero` is inserted
//!    first and the jump reads the shadow register instead.
//! 4. Branches then get a synthetic `J target` appended to `if_branch` and are marked
//!    `ignore_jump`, since the tree now carries that edge.
//!
//! # Addresses
//! Swaps exchange positions, not addresses: the first instruction of the rewritten
//! group keeps the transfer's address, so a label on the transfer still executes the
//! delay slot first. In the shadow-move case the move takes the jump's address, the
//! jump takes the delay slot's address and the delay-slot instruction becomes synthetic.

use serde::{Deserialize, Serialize};

use crate::decompiler::decoder::{DelaySlotClass, InstructionClass};
use crate::decompiler::error::{DecompilerError, Result};
use crate::decompiler::instruction::{Instruction, SYNTHETIC_ADDRESS};
use crate::decompiler::register::Register;

/// What delay-slot resolution did to a function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelaySlotStats {
    /// Branch-likely delay slots moved into `if_branch`
    pub squashed: usize,
    /// Branch delay slots duplicated into both arms because of a clash
    pub duplicated: usize,
    /// Transfers swapped with their delay slot
    pub swapped: usize,
    /// Synthetic shadow-register moves inserted before jumps
    pub shadow_moves: usize,
    /// Synthetic closing jumps appended to branches
    pub closing_jumps: usize,
}

pub struct DelaySlotResolver;

impl DelaySlotResolver {
    /// Resolve every delay slot of a flat instruction sequence in place.
    ///
    /// # Errors
    /// [`DecompilerError::DelaySlotUnderflow`] if a control transfer is the last
    /// instruction of the sequence.
    pub fn resolve(instructions: &mut Vec<Instruction>) -> Result<DelaySlotStats> {
        let mut stats: DelaySlotStats = DelaySlotStats::default();

        while let Some(index) = instructions
            .iter()
            .position(|insn| !insn.delay_slot_resolved && insn.delay_slot_class() != DelaySlotClass::None)
        {
            let transfer: &Instruction = &instructions[index];
            if index + 1 >= instructions.len() {
                return Err(DecompilerError::delay_slot_underflow(transfer.address, transfer.raw));
            }
            if instructions[index + 1].delay_slot_class() != DelaySlotClass::None {
                log::warn!(
                    "Control transfer at 0x{:08X} sits in the delay slot of 0x{:08X}; result is unpredictable on hardware",
                    instructions[index + 1].address,
                    transfer.address
                );
            }

            let resolved_at: usize = match (transfer.delay_slot_class(), transfer.class()) {
                (DelaySlotClass::Conditional, _) => {
                    let next: Instruction = instructions.remove(index + 1);
                    instructions[index].if_branch.push(next);
                    stats.squashed += 1;
                    index
                }
                (_, InstructionClass::Branch) => Self::resolve_branch(instructions, index, &mut stats),
                _ => Self::resolve_jump(instructions, index, &mut stats),
            };

            let transfer: &mut Instruction = &mut instructions[resolved_at];
            transfer.delay_slot_resolved = true;
            if transfer.is_branch() {
                if let Some(target) = transfer.jump_target {
                    transfer.if_branch.push(Instruction::synthetic_jump(target));
                    transfer.ignore_jump = true;
                    stats.closing_jumps += 1;
                }
            }
            log::trace!("Resolved delay slot of {} at 0x{:08X}", transfer, transfer.address);
        }

        Ok(stats)
    }

    /// Returns the new index of the branch.
    fn resolve_branch(instructions: &mut Vec<Instruction>, index: usize, stats: &mut DelaySlotStats) -> usize {
        let clash: bool = instructions[index + 1]
            .result_register()
            .map_or(false, |register| instructions[index].reads(register));

        if clash {
            let next: Instruction = instructions.remove(index + 1);
            let mut copy: Instruction = next.clone();
            copy.address = SYNTHETIC_ADDRESS;
            let branch: &mut Instruction = &mut instructions[index];
            branch.if_branch.push(next);
            branch.else_branch.push(copy);
            stats.duplicated += 1;
            index
        } else {
            swap_keeping_addresses(instructions, index, index + 1);
            stats.swapped += 1;
            index + 1
        }
    }

    /// Returns the new index of the jump.
    fn resolve_jump(instructions: &mut Vec<Instruction>, index: usize, stats: &mut DelaySlotStats) -> usize {
        let clashed: Option<Register> = instructions[index + 1]
            .result_register()
            .filter(|&register| instructions[index].reads(register));

        match clashed {
            Some(register) => {
                // [jump, next] -> [move, next, jump]
                let jump_address: u32 = instructions[index].address;
                let slot_address: u32 = instructions[index + 1].address;

                let mut backup: Instruction = Instruction::register_move(register, register.shadow());
                backup.address = jump_address;
                backup.delay_slot_resolved = true;
                instructions.insert(index, backup);

                let jump: &mut Instruction = &mut instructions[index + 1];
                if jump.rs == register {
                    jump.rs = register.shadow();
                }
                jump.address = slot_address;
                instructions[index + 2].address = SYNTHETIC_ADDRESS;
                instructions.swap(index + 1, index + 2);

                stats.shadow_moves += 1;
                stats.swapped += 1;
                index + 2
            }
            None => {
                swap_keeping_addresses(instructions, index, index + 1);
                stats.swapped += 1;
                index + 1
            }
        }
    }
}

/// Swap two instructions while each position keeps its address.
fn swap_keeping_addresses(instructions: &mut [Instruction], a: usize, b: usize) {
    instructions.swap(a, b);
    let address_a: u32 = instructions[a].address;
    instructions[a].address = instructions[b].address;
    instructions[b].address = address_a;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompiler::decoder::InstructionKind;

    #[test]
    fn test_swap_keeps_positional_addresses() {
        let mut seq = vec![
            Instruction::new(0x100, 0, InstructionKind::Jr),
            Instruction::new(0x104, 0, InstructionKind::Addu),
        ];
        swap_keeping_addresses(&mut seq, 0, 1);
        assert_eq!(seq[0].kind, InstructionKind::Addu);
        assert_eq!(seq[0].address, 0x100);
        assert_eq!(seq[1].kind, InstructionKind::Jr);
        assert_eq!(seq[1].address, 0x104);
    }
}

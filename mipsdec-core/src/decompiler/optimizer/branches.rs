//! Branch-shaping passes: else detection, condition inversion, jump elision and
//! the two hoists. Each one rewrites a single branch instruction and the sequence
//! that owns it.

use crate::decompiler::analysis::control_flow::{find_site, sequence_at_mut, Arm, Path};
use crate::decompiler::function::Function;
use crate::decompiler::instruction::Instruction;

/// Locate the first branch accepted by `probe` and hand its owning sequence and
/// index to `rewrite`.
fn rewrite_first<T, P, R>(function: &mut Function, mut probe: P, rewrite: R) -> bool
where
    P: FnMut(&[Instruction], usize) -> Option<T>,
    R: FnOnce(&mut Vec<Instruction>, usize, T),
{
    let site: Option<(Path, usize, T)> = find_site(&function.instructions, |sequence, index, path| {
        if !sequence[index].is_branch() {
            return None;
        }
        probe(sequence, index).map(|found| (path.clone(), index, found))
    });
    let Some((path, index, found)) = site else {
        return false;
    };
    let Some(sequence) = sequence_at_mut(&mut function.instructions, &path) else {
        return false;
    };
    rewrite(sequence, index, found);
    true
}

/// Else-branch detection.
///
/// `if (c) { ...; goto T; } F...; T:` becomes `if (c) { ... } else { F... } T:`.
/// `T` stays in the enclosing sequence as the join point. An `else_branch` holding
/// a duplicated delay slot keeps it and gets `F` appended.
pub fn detect_else_branch(function: &mut Function) -> bool {
    rewrite_first(
        function,
        |sequence, index| {
            let branch: &Instruction = &sequence[index];
            let closing: &Instruction = branch.if_branch.last()?;
            if !closing.is_live_absolute_jump() {
                return None;
            }
            if branch.else_branch.last().map_or(false, Instruction::is_unconditional_transfer) {
                return None;
            }
            let target: u32 = closing.jump_target?;
            let join: usize = sequence[index + 1..]
                .iter()
                .position(|insn| !insn.is_synthetic() && insn.address == target)?
                + index
                + 1;
            (join > index + 1).then_some(join)
        },
        |sequence, index, join| {
            let fall_through: Vec<Instruction> = sequence.drain(index + 1..join).collect();
            let branch: &mut Instruction = &mut sequence[index];
            branch.if_branch.pop();
            log::debug!(
                "Branch at 0x{:08X}: {} fall-through instructions moved to else",
                branch.address,
                fall_through.len()
            );
            branch.else_branch.extend(fall_through);
        },
    )
}

/// Only-else normalization: `if (c) {} else { E }` becomes `if (!c) { E }`.
pub fn normalize_only_else(function: &mut Function) -> bool {
    rewrite_first(
        function,
        |sequence, index| {
            let branch: &Instruction = &sequence[index];
            (branch.if_branch.is_empty() && !branch.else_branch.is_empty() && branch.kind.inverted().is_some())
                .then_some(())
        },
        |sequence, index, ()| {
            let branch: &mut Instruction = &mut sequence[index];
            if branch.invert_condition() {
                std::mem::swap(&mut branch.if_branch, &mut branch.else_branch);
            }
        },
    )
}

/// End-of-branch jump elision: drop a closing `J` to the instruction that follows the
/// branch, since control reaches it by falling through anyway.
pub fn elide_end_of_branch_jump(function: &mut Function) -> bool {
    rewrite_first(
        function,
        |sequence, index| {
            let follower: &Instruction = sequence.get(index + 1)?;
            if !follower.is_jump_target || follower.is_synthetic() {
                return None;
            }
            let branch: &Instruction = &sequence[index];
            let jumps_to_follower = |arm: &[Instruction]| {
                arm.last().map_or(false, |tail| {
                    tail.is_live_absolute_jump() && tail.jump_target == Some(follower.address)
                })
            };
            if jumps_to_follower(&branch.if_branch) {
                Some(Arm::If)
            } else if jumps_to_follower(&branch.else_branch) {
                Some(Arm::Else)
            } else {
                None
            }
        },
        |sequence, index, arm| {
            let branch: &mut Instruction = &mut sequence[index];
            match arm {
                Arm::If => branch.if_branch.pop(),
                Arm::Else => branch.else_branch.pop(),
            };
        },
    )
}

/// Returning-if hoist: when `if_branch` ends in `jr ra`, the else path is the only
/// one that continues, so it moves out after the branch.
pub fn hoist_returning_if_branch(function: &mut Function) -> bool {
    rewrite_first(
        function,
        |sequence, index| {
            let branch: &Instruction = &sequence[index];
            let returns: bool = branch.if_branch.last().map_or(false, Instruction::is_return);
            (returns && !branch.else_branch.is_empty()).then_some(())
        },
        |sequence, index, ()| {
            let tail: Vec<Instruction> = std::mem::take(&mut sequence[index].else_branch);
            let _inserted: Vec<Instruction> = sequence.splice(index + 1..index + 1, tail).collect();
        },
    )
}

/// Identical-tail hoist: a leaf instruction ending both arms moves out once after
/// the branch.
///
/// When the copies carry different addresses and both are labelled, one label would
/// be lost, so the site is skipped. Otherwise the labelled copy, if any, is kept.
pub fn hoist_identical_tail(function: &mut Function) -> bool {
    rewrite_first(
        function,
        |sequence, index| {
            let branch: &Instruction = &sequence[index];
            let if_tail: &Instruction = branch.if_branch.last()?;
            let else_tail: &Instruction = branch.else_branch.last()?;
            if if_tail.has_branches() || else_tail.has_branches() || !if_tail.same_operation(else_tail) {
                return None;
            }
            let labels_conflict: bool =
                if_tail.address != else_tail.address && if_tail.is_jump_target && else_tail.is_jump_target;
            (!labels_conflict).then_some(())
        },
        |sequence, index, ()| {
            let branch: &mut Instruction = &mut sequence[index];
            let (Some(if_tail), Some(else_tail)) = (branch.if_branch.pop(), branch.else_branch.pop()) else {
                return;
            };
            let kept: Instruction = if else_tail.is_jump_target && !if_tail.is_jump_target {
                else_tail
            } else {
                if_tail
            };
            sequence.insert(index + 1, kept);
        },
    )
}

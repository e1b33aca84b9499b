//! Control Flow Analysis
//!
//! Queries over the instruction tree that the restructuring passes share:
//! jump-source counting, jump-target (label) recomputation, block discovery and
//! path-based navigation back to a site found by an earlier read-only walk.
//!
//! # Memory Optimizations
//! - `JumpTargetSet` is a `BitVec` over the word offsets of the tree's address span
//!   (instead of a `HashSet<u32>`)
//! - Paths use `SmallVec<[PathStep; 4]>`: nesting rarely goes deeper than four levels
//!
//! # Restart Discipline
//! Passes never hold references across a mutation. A pass first locates a site with
//! [`find_site`] on a shared borrow, records its [`Path`], then reacquires the owning
//! sequence from the root with [`sequence_at_mut`] to perform exactly one rewrite.

use std::collections::HashMap;

use bitvec::prelude::*;
use smallvec::SmallVec;

use crate::decompiler::instruction::Instruction;

/// Which nested sequence of an instruction a path step descends into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Arm {
    If,
    Else,
}

/// One step from a sequence into a nested sequence: (index of owner, arm).
pub type PathStep = (usize, Arm);

/// Route from the root sequence to a nested sequence. Empty means the root.
pub type Path = SmallVec<[PathStep; 4]>;

/// Follow a path from the root to the sequence it names.
pub fn sequence_at<'a>(root: &'a [Instruction], path: &[PathStep]) -> Option<&'a [Instruction]> {
    let mut sequence: &'a [Instruction] = root;
    for &(index, arm) in path {
        let owner: &'a Instruction = sequence.get(index)?;
        sequence = match arm {
            Arm::If => &owner.if_branch,
            Arm::Else => &owner.else_branch,
        };
    }
    Some(sequence)
}

/// Mutable counterpart of [`sequence_at`].
pub fn sequence_at_mut<'a>(root: &'a mut Vec<Instruction>, path: &[PathStep]) -> Option<&'a mut Vec<Instruction>> {
    let mut sequence: &'a mut Vec<Instruction> = root;
    for &(index, arm) in path {
        let owner: &'a mut Instruction = sequence.get_mut(index)?;
        sequence = match arm {
            Arm::If => &mut owner.if_branch,
            Arm::Else => &mut owner.else_branch,
        };
    }
    Some(sequence)
}

/// Depth-first search for the first site a probe accepts.
///
/// The probe sees every (sequence, index) pair in program order: an instruction is
/// probed before the contents of its `if_branch`, which come before its `else_branch`,
/// which come before the next instruction.
pub fn find_site<T, F>(root: &[Instruction], mut probe: F) -> Option<T>
where
    F: FnMut(&[Instruction], usize, &Path) -> Option<T>,
{
    let mut path: Path = Path::new();
    find_in(root, &mut path, &mut probe)
}

fn find_in<T, F>(sequence: &[Instruction], path: &mut Path, probe: &mut F) -> Option<T>
where
    F: FnMut(&[Instruction], usize, &Path) -> Option<T>,
{
    for index in 0..sequence.len() {
        if let Some(found) = probe(sequence, index, path) {
            return Some(found);
        }
        let owner: &Instruction = &sequence[index];
        for (arm, nested) in [(Arm::If, &owner.if_branch), (Arm::Else, &owner.else_branch)] {
            if nested.is_empty() {
                continue;
            }
            path.push((index, arm));
            let found: Option<T> = find_in(nested, path, probe);
            path.pop();
            if found.is_some() {
                return found;
            }
        }
    }
    None
}

/// Visit every instruction of the tree in program order.
pub fn for_each_instruction<'a>(sequence: &'a [Instruction], visit: &mut impl FnMut(&'a Instruction)) {
    for insn in sequence {
        visit(insn);
        for_each_instruction(&insn.if_branch, visit);
        for_each_instruction(&insn.else_branch, visit);
    }
}

/// Number of live jump sources per target address.
#[derive(Debug, Clone, Default)]
pub struct JumpSources {
    counts: HashMap<u32, usize>,
    /// Subset of `counts` contributed by absolute `J` instructions.
    absolute: HashMap<u32, usize>,
}

impl JumpSources {
    pub fn collect(root: &[Instruction]) -> Self {
        let mut sources: Self = Self::default();
        for_each_instruction(root, &mut |insn: &Instruction| {
            if let Some(target) = insn.live_jump_target() {
                *sources.counts.entry(target).or_insert(0) += 1;
                if insn.is_live_absolute_jump() {
                    *sources.absolute.entry(target).or_insert(0) += 1;
                }
            }
        });
        sources
    }

    #[inline]
    pub fn count(&self, target: u32) -> usize {
        self.counts.get(&target).copied().unwrap_or(0)
    }

    /// Exactly one live edge reaches `target`, and it is an absolute `J`.
    pub fn has_single_absolute_source(&self, target: u32) -> bool {
        self.count(target) == 1 && self.absolute.get(&target).copied().unwrap_or(0) == 1
    }
}

/// Set of live jump targets restricted to the tree's own address span.
///
/// Targets outside the span cannot label any instruction of the tree and are dropped.
#[derive(Debug, Clone)]
pub struct JumpTargetSet {
    base: u32,
    words: BitVec<u32>,
    /// Targets inside the span but not word-aligned relative to `base`.
    unaligned: SmallVec<[u32; 2]>,
}

impl JumpTargetSet {
    pub fn collect(root: &[Instruction]) -> Self {
        let mut low: u32 = u32::MAX;
        let mut high: u32 = 0u32;
        for_each_instruction(root, &mut |insn: &Instruction| {
            if !insn.is_synthetic() {
                low = low.min(insn.address);
                high = high.max(insn.address);
            }
        });

        let span_words: usize = if low > high { 0 } else { ((high - low) / 4 + 1) as usize };
        let mut set: Self = Self {
            base: low,
            words: bitvec![u32, Lsb0; 0; span_words],
            unaligned: SmallVec::new(),
        };

        for_each_instruction(root, &mut |insn: &Instruction| {
            if let Some(target) = insn.live_jump_target() {
                if span_words == 0 || target < low || target > high {
                    return;
                }
                let offset: u32 = target - low;
                if offset % 4 == 0 {
                    set.words.set((offset / 4) as usize, true);
                } else if !set.unaligned.contains(&target) {
                    set.unaligned.push(target);
                }
            }
        });

        set
    }

    pub fn contains(&self, address: u32) -> bool {
        if address < self.base {
            return false;
        }
        let offset: u32 = address - self.base;
        if offset % 4 != 0 {
            return self.unaligned.contains(&address);
        }
        self.words
            .get((offset / 4) as usize)
            .map(|bit| *bit)
            .unwrap_or(false)
    }
}

/// Control-flow queries over instruction trees.
pub struct ControlFlowAnalyzer;

impl ControlFlowAnalyzer {
    /// Recompute `is_jump_target` for every instruction of the tree.
    ///
    /// An instruction is a jump target when some instruction with `ignore_jump == false`
    /// has a `jump_target` equal to its address. Synthetic instructions never are.
    pub fn recompute_jump_targets(root: &mut [Instruction]) {
        let targets: JumpTargetSet = JumpTargetSet::collect(root);
        Self::mark(root, &targets);
    }

    fn mark(sequence: &mut [Instruction], targets: &JumpTargetSet) {
        for insn in sequence.iter_mut() {
            insn.is_jump_target = !insn.is_synthetic() && targets.contains(insn.address);
            Self::mark(&mut insn.if_branch, targets);
            Self::mark(&mut insn.else_branch, targets);
        }
    }

    /// Number of labelled instructions in the tree.
    pub fn label_count(root: &[Instruction]) -> usize {
        let mut labels: usize = 0usize;
        for_each_instruction(root, &mut |insn: &Instruction| {
            if insn.is_jump_target {
                labels += 1;
            }
        });
        labels
    }

    /// Whether any instruction nested under `insn` (not `insn` itself) is labelled.
    pub fn has_nested_jump_target(insn: &Instruction) -> bool {
        let mut found: bool = false;
        for_each_instruction(&insn.if_branch, &mut |nested: &Instruction| found |= nested.is_jump_target);
        for_each_instruction(&insn.else_branch, &mut |nested: &Instruction| found |= nested.is_jump_target);
        found
    }

    /// Whether the tree under `sequence` holds a live jump to `target`.
    pub fn contains_live_jump_to(sequence: &[Instruction], target: u32) -> bool {
        let mut found: bool = false;
        for_each_instruction(sequence, &mut |insn: &Instruction| {
            found |= insn.live_jump_target() == Some(target);
        });
        found
    }

    /// End of the block starting at `start`: the index of the first unconditional
    /// transfer at or after it.
    ///
    /// Returns `None` if the sequence ends first, or if any instruction of the block
    /// other than the first carries a label (nested instructions included), since such
    /// a block has more than one entry.
    pub fn block_end(sequence: &[Instruction], start: usize) -> Option<usize> {
        for index in start..sequence.len() {
            let insn: &Instruction = &sequence[index];
            if (index > start && insn.is_jump_target) || Self::has_nested_jump_target(insn) {
                return None;
            }
            if insn.is_unconditional_transfer() {
                return Some(index);
            }
        }
        None
    }

    /// Replace the unique live absolute jump to `target` with `block`.
    ///
    /// Returns the block back if no such jump exists.
    pub fn replace_jump_source(
        root: &mut Vec<Instruction>,
        target: u32,
        block: Vec<Instruction>,
    ) -> Result<(), Vec<Instruction>> {
        let mut pending: Option<Vec<Instruction>> = Some(block);
        if Self::splice_at_source(root, target, &mut pending) {
            Ok(())
        } else {
            Err(pending.unwrap_or_default())
        }
    }

    fn splice_at_source(sequence: &mut Vec<Instruction>, target: u32, pending: &mut Option<Vec<Instruction>>) -> bool {
        let source: Option<usize> = sequence
            .iter()
            .position(|insn| insn.is_live_absolute_jump() && insn.jump_target == Some(target));
        if let Some(index) = source {
            return match pending.take() {
                Some(block) => {
                    let _replaced: Vec<Instruction> = sequence.splice(index..=index, block).collect();
                    true
                }
                None => false,
            };
        }

        sequence.iter_mut().any(|insn| {
            Self::splice_at_source(&mut insn.if_branch, target, pending)
                || Self::splice_at_source(&mut insn.else_branch, target, pending)
        })
    }
}

//! Block relocation passes.
//!
//! Both passes work on a *labelled block*: a run of instructions in one sequence
//! that starts at a jump target, ends at the first unconditional transfer (`J`, `JR`)
//! and has no other label inside it. Such a block is only entered at its label and
//! never falls out at the bottom, so it can live anywhere in the tree.

use crate::decompiler::analysis::control_flow::{
    find_site, sequence_at, sequence_at_mut, ControlFlowAnalyzer, JumpSources, Path,
};
use crate::decompiler::function::Function;
use crate::decompiler::instruction::Instruction;

/// A labelled block found in the sequence at `path`.
struct BlockSite {
    path: Path,
    start: usize,
    end: usize,
    label: u32,
}

/// Single-jump-block reassembly.
///
/// A labelled block right after an unconditional transfer is unreachable by fall
/// through. If its label has exactly one live source, an absolute `J`, the block
/// replaces that jump and the label disappears.
pub fn reassemble_single_jump_block(function: &mut Function) -> bool {
    let sources: JumpSources = JumpSources::collect(&function.instructions);
    let site: Option<BlockSite> = find_site(&function.instructions, |sequence, index, path| {
        let lead: &Instruction = &sequence[index];
        if !lead.is_unconditional_transfer() {
            return None;
        }
        labelled_block(sequence, index + 1, path, &sources)
    });
    let Some(site) = site else {
        return false;
    };

    let Some(sequence) = sequence_at_mut(&mut function.instructions, &site.path) else {
        return false;
    };
    let block: Vec<Instruction> = sequence.drain(site.start..=site.end).collect();

    match ControlFlowAnalyzer::replace_jump_source(&mut function.instructions, site.label, block) {
        Ok(()) => {
            log::debug!("Moved block LABEL_{:08X} to its only jump source", site.label);
            true
        }
        Err(block) => {
            // Source vanished: put the block back untouched
            if let Some(sequence) = sequence_at_mut(&mut function.instructions, &site.path) {
                let _restored: Vec<Instruction> = sequence.splice(site.start..site.start, block).collect();
            }
            false
        }
    }
}

/// Small-block cloning.
///
/// A labelled block of at most `limit` instructions (no-ops excluded, nested ones
/// included) whose label has a single absolute-jump source is copied over that jump.
/// The original stays in place for fall-through entry, unlabelled.
pub fn clone_small_block(function: &mut Function, limit: usize) -> bool {
    let sources: JumpSources = JumpSources::collect(&function.instructions);
    let site: Option<BlockSite> = find_site(&function.instructions, |sequence, index, path| {
        let site: BlockSite = labelled_block(sequence, index, path, &sources)?;
        let weight: usize = sequence[site.start..=site.end].iter().map(Instruction::weight).sum();
        if weight > limit {
            return None;
        }
        // A jump straight into the block is reassembly's job, cloning would only duplicate it
        let jumped_into: bool = index > 0
            && sequence[index - 1].is_live_absolute_jump()
            && sequence[index - 1].jump_target == Some(site.label);
        if jumped_into {
            return None;
        }
        Some(site)
    });
    let Some(site) = site else {
        return false;
    };

    let Some(sequence) = sequence_at(&function.instructions, &site.path) else {
        return false;
    };
    let clone: Vec<Instruction> = sequence[site.start..=site.end].to_vec();

    match ControlFlowAnalyzer::replace_jump_source(&mut function.instructions, site.label, clone) {
        Ok(()) => {
            log::debug!("Cloned small block LABEL_{:08X} to its only jump source", site.label);
            true
        }
        Err(_) => false,
    }
}

/// The labelled block starting at `start` whose label has one absolute-jump source
/// outside the block.
fn labelled_block(sequence: &[Instruction], start: usize, path: &Path, sources: &JumpSources) -> Option<BlockSite> {
    let first: &Instruction = sequence.get(start)?;
    if !first.is_jump_target || first.is_synthetic() {
        return None;
    }
    let label: u32 = first.address;
    if !sources.has_single_absolute_source(label) {
        return None;
    }

    let end: usize = ControlFlowAnalyzer::block_end(sequence, start)?;
    if ControlFlowAnalyzer::contains_live_jump_to(&sequence[start..=end], label) {
        // Loop back to its own head
        return None;
    }

    Some(BlockSite {
        path: path.clone(),
        start,
        end,
        label,
    })
}

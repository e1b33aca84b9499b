//! Control-Flow Restructuring
//!
//! A fixed-point battery of tree rewrites that turns the delay-slot-resolved tree
//! into structured if/else code with as few raw gotos as possible.
//!
//! # Restructuring Passes
//! Tried in this priority order on every iteration; the first pass that finds a
//! site performs exactly one rewrite and the iteration ends:
//!
//! 1. **Single-jump-block reassembly**: move a block reachable by exactly one `J` to that jump
//! 2. **Else-branch detection**: move the fall-through path of a branch into `else_branch`
//! 3. **Only-else normalization**: invert the condition of an `if () {} else {..}`
//! 4. **End-of-branch jump elision**: drop a closing jump to the instruction that follows anyway
//! 5. **Prologue/epilogue stripping**: drop stack-frame setup, teardown and register saves
//! 6. **Dead-NOP removal**: drop unlabelled no-ops and branches left with two empty arms
//! 7. **Returning-if hoist**: lift `else_branch` out when `if_branch` returns
//! 8. **Identical-tail hoist**: lift a shared last instruction out of both arms
//! 9. **Small-block cloning**: copy a short labelled block to its only jump source
//!
//! After every rewrite `is_jump_target` is recomputed for the whole tree.
//!
//! # Optimization Levels
//!
//! - **None**: no restructuring, the tree stays as delay-slot resolution left it
//! - **Basic**: passes 1-4 and 6-8, which only change structure
//! - **Aggressive**: all passes, including frame stripping and block cloning
//!
//! # API Reference
//!
//! ```rust,no_run
//! use mipsdec_core::decompiler::function::Function;
//! use mipsdec_core::decompiler::optimizer::{Optimizer, OptimizationLevel};
//!
//! # fn run(function: &mut Function) {
//! let optimizer = Optimizer::new(OptimizationLevel::Aggressive);
//! let convergence = optimizer.run(function);
//! # }
//! ```

pub mod blocks;
pub mod branches;
pub mod cleanup;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::decompiler::config::DecompilerConfig;
use crate::decompiler::function::Function;

/// Optimization level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationLevel {
    /// No restructuring
    None,
    /// Structural passes only
    Basic,
    /// Every pass
    Aggressive,
}

/// How a restructuring run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Convergence {
    /// The optimizer has not run on this function.
    NotRun,
    /// No pass found anything left to rewrite.
    Converged { iterations: u32 },
    /// The iteration cap stopped the run; the tree is valid but less structured.
    IterationCapReached { iterations: u32 },
}

impl Convergence {
    pub fn is_converged(self) -> bool {
        matches!(self, Convergence::Converged { .. })
    }
}

/// One restructuring pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Pass {
    SingleJumpBlock,
    ElseBranch,
    OnlyElseBranch,
    EndOfBranchJump,
    PrologueEpilogue,
    DeadNop,
    ReturningIfBranch,
    IdenticalTail,
    SmallBlockClone,
}

impl Pass {
    /// Every pass in priority order.
    pub const ALL: [Pass; 9] = [
        Pass::SingleJumpBlock,
        Pass::ElseBranch,
        Pass::OnlyElseBranch,
        Pass::EndOfBranchJump,
        Pass::PrologueEpilogue,
        Pass::DeadNop,
        Pass::ReturningIfBranch,
        Pass::IdenticalTail,
        Pass::SmallBlockClone,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Pass::SingleJumpBlock => "single-jump-block reassembly",
            Pass::ElseBranch => "else-branch detection",
            Pass::OnlyElseBranch => "only-else normalization",
            Pass::EndOfBranchJump => "end-of-branch jump elision",
            Pass::PrologueEpilogue => "prologue/epilogue stripping",
            Pass::DeadNop => "dead-NOP removal",
            Pass::ReturningIfBranch => "returning-if hoist",
            Pass::IdenticalTail => "identical-tail hoist",
            Pass::SmallBlockClone => "small-block cloning",
        }
    }

    /// Passes that rewrite more than control structure.
    fn is_aggressive(self) -> bool {
        matches!(self, Pass::PrologueEpilogue | Pass::SmallBlockClone)
    }
}

/// Restructuring driver.
///
/// Applies the enabled passes to a function until none of them reports a change
/// or the iteration cap is reached.
pub struct Optimizer {
    /// Enabled passes, in priority order
    passes: SmallVec<[Pass; 9]>,
    /// Hard cap on iterations
    max_iterations: u32,
    /// Largest block small-block cloning copies
    clone_block_limit: usize,
    /// Upper bound of the register save-slot window below the frame size
    frame_slot_window: u32,
}

impl Optimizer {
    /// Create a new optimizer with specified level and default limits.
    pub fn new(level: OptimizationLevel) -> Self {
        let defaults: DecompilerConfig = DecompilerConfig::default();
        let passes: SmallVec<[Pass; 9]> = match level {
            OptimizationLevel::None => SmallVec::new(),
            OptimizationLevel::Basic => Pass::ALL.iter().copied().filter(|pass| !pass.is_aggressive()).collect(),
            OptimizationLevel::Aggressive => Pass::ALL.iter().copied().collect(),
        };

        Self {
            passes,
            max_iterations: defaults.max_optimization_iterations,
            clone_block_limit: defaults.clone_block_limit,
            frame_slot_window: defaults.frame_slot_window,
        }
    }

    pub fn from_config(config: &DecompilerConfig) -> Self {
        let mut optimizer: Optimizer = Self::new(config.optimization_level);
        optimizer.max_iterations = config.max_optimization_iterations;
        optimizer.clone_block_limit = config.clone_block_limit;
        optimizer.frame_slot_window = config.frame_slot_window;
        optimizer
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// Perform at most one rewrite.
    ///
    /// # Returns
    /// `true` if a pass changed the tree. Jump targets are already recomputed.
    pub fn optimize(&self, function: &mut Function) -> bool {
        for &pass in self.passes.iter() {
            if self.apply(pass, function) {
                function.recompute_jump_targets();
                log::debug!("{}: applied {}", function.name, pass.name());
                return true;
            }
        }
        false
    }

    fn apply(&self, pass: Pass, function: &mut Function) -> bool {
        match pass {
            Pass::SingleJumpBlock => blocks::reassemble_single_jump_block(function),
            Pass::ElseBranch => branches::detect_else_branch(function),
            Pass::OnlyElseBranch => branches::normalize_only_else(function),
            Pass::EndOfBranchJump => branches::elide_end_of_branch_jump(function),
            Pass::PrologueEpilogue => cleanup::strip_prologue_epilogue(function, self.frame_slot_window),
            Pass::DeadNop => cleanup::remove_dead_nops(function),
            Pass::ReturningIfBranch => branches::hoist_returning_if_branch(function),
            Pass::IdenticalTail => branches::hoist_identical_tail(function),
            Pass::SmallBlockClone => blocks::clone_small_block(function, self.clone_block_limit),
        }
    }

    /// Run [`Optimizer::optimize`] to a fixed point.
    ///
    /// # Algorithm
    /// ```text
    /// while iterations < cap && optimize(function) { iterations += 1 }
    /// ```
    /// Every successful iteration also increments `function.optimization_passes_run`.
    ///
    /// # Returns
    /// `Convergence` - also stored on the function. Reaching the cap is logged as a
    /// warning and is not an error: the tree is still complete.
    pub fn run(&self, function: &mut Function) -> Convergence {
        let mut iterations: u32 = 0u32;
        let convergence: Convergence = loop {
            if iterations >= self.max_iterations {
                log::warn!(
                    "{}: restructuring stopped after {} iterations without reaching a fixed point",
                    function.name,
                    iterations
                );
                break Convergence::IterationCapReached { iterations };
            }
            if !self.optimize(function) {
                break Convergence::Converged { iterations };
            }
            iterations += 1;
            function.optimization_passes_run += 1;
        };

        function.convergence = convergence;
        convergence
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(OptimizationLevel::Aggressive)
    }
}

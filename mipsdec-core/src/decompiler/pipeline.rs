//! Decompilation Pipeline
//!
//! Sequences the stages for one function, or for every function of a symbol table.
//!
//! # Pipeline Stages
//! 1. **Decoding**: read and decode the words between the function's symbol and the next one
//! 2. **Delay-slot resolution**: reorder delay slots and build the initial branch tree
//! 3. **Restructuring**: run the optimizer to a fixed point (or its iteration cap)
//! 4. **Code generation**: render pseudo-C
//!
//! A fatal error stops the function it occurs in. In batch mode it is logged and
//! counted, and the remaining functions carry on.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::decompiler::analysis::delay_slot::DelaySlotStats;
use crate::decompiler::binary::BinaryImage;
use crate::decompiler::codegen::CodeGenerator;
use crate::decompiler::config::DecompilerConfig;
use crate::decompiler::error::{DecompilerError, Result};
use crate::decompiler::function::Function;
use crate::decompiler::optimizer::{Convergence, Optimizer};
use crate::decompiler::symbols::SymbolTable;

/// Per-function statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionStats {
    pub instructions_decoded: usize,
    /// Tree size after delay-slot resolution, synthetic instructions included
    pub instructions_after_delay_slots: usize,
    /// Tree size handed to the code generator
    pub instructions_emitted: usize,
    pub optimization_passes_run: u32,
    pub stack_frame_size: Option<u32>,
    pub converged: bool,
    pub labels_remaining: usize,
    pub delay_slots: DelaySlotStats,
}

/// Statistics collected over a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub total_functions: usize,
    pub successful_functions: usize,
    pub failed_functions: usize,
    /// Successful functions whose restructuring hit the iteration cap
    pub non_converged_functions: usize,
    pub total_instructions: usize,
}

#[derive(Debug, Clone)]
pub struct DecompiledFunction {
    pub name: String,
    pub source: String,
    pub stats: FunctionStats,
}

/// Outcome of [`DecompilationPipeline::decompile_all`].
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub functions: Vec<DecompiledFunction>,
    pub failures: Vec<(String, DecompilerError)>,
    pub stats: PipelineStats,
}

pub struct DecompilationPipeline {
    config: DecompilerConfig,
}

impl DecompilationPipeline {
    pub fn new(config: DecompilerConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &DecompilerConfig {
        &self.config
    }

    /// Decompile one function.
    ///
    /// # Arguments
    /// * `name` - Symbol name of the function
    /// * `symbols` - Symbol table bounding the function and naming call targets
    /// * `image` - Binary image holding the code
    ///
    /// # Returns
    /// `Result<DecompiledFunction>` - Generated source plus statistics
    ///
    /// # Errors
    /// Symbol lookup failure, decode failure or delay-slot underflow. Reaching the
    /// restructuring iteration cap is not an error; see [`FunctionStats::converged`].
    pub fn decompile_function(&self, name: &str, symbols: &SymbolTable, image: &BinaryImage) -> Result<DecompiledFunction> {
        log::info!("Decompiling {}...", name);

        log::info!("Step 1: Decoding instructions...");
        let mut function: Function = Function::decode(name, symbols, image)?;
        let instructions_decoded: usize = function.instruction_count();

        log::info!("Step 2: Resolving delay slots...");
        let delay_slots: DelaySlotStats = function.resolve_delay_slots()?;
        let instructions_after_delay_slots: usize = function.instruction_count();
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("After delay-slot resolution:\n{}", function.dump());
        }

        log::info!("Step 3: Restructuring control flow...");
        let optimizer: Optimizer = Optimizer::from_config(&self.config);
        let convergence: Convergence = optimizer.run(&mut function);
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("After restructuring:\n{}", function.dump());
        }

        log::info!("Step 4: Generating code...");
        let mut generator: CodeGenerator<'_> = CodeGenerator::from_config(symbols, &self.config);
        let source: String = generator.generate(&function);

        let stats: FunctionStats = FunctionStats {
            instructions_decoded,
            instructions_after_delay_slots,
            instructions_emitted: function.instruction_count(),
            optimization_passes_run: function.optimization_passes_run,
            stack_frame_size: function.stack_frame_size,
            converged: convergence.is_converged(),
            labels_remaining: function.label_count(),
            delay_slots,
        };

        log::info!(
            "{}: {} instructions decoded, {} passes run, {} labels remaining",
            name,
            stats.instructions_decoded,
            stats.optimization_passes_run,
            stats.labels_remaining
        );

        Ok(DecompiledFunction {
            name: name.to_string(),
            source,
            stats,
        })
    }

    /// Listing of a function, either as decoded or after delay-slot resolution.
    pub fn disassemble(&self, name: &str, symbols: &SymbolTable, image: &BinaryImage, resolved: bool) -> Result<String> {
        let mut function: Function = Function::decode(name, symbols, image)?;
        if resolved {
            let _stats: DelaySlotStats = function.resolve_delay_slots()?;
        }
        Ok(function.dump())
    }

    /// Decompile every function of the symbol table. Aliases are decompiled once,
    /// under the first name at their address.
    pub fn decompile_all(&self, symbols: &SymbolTable, image: &BinaryImage) -> BatchResult {
        self.decompile_all_with_progress(symbols, image, |_| {})
    }

    /// [`DecompilationPipeline::decompile_all`] with a callback invoked before each function.
    pub fn decompile_all_with_progress<F>(&self, symbols: &SymbolTable, image: &BinaryImage, mut on_function: F) -> BatchResult
    where
        F: FnMut(&str),
    {
        let mut seen: HashSet<u32> = HashSet::with_capacity(symbols.len());
        let names: Vec<&str> = symbols
            .iter()
            .filter(|symbol| seen.insert(symbol.address))
            .map(|symbol| symbol.name.as_str())
            .collect();

        let mut batch: BatchResult = BatchResult::default();
        batch.stats.total_functions = names.len();
        batch.functions.reserve(names.len());

        for name in names {
            on_function(name);
            match self.decompile_function(name, symbols, image) {
                Ok(decompiled) => {
                    batch.stats.successful_functions += 1;
                    batch.stats.total_instructions += decompiled.stats.instructions_decoded;
                    if !decompiled.stats.converged {
                        batch.stats.non_converged_functions += 1;
                    }
                    batch.functions.push(decompiled);
                }
                Err(e) => {
                    log::warn!("Failed to decompile {}: {}", name, e);
                    batch.stats.failed_functions += 1;
                    batch.failures.push((name.to_string(), e));
                }
            }
        }

        log::info!(
            "Batch finished: {}/{} functions decompiled, {} failed, {} did not converge",
            batch.stats.successful_functions,
            batch.stats.total_functions,
            batch.stats.failed_functions,
            batch.stats.non_converged_functions
        );
        batch
    }
}

impl Default for DecompilationPipeline {
    fn default() -> Self {
        Self::new(DecompilerConfig::default())
    }
}

/// Decompile one function with the default configuration.
///
/// The load base is the one the image was created with.
pub fn decompile(function_name: &str, symbols: &SymbolTable, binary: &BinaryImage) -> Result<String> {
    let config: DecompilerConfig = DecompilerConfig {
        load_base: binary.load_base(),
        ..DecompilerConfig::default()
    };
    DecompilationPipeline::new(config)
        .decompile_function(function_name, symbols, binary)
        .map(|decompiled| decompiled.source)
}

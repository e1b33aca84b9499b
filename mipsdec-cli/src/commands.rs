// CLI command handlers
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use mipsdec_core::decompiler::{
    codegen::helper_header,
    optimizer::OptimizationLevel,
    BinaryImage, DecompilationPipeline, DecompilerConfig, SymbolTable,
};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings shared by every subcommand that runs the pipeline.
pub struct DecompileOptions {
    pub config: Option<PathBuf>,
    pub load_base: Option<u32>,
    pub optimization_level: Option<OptimizationLevel>,
}

impl DecompileOptions {
    /// Config file (or defaults) with the command-line overrides applied.
    fn resolve_config(&self) -> Result<DecompilerConfig> {
        let mut config: DecompilerConfig = match &self.config {
            Some(path) => DecompilerConfig::from_file(path)?,
            None => DecompilerConfig::default(),
        };
        if let Some(load_base) = self.load_base {
            config.load_base = load_base;
        }
        if let Some(level) = self.optimization_level {
            config.optimization_level = level;
        }
        Ok(config)
    }
}

fn load_inputs(binary: &Path, map: &Path, config: &DecompilerConfig) -> Result<(BinaryImage, SymbolTable)> {
    let image: BinaryImage = BinaryImage::from_file(binary, config.load_base)
        .with_context(|| format!("Failed to load binary image: {}", binary.display()))?;
    let symbols: SymbolTable = SymbolTable::from_file(map)
        .with_context(|| format!("Failed to load symbol map: {}", map.display()))?;
    log::info!(
        "Loaded {} bytes at 0x{:08X} and {} symbols",
        image.len(),
        image.load_base(),
        symbols.len()
    );
    Ok((image, symbols))
}

pub fn decompile_function(
    function: &str,
    binary: &Path,
    map: &Path,
    output: Option<&Path>,
    options: &DecompileOptions,
) -> Result<()> {
    let config: DecompilerConfig = options.resolve_config()?;
    let (image, symbols) = load_inputs(binary, map, &config)?;

    let pipeline: DecompilationPipeline = DecompilationPipeline::new(config);
    let decompiled = pipeline
        .decompile_function(function, &symbols, &image)
        .with_context(|| format!("Failed to decompile {}", function))?;

    if !decompiled.stats.converged {
        eprintln!(
            "warning: restructuring of {} did not converge; output contains extra gotos",
            function
        );
    }

    match output {
        Some(path) => {
            fs::write(path, &decompiled.source)
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
            println!("Generated pseudo-C written to: {}", path.display());
        }
        None => print!("{}", decompiled.source),
    }

    Ok(())
}

pub fn dump_function(function: &str, binary: &Path, map: &Path, resolved: bool, options: &DecompileOptions) -> Result<()> {
    let config: DecompilerConfig = options.resolve_config()?;
    let (image, symbols) = load_inputs(binary, map, &config)?;

    let listing: String = DecompilationPipeline::new(config)
        .disassemble(function, &symbols, &image, resolved)
        .with_context(|| format!("Failed to disassemble {}", function))?;
    print!("{}", listing);
    Ok(())
}

pub fn decompile_all<F>(binary: &Path, map: &Path, output_dir: &Path, options: &DecompileOptions, progress: F) -> Result<()>
where
    F: FnOnce(u64) -> ProgressBar,
{
    let config: DecompilerConfig = options.resolve_config()?;
    let (image, symbols) = load_inputs(binary, map, &config)?;

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let unique_addresses: usize = symbols.iter().map(|symbol| symbol.address).collect::<HashSet<u32>>().len();
    let pb: ProgressBar = progress(unique_addresses as u64);

    let pipeline: DecompilationPipeline = DecompilationPipeline::new(config);
    let batch = pipeline.decompile_all_with_progress(&symbols, &image, |name| {
        pb.set_message(name.to_string());
        pb.inc(1);
    });
    pb.finish_with_message("Decompilation complete");

    for decompiled in &batch.functions {
        let path: PathBuf = output_dir.join(format!("{}.c", file_stem(&decompiled.name)));
        fs::write(&path, &decompiled.source)
            .with_context(|| format!("Failed to write output: {}", path.display()))?;
    }

    let helper_path: PathBuf = output_dir.join("mipsdec_helper.h");
    write_helper(&helper_path)?;

    let report = serde_json::json!({
        "stats": batch.stats,
        "functions": batch
            .functions
            .iter()
            .map(|decompiled| serde_json::json!({ "name": decompiled.name, "stats": decompiled.stats }))
            .collect::<Vec<_>>(),
        "failures": batch
            .failures
            .iter()
            .map(|(name, error)| serde_json::json!({ "name": name, "error": error.to_string() }))
            .collect::<Vec<_>>(),
    });
    let stats_path: PathBuf = output_dir.join("stats.json");
    let json: String = serde_json::to_string_pretty(&report).context("Failed to serialize statistics")?;
    fs::write(&stats_path, json).with_context(|| format!("Failed to write statistics: {}", stats_path.display()))?;

    println!("Decompilation complete");
    println!("  Functions: {}", batch.stats.total_functions);
    println!("  Successful: {}", batch.stats.successful_functions);
    println!("  Failed: {}", batch.stats.failed_functions);
    println!("  Not converged: {}", batch.stats.non_converged_functions);
    println!("Output directory: {}", output_dir.display());

    Ok(())
}

pub fn write_helper(output: &Path) -> Result<()> {
    fs::write(output, helper_header()).with_context(|| format!("Failed to write helper header: {}", output.display()))
}

/// Symbol name made safe to use as a file name.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

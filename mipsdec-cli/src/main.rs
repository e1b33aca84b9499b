// CLI application
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mipsdec_core::decompiler::optimizer::OptimizationLevel;
use std::path::PathBuf;

mod commands;

use commands::{decompile_all, decompile_function, dump_function, write_helper, DecompileOptions};

#[derive(Parser)]
#[command(name = "mipsdec")]
#[command(about = "MIPS32 single-function decompiler")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Decompile one function to pseudo-C
    Decompile {
        /// Symbol name of the function
        function: String,

        /// Raw binary image
        binary: PathBuf,

        /// Symbol map (`ADDRESS T name` per line)
        map: PathBuf,

        /// Write the output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        options: OptionArgs,
    },
    /// Print the disassembly of one function
    Dump {
        /// Symbol name of the function
        function: String,

        /// Raw binary image
        binary: PathBuf,

        /// Symbol map (`ADDRESS T name` per line)
        map: PathBuf,

        /// Show the tree after delay-slot resolution instead of the raw decode
        #[arg(long)]
        resolved: bool,

        #[command(flatten)]
        options: OptionArgs,
    },
    /// Decompile every function of the symbol map into a directory
    All {
        /// Raw binary image
        binary: PathBuf,

        /// Symbol map (`ADDRESS T name` per line)
        map: PathBuf,

        /// Output directory for `<function>.c` files and `stats.json`
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        options: OptionArgs,
    },
    /// Write the helper header generated code includes
    Helper {
        /// Output path of the header
        output: PathBuf,
    },
}

#[derive(clap::Args)]
struct OptionArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address the binary image is mapped at (hex, e.g. 0x80000000)
    #[arg(long, value_parser = parse_address)]
    load_base: Option<u32>,

    /// Restructuring level
    #[arg(long, value_enum)]
    opt_level: Option<OptLevel>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OptLevel {
    None,
    Basic,
    Aggressive,
}

impl From<OptLevel> for OptimizationLevel {
    fn from(level: OptLevel) -> Self {
        match level {
            OptLevel::None => OptimizationLevel::None,
            OptLevel::Basic => OptimizationLevel::Basic,
            OptLevel::Aggressive => OptimizationLevel::Aggressive,
        }
    }
}

impl From<OptionArgs> for DecompileOptions {
    fn from(args: OptionArgs) -> Self {
        DecompileOptions {
            config: args.config,
            load_base: args.load_base,
            optimization_level: args.opt_level.map(OptimizationLevel::from),
        }
    }
}

fn parse_address(value: &str) -> Result<u32, String> {
    let digits: &str = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid address '{}': {}", value, e))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decompile {
            function,
            binary,
            map,
            output,
            options,
        } => {
            decompile_function(&function, &binary, &map, output.as_deref(), &options.into())?;
        }
        Commands::Dump {
            function,
            binary,
            map,
            resolved,
            options,
        } => {
            dump_function(&function, &binary, &map, resolved, &options.into())?;
        }
        Commands::All {
            binary,
            map,
            output,
            options,
        } => {
            decompile_all(&binary, &map, &output, &options.into(), create_progress_bar)?;
        }
        Commands::Helper { output } => {
            let pb = create_spinner("Writing helper header...");
            write_helper(&output)?;
            pb.finish_with_message("Helper header written");
        }
    }

    Ok(())
}

fn create_progress_bar(length: u64) -> ProgressBar {
    let pb = ProgressBar::new(length);
    let style: ProgressStyle = ProgressStyle::with_template("{bar:40.green/white} {pos}/{len} {msg}")
        .map(|style| style.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style: ProgressStyle = ProgressStyle::with_template("{spinner:.green} {msg}")
        .map(|style| style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

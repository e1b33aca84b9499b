pub mod analysis;
pub mod binary;
pub mod codegen;
pub mod config;
pub mod decoder;
pub mod error;
pub mod function;
pub mod instruction;
pub mod optimizer;
pub mod pipeline;
pub mod register;
pub mod symbols;

// Re-export commonly used types
pub use binary::BinaryImage;
pub use config::DecompilerConfig;
pub use error::DecompilerError;
pub use function::Function;
pub use instruction::Instruction;
pub use pipeline::{BatchResult, DecompilationPipeline, DecompiledFunction, FunctionStats, PipelineStats};
pub use symbols::{Symbol, SymbolTable};
